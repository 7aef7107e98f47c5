mod breakers;
mod health;
mod providers;
mod recommend;
mod search;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sleuth_core::{
    ErrorCode, FixtureProvider, FixtureResponse, HttpClient, HttpJsonProvider, ProviderConfig,
    ReqwestHttpClient, SearchCoordinator, SearchProvider, SleuthConfig,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    if let Command::Recommend(args) = &cli.command {
        return recommend::run(args);
    }

    let coordinator = build_coordinator(cli)?;
    let data = match &cli.command {
        Command::Search(args) => search::run(args, &coordinator).await?,
        Command::Providers => providers::run(&coordinator).await?,
        Command::Health => health::run(&coordinator).await?,
        Command::Breakers => breakers::run(&coordinator)?,
        Command::Recommend(args) => recommend::run(args)?,
    };
    coordinator.shutdown();

    Ok(data)
}

fn build_coordinator(cli: &Cli) -> Result<SearchCoordinator, CliError> {
    let mut config = match &cli.config {
        Some(path) => SleuthConfig::load(path)?,
        None if cli.demo => demo_config(),
        None => {
            return Err(CliError::Command(String::from(
                "no configuration given; pass --config <file> or --demo",
            )))
        }
    };
    config.apply_env_overrides()?;

    let clients = if cli.demo {
        config.providers = demo_provider_configs();
        demo_clients()
    } else {
        http_clients(&config.providers)?
    };

    tracing::debug!(providers = config.providers.len(), demo = cli.demo, "building search coordinator");
    Ok(SearchCoordinator::from_config(&config, clients)?)
}

fn http_clients(providers: &[ProviderConfig]) -> Result<Vec<Arc<dyn SearchProvider>>, CliError> {
    let transport: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    providers
        .iter()
        .map(|provider| -> Result<Arc<dyn SearchProvider>, CliError> {
            let client = HttpJsonProvider::from_config(provider, Arc::clone(&transport))?;
            Ok(Arc::new(client))
        })
        .collect()
}

const DEMO_PROVIDERS: [&str; 5] = [
    "demo-registry",
    "demo-telecom",
    "demo-social",
    "demo-archive",
    "demo-leaks",
];

fn demo_config() -> SleuthConfig {
    let mut config = SleuthConfig::default();
    config.orchestrator.default_timeout = Duration::from_secs(2);
    config.orchestrator.retry_delay = Duration::from_millis(100);
    config.recovery.backoff_base = Duration::from_millis(200);
    config
}

fn demo_provider_configs() -> Vec<ProviderConfig> {
    DEMO_PROVIDERS
        .iter()
        .zip(1..)
        .map(|(id, priority)| ProviderConfig::new(*id, priority))
        .collect()
}

fn demo_clients() -> Vec<Arc<dyn SearchProvider>> {
    let [registry, telecom, social, archive, leaks] = DEMO_PROVIDERS;
    vec![
        Arc::new(FixtureProvider::new(registry).with_latency(Duration::from_millis(40))),
        Arc::new(FixtureProvider::new(telecom).with_latency(Duration::from_millis(15))),
        Arc::new(
            FixtureProvider::new(social)
                .with_latency(Duration::from_millis(25))
                .with_response(FixtureResponse::Empty),
        ),
        Arc::new(
            FixtureProvider::new(archive)
                .with_response(FixtureResponse::failure(
                    ErrorCode::ProviderUnavailable,
                    "archive backend is down",
                ))
                .unavailable(),
        ),
        Arc::new(FixtureProvider::new(leaks).with_latency(Duration::from_millis(60))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::ConfigError;

    #[test]
    fn demo_configs_and_clients_line_up() {
        let configs = demo_provider_configs();
        let clients = demo_clients();

        assert_eq!(configs.len(), clients.len());
        for (config, client) in configs.iter().zip(&clients) {
            assert_eq!(config.id, client.id());
        }
        assert_eq!(configs[0].priority, 1);
    }

    fn parse(args: &[&str]) -> Cli {
        use clap::Parser;
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn config_file_providers_become_http_clients() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("sleuth.toml");
        std::fs::write(
            &path,
            "[[providers]]\nid = \"registry-a\"\npriority = 1\nendpoint = \"https://registry-a.example/lookup\"\n",
        )
        .expect("write config");
        let path = path.to_string_lossy().into_owned();

        let coordinator = build_coordinator(&parse(&["sleuth", "--config", &path, "breakers"]))
            .expect("coordinator");

        assert_eq!(coordinator.orchestrator().registry().len(), 1);
    }

    #[test]
    fn provider_without_endpoint_is_a_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("sleuth.toml");
        std::fs::write(&path, "[[providers]]\nid = \"registry-a\"\npriority = 1\n")
            .expect("write config");
        let path = path.to_string_lossy().into_owned();

        let error = build_coordinator(&parse(&["sleuth", "--config", &path, "providers"]))
            .expect_err("endpoint is required");

        assert!(matches!(error, CliError::Config(ConfigError::MissingEndpoint { .. })));
        assert_eq!(error.exit_code(), 2);
    }

    #[tokio::test]
    async fn demo_search_answers_with_masked_sources() {
        let cli = parse(&["sleuth", "--demo", "search", "--type", "phone", "+15550100"]);

        let data = run(&cli).await.expect("demo search");

        let outcomes = data["result_set"]["outcomes"].as_array().expect("outcomes");
        assert_eq!(outcomes.len(), DEMO_PROVIDERS.len());
        assert_eq!(outcomes[0]["provider_id"], "Source A");
        assert!(!data.to_string().contains("demo-"));
    }
}
