use serde_json::{json, Value};
use sleuth_core::{get_recovery_recommendations, SearchError};

use crate::cli::RecommendArgs;
use crate::error::CliError;

pub fn run(args: &RecommendArgs) -> Result<Value, CliError> {
    let message = args.message.trim();
    if message.is_empty() {
        return Err(CliError::Command(String::from("error message must not be empty")));
    }

    let error = SearchError::Message(message.to_owned());
    let class = error.effective_class();

    Ok(json!({
        "classification": class,
        "search_type": args.search_type,
        "suggestions": get_recovery_recommendations(&error, args.search_type),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::SearchType;

    #[test]
    fn classifies_free_text_and_returns_suggestions() {
        let args = RecommendArgs {
            message: String::from("Connection refused"),
            search_type: Some(SearchType::Phone),
        };

        let data = run(&args).expect("recommendations");

        assert_eq!(data["classification"], "network");
        assert!(data["suggestions"].as_array().is_some_and(|items| !items.is_empty()));
    }

    #[test]
    fn blank_message_is_a_usage_error() {
        let args = RecommendArgs {
            message: String::from("  "),
            search_type: None,
        };

        assert_eq!(run(&args).map_err(|error| error.exit_code()).err(), Some(2));
    }
}
