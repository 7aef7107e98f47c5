use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(data: &Value, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(data)?
            } else {
                serde_json::to_string(data)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => {
            for line in table_lines(data)? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn table_lines(data: &Value) -> Result<Vec<String>, CliError> {
    let mut lines = Vec::new();
    match data {
        Value::Object(fields) => {
            let width = fields.keys().map(String::len).max().unwrap_or(0);
            for (name, value) in fields {
                match value {
                    Value::Array(items) if items.iter().all(Value::is_object) => {
                        lines.push(format!("{name}:"));
                        lines.extend(items.iter().map(|item| format!("  - {}", inline(item))));
                    }
                    Value::Array(_) | Value::Object(_) => {
                        lines.push(format!("{name}:"));
                        let nested = serde_json::to_string_pretty(value)?;
                        lines.extend(nested.lines().map(|line| format!("  {line}")));
                    }
                    scalar => lines.push(format!("{name:<width$} : {}", scalar_text(scalar))),
                }
            }
        }
        Value::Array(items) => {
            lines.extend(items.iter().map(|item| format!("- {}", inline(item))));
        }
        scalar => lines.push(scalar_text(scalar)),
    }
    Ok(lines)
}

fn inline(value: &Value) -> String {
    match value {
        Value::Object(fields) => fields
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| match value {
                Value::Array(items) => format!("{name}=[{}]", items.len()),
                Value::Object(_) => format!("{name}={{..}}"),
                scalar => format!("{name}={}", scalar_text(scalar)),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::from("-"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_layout_inlines_object_rows() {
        let data = json!({
            "status": "degraded",
            "providers": [
                {"id": "Source A", "available": true, "records": [1, 2]},
            ],
        });

        let lines = table_lines(&data).expect("renderable");

        assert!(lines.contains(&String::from("status    : degraded")));
        assert!(lines.contains(&String::from("  - available=true id=Source A records=[2]")));
    }
}
