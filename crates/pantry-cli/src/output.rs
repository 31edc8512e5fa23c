use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    data: &'a Value,
    warnings: &'a [String],
}

/// Writes the command result to stdout as a single JSON document.
pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let rendered = to_json(result, pretty)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

fn to_json(result: &CommandResult, pretty: bool) -> Result<String, CliError> {
    let envelope = Envelope {
        data: &result.data,
        warnings: &result.warnings,
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_carries_data_and_warnings() {
        let result = CommandResult::ok(json!({"alive": true})).with_warning("slow");

        let rendered = to_json(&result, false).expect("renders");

        assert_eq!(rendered, r#"{"data":{"alive":true},"warnings":["slow"]}"#);
    }
}
