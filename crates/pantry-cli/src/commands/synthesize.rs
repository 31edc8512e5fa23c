use pantry_core::{FallbackOrchestrator, Provenance};

use crate::cli::SynthesizeArgs;
use crate::error::CliError;

use super::{parse_request, CommandResult};

pub async fn run(
    args: &SynthesizeArgs,
    orchestrator: &FallbackOrchestrator,
) -> Result<CommandResult, CliError> {
    let request = parse_request(&args.request)?;
    let report = orchestrator.synthesize_request(&request).await;

    let mut warnings = report.warnings.clone();
    if orchestrator.configured_providers().is_empty() && report.result.provenance == Provenance::Emergency
    {
        warnings.push(String::from(
            "no provider keys configured; set PANTRY_GEMINI_API_KEY or PANTRY_SPOONACULAR_API_KEY",
        ));
    }

    let data = if args.report {
        serde_json::to_value(&report)?
    } else {
        serde_json::to_value(&report.result)?
    };

    Ok(CommandResult::ok(data).with_warnings(warnings))
}
