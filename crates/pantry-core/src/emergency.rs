//! Last-resort recipe synthesis with no external dependencies.

use crate::domain::{
    default_ingredients, default_title, generic_steps, Nutrition, Provenance, SynthesisRequest,
    SynthesisResult, DEFAULT_COOK_TIME_MINUTES, DEFAULT_PREP_TIME_MINUTES, DEFAULT_SERVINGS,
    PLACEHOLDER_IMAGE_URL,
};

/// Value of [`SynthesisResult::source`] for emergency results.
pub const EMERGENCY_SOURCE: &str = "emergency";

/// Builds a structurally complete recipe from the request alone.
///
/// Infallible and deterministic: the same request always yields the same
/// result.
pub fn synthesize_emergency(request: &SynthesisRequest) -> SynthesisResult {
    let ingredient_list = default_ingredients(request);
    let instructions = generic_steps(request, &ingredient_list).join("\n");

    SynthesisResult {
        title: default_title(request),
        ingredient_list,
        instructions,
        prep_time_minutes: DEFAULT_PREP_TIME_MINUTES,
        cook_time_minutes: DEFAULT_COOK_TIME_MINUTES,
        servings: DEFAULT_SERVINGS,
        nutrition: Nutrition::default(),
        image_url: PLACEHOLDER_IMAGE_URL.to_owned(),
        source: EMERGENCY_SOURCE.to_owned(),
        provenance: Provenance::Emergency,
    }
}
