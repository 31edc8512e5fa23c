//! # Domain Models
//!
//! Canonical request and result types for recipe synthesis.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SynthesisRequest`] | Validated ingredient set and/or dish name |
//! | [`CacheKey`] | Order-independent cache key derived from a request |
//! | [`SynthesisResult`] | Fully-populated recipe tagged with [`Provenance`] |
//! | [`RecipeDraft`] | Partial provider output prior to default substitution |
//!
//! ## Validation
//!
//! Requests are validated at construction; a request with neither
//! ingredients nor a dish name never reaches the pipeline:
//!
//! ```rust
//! use pantry_core::{SynthesisRequest, ValidationError};
//!
//! let request = SynthesisRequest::new(["flour", "egg"], None).unwrap();
//! assert_eq!(request.cache_key().as_str(), "recipe::egg,flour");
//!
//! let empty = SynthesisRequest::new(Vec::<String>::new(), Some("  "));
//! assert_eq!(empty, Err(ValidationError::EmptyRequest));
//! ```

mod recipe;
mod request;

pub use recipe::{
    default_ingredients, default_title, generic_steps, Nutrition, NutritionDraft, Provenance,
    RecipeDraft, SynthesisResult, DEFAULT_COOK_TIME_MINUTES, DEFAULT_PREP_TIME_MINUTES,
    DEFAULT_SERVINGS, PLACEHOLDER_IMAGE_URL,
};
pub use request::{CacheKey, SynthesisRequest};
