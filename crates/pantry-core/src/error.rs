use thiserror::Error;

/// Validation errors for synthesis requests and identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request must include at least one ingredient or a dish name")]
    EmptyRequest,
    #[error("ingredient length {len} exceeds max {max}")]
    IngredientTooLong { len: usize, max: usize },
    #[error("ingredient count {count} exceeds max {max}")]
    TooManyIngredients { count: usize, max: usize },
    #[error("dish name length {len} exceeds max {max}")]
    DishNameTooLong { len: usize, max: usize },

    #[error("invalid provider '{value}', expected one of gemini, spoonacular, unsplash")]
    InvalidProvider { value: String },
}

/// The only error the synthesis entry point surfaces to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),
}

/// Cache backend failures. `TimedCache` absorbs every one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend is not ready")]
    NotReady,
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Configuration loading errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable '{name}' has invalid value '{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid redis url: {0}")]
    InvalidRedisUrl(String),
    #[error("invalid configuration document: {0}")]
    InvalidDocument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_wraps_validation_message() {
        let error = SynthesisError::from(ValidationError::EmptyRequest);
        assert_eq!(
            error.to_string(),
            "invalid request: request must include at least one ingredient or a dish name"
        );
    }
}
