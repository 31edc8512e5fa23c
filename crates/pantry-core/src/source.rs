use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical identifiers for the external content providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Generative text provider (primary).
    Gemini,
    /// Structured recipe database (secondary).
    Spoonacular,
    /// Media lookup (tertiary, images only).
    Unsplash,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Gemini, Self::Spoonacular, Self::Unsplash];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Spoonacular => "spoonacular",
            Self::Unsplash => "unsplash",
        }
    }

    /// Cache key of this provider's quota breaker flag.
    pub fn breaker_key(self) -> String {
        format!("{}_quota_exceeded", self.as_str())
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "spoonacular" => Ok(Self::Spoonacular),
            "unsplash" => Ok(Self::Unsplash),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}
