//! Provider adapter contracts and the shared failure type.
//!
//! Recipe providers implement [`RecipeSource`]; the media provider
//! implements [`ImageSource`]. Both report failures as [`ProviderFailure`],
//! which the orchestrator absorbs.
//!
//! | Adapter | Role | Contract |
//! |---------|------|----------|
//! | [`GeminiAdapter`] | primary, generative | [`RecipeSource`] |
//! | [`SpoonacularAdapter`] | secondary, structured database | [`RecipeSource`] |
//! | [`UnsplashAdapter`] | media enrichment | [`ImageSource`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use pantry_core::{RecipeSource, SynthesisRequest, ProviderFailure};
//!
//! async fn first_try(source: &dyn RecipeSource) -> Result<(), ProviderFailure> {
//!     let request = SynthesisRequest::from_ingredients(["egg", "flour"]).expect("valid");
//!     let result = source.attempt(&request, 1).await?;
//!     println!("{} from {}", result.title, result.source);
//!     Ok(())
//! }
//! ```

mod gemini;
mod spoonacular;
mod unsplash;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::http_client::HttpError;
use crate::{ProviderId, SynthesisRequest, SynthesisResult};

pub use gemini::{GeminiAdapter, GEMINI_DEFAULT_MODEL, GEMINI_FALLBACK_MODEL};
pub use spoonacular::SpoonacularAdapter;
pub use unsplash::UnsplashAdapter;

/// Boxed future returned by adapter calls.
pub type AdapterFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderFailure>> + Send + 'a>>;

/// How a provider attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error, timeout, or 5xx. The next attempt may succeed.
    Transient,
    /// The provider refused for quota reasons. Trips the provider breaker.
    QuotaExceeded,
    /// The provider answered but nothing usable could be extracted.
    Malformed,
}

/// Structured provider failure. Never surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    provider: ProviderId,
    kind: FailureKind,
    message: String,
}

impl ProviderFailure {
    pub fn transient(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn quota_exceeded(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FailureKind::QuotaExceeded,
            message: message.into(),
        }
    }

    pub fn malformed(provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind: FailureKind::Malformed,
            message: message.into(),
        }
    }

    /// Maps a transport error; every transport failure is transient.
    pub fn from_transport(provider: ProviderId, error: &HttpError) -> Self {
        Self::transient(provider, format!("{provider} transport error: {}", error.message()))
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether another attempt against the same provider is worthwhile.
    pub const fn retryable(&self) -> bool {
        !matches!(self.kind, FailureKind::QuotaExceeded)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FailureKind::Transient => "provider.transient",
            FailureKind::QuotaExceeded => "provider.quota_exceeded",
            FailureKind::Malformed => "provider.malformed",
        }
    }
}

impl Display for ProviderFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderFailure {}

/// Recipe provider contract.
///
/// `attempt` is 1-based. Adapters may change strategy with the attempt
/// number (simpler prompt, other search mode, other model). A success is
/// already normalized: every field of [`SynthesisResult`] is populated.
///
/// Implementations must be `Send + Sync`; the orchestrator shares them
/// across requests.
pub trait RecipeSource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Runs one attempt for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderFailure`] classified as transient, quota exceeded,
    /// or malformed.
    fn attempt<'a>(
        &'a self,
        request: &'a SynthesisRequest,
        attempt: u32,
    ) -> AdapterFuture<'a, SynthesisResult>;
}

/// Media provider contract used for best-effort image enrichment.
pub trait ImageSource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Looks up an image for `query`. `Ok(None)` means no match.
    fn lookup<'a>(&'a self, query: &'a str) -> AdapterFuture<'a, Option<String>>;
}

/// Shared status classification: 429 is always a quota signal, 5xx is
/// transient, anything else non-2xx is treated as transient unless the
/// adapter knows better.
pub(crate) fn classify_status(provider: ProviderId, status: u16, body: &str) -> ProviderFailure {
    let snippet: String = body.chars().take(160).collect();
    if status == 429 {
        return ProviderFailure::quota_exceeded(
            provider,
            format!("{provider} returned status 429: {snippet}"),
        );
    }
    ProviderFailure::transient(provider, format!("{provider} returned status {status}: {snippet}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_failure_kind() {
        assert_eq!(
            ProviderFailure::transient(ProviderId::Gemini, "x").code(),
            "provider.transient"
        );
        assert_eq!(
            ProviderFailure::quota_exceeded(ProviderId::Gemini, "x").code(),
            "provider.quota_exceeded"
        );
        assert_eq!(
            ProviderFailure::malformed(ProviderId::Gemini, "x").code(),
            "provider.malformed"
        );
    }

    #[test]
    fn quota_failures_are_not_retryable() {
        assert!(!ProviderFailure::quota_exceeded(ProviderId::Spoonacular, "402").retryable());
        assert!(ProviderFailure::malformed(ProviderId::Spoonacular, "empty").retryable());
    }

    #[test]
    fn status_429_is_quota_and_503_is_transient() {
        assert_eq!(
            classify_status(ProviderId::Unsplash, 429, "").kind(),
            FailureKind::QuotaExceeded
        );
        assert_eq!(
            classify_status(ProviderId::Unsplash, 503, "busy").kind(),
            FailureKind::Transient
        );
    }

    #[test]
    fn display_includes_code() {
        let failure = ProviderFailure::transient(ProviderId::Gemini, "gemini timed out");
        assert_eq!(failure.to_string(), "gemini timed out (provider.transient)");
    }
}
