//! # Pantry Core
//!
//! Resilient recipe synthesis: given ingredients and/or a dish name, always
//! return a structurally complete recipe.
//!
//! ## Overview
//!
//! This crate provides the building blocks of the synthesis pipeline:
//!
//! - **Domain models** for requests, cache keys and recipe results
//! - **Timeout-guarded cache** that degrades instead of failing
//! - **Daily quota governor** with per-provider quota breakers
//! - **Provider adapters** for a generative primary, a structured secondary
//!   and a media provider
//! - **Fallback orchestration** ending in a dependency-free emergency recipe
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider contracts and adapters (Gemini, Spoonacular, Unsplash) |
//! | [`cache`] | `TimedCache` facade, backend trait, in-memory backend |
//! | [`circuit_breaker`] | Per-provider quota breakers stored as cache flags |
//! | [`config`] | `SynthesisConfig` and provider keys from the environment |
//! | [`domain`] | Requests, cache keys, results and drafts |
//! | [`emergency`] | Last-resort synthesis |
//! | [`error`] | Validation, synthesis, cache and config errors |
//! | [`extract`] | Recipe extraction from free-form generative text |
//! | [`http_client`] | HTTP client abstraction |
//! | [`orchestrator`] | Fallback state machine and its builder |
//! | [`provider_policy`] | Attempt budgets, timeouts and breaker TTLs |
//! | [`quota`] | Daily primary quota with day rollover |
//! | [`redis_backend`] | Redis cache backend |
//! | [`retry`] | Backoff between attempts |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Per-minute pacing for the primary provider |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pantry_core::OrchestratorBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keys from PANTRY_GEMINI_API_KEY / SPOONACULAR_API_KEY / UNSPLASH_ACCESS_KEY
//!     let orchestrator = OrchestratorBuilder::from_env()?.build()?;
//!
//!     let recipe = orchestrator.synthesize(["egg", "flour"], None).await?;
//!     println!("{} ({})", recipe.title, recipe.provenance.as_str());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  CLI / caller        │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │ FallbackOrchestrator │────▶│ TimedCache       │
//! └──────────┬───────────┘     │ (memory / redis) │
//!            │                 └──────────────────┘
//!            ▼                          ▲
//! ┌──────────────────────┐              │
//! │ QuotaGovernor        │──────────────┘ breaker flags
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │ RecipeSource /       │────▶│ HTTP Client      │
//! │ ImageSource adapters │     │ (reqwest)        │
//! └──────────┬───────────┘     └──────────────────┘
//!            │ all failed
//!            ▼
//! ┌──────────────────────┐
//! │ Emergency synthesis  │
//! └──────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider and cache failures are absorbed. The only error a caller sees is
//! an invalid request:
//!
//! ```rust
//! use pantry_core::{SynthesisRequest, ValidationError};
//!
//! let error = SynthesisRequest::new(["  ", ""], None).unwrap_err();
//! assert_eq!(error, ValidationError::EmptyRequest);
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables and never logged
//! - Keys travel in request headers, never in URLs

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod emergency;
pub mod error;
pub mod extract;
pub mod http_client;
pub mod orchestrator;
pub mod provider_policy;
pub mod quota;
pub mod redis_backend;
pub mod retry;
pub mod source;
pub mod throttling;

// Adapter contracts and implementations
pub use adapters::{
    FailureKind, GeminiAdapter, ImageSource, ProviderFailure, RecipeSource, SpoonacularAdapter,
    UnsplashAdapter,
};

// Caching
pub use cache::{
    CacheBackend, CacheLookup, CacheWrite, CachedValue, MemoryBackend, TimedCache, MAX_ENTRY_TTL,
};
pub use redis_backend::RedisBackend;

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitState};

// Configuration
pub use config::{ProviderKeys, ProviderOverrides, SynthesisConfig};

// Domain models
pub use domain::{
    CacheKey, Nutrition, Provenance, RecipeDraft, SynthesisRequest, SynthesisResult,
};

// Emergency synthesis
pub use emergency::synthesize_emergency;

// Error types
pub use error::{CacheError, ConfigError, SynthesisError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpMethod, HttpRequest,
    HttpResponse, ReqwestHttpClient,
};

// Orchestration
pub use orchestrator::{
    AttemptOutcome, AttemptRecord, FallbackOrchestrator, OrchestratorBuilder, SynthesisReport,
};

// Provider policies
pub use provider_policy::ProviderPolicy;

// Quota
pub use quota::{Clock, ManualClock, QuotaGovernor, QuotaUsage, SystemClock};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::Pacer;
