//! Scripted providers and cache backends shared by the behavior tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pantry_core::adapters::AdapterFuture;
use pantry_core::cache::BackendFuture;
use pantry_core::{
    Backoff, CacheBackend, CacheError, FailureKind, ImageSource, OrchestratorBuilder,
    Provenance, ProviderFailure, ProviderId, ProviderOverrides, RecipeDraft, RecipeSource,
    SynthesisConfig, SynthesisRequest, SynthesisResult,
};

/// What a scripted provider does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(&'static str),
    Fail(FailureKind),
    /// Never completes; only the attempt timeout ends it.
    Hang,
}

/// A [`RecipeSource`] that replays a fixed script, then fails transiently.
pub struct ScriptedSource {
    id: ProviderId,
    script: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    attempts_seen: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    pub fn new(id: ProviderId, steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(steps.into_iter().collect()),
            calls: AtomicU32::new(0),
            attempts_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy(id: ProviderId, title: &'static str) -> Arc<Self> {
        Self::new(id, std::iter::repeat(Step::Succeed(title)).take(16))
    }

    pub fn failing(id: ProviderId, kind: FailureKind) -> Arc<Self> {
        Self::new(id, std::iter::repeat(Step::Fail(kind)).take(16))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn attempts_seen(&self) -> Vec<u32> {
        self.attempts_seen.lock().expect("lock").clone()
    }
}

impl RecipeSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn attempt<'a>(
        &'a self,
        request: &'a SynthesisRequest,
        attempt: u32,
    ) -> AdapterFuture<'a, SynthesisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.attempts_seen.lock().expect("lock").push(attempt);
        let step = self.script.lock().expect("lock").pop_front();
        let id = self.id;

        Box::pin(async move {
            match step {
                Some(Step::Succeed(title)) => Ok(recipe(request, id, title)),
                Some(Step::Fail(kind)) => Err(failure(id, kind)),
                Some(Step::Hang) => std::future::pending().await,
                None => Err(ProviderFailure::transient(id, "script exhausted")),
            }
        })
    }
}

/// An [`ImageSource`] that always answers the same way.
pub struct FixedImages {
    answer: Result<Option<String>, FailureKind>,
    calls: AtomicU32,
}

impl FixedImages {
    pub fn found(url: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(Some(url.to_owned())),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing(kind: FailureKind) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(kind),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageSource for FixedImages {
    fn id(&self) -> ProviderId {
        ProviderId::Unsplash
    }

    fn lookup<'a>(&'a self, _query: &'a str) -> AdapterFuture<'a, Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answer
            .clone()
            .map_err(|kind| failure(ProviderId::Unsplash, kind));
        Box::pin(async move { answer })
    }
}

/// A cache backend whose calls never complete.
pub struct HangingBackend;

impl CacheBackend for HangingBackend {
    fn name(&self) -> &'static str {
        "hanging"
    }

    fn get<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, Option<String>> {
        Box::pin(std::future::pending())
    }

    fn set<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> BackendFuture<'a, ()> {
        Box::pin(std::future::pending())
    }

    fn delete<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(std::future::pending())
    }

    fn ping<'a>(&'a self) -> BackendFuture<'a, ()> {
        Box::pin(std::future::pending())
    }
}

/// A cache backend that has not connected yet.
pub struct NotReadyBackend;

impl CacheBackend for NotReadyBackend {
    fn name(&self) -> &'static str {
        "not-ready"
    }

    fn get<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, Option<String>> {
        Box::pin(async { Err(CacheError::NotReady) })
    }

    fn set<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> BackendFuture<'a, ()> {
        Box::pin(async { Err(CacheError::NotReady) })
    }

    fn delete<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async { Err(CacheError::NotReady) })
    }

    fn ping<'a>(&'a self) -> BackendFuture<'a, ()> {
        Box::pin(async { Err(CacheError::NotReady) })
    }
}

pub fn recipe(request: &SynthesisRequest, id: ProviderId, title: &str) -> SynthesisResult {
    RecipeDraft {
        title: Some(title.to_owned()),
        ingredients: request
            .ingredients()
            .iter()
            .cloned()
            .chain(std::iter::once(String::from("salt")))
            .collect(),
        steps: vec![String::from("Mix everything."), String::from("Cook until done.")],
        ..RecipeDraft::default()
    }
    .finalize(request, id.as_str(), Provenance::PrimaryProvider)
}

pub fn failure(id: ProviderId, kind: FailureKind) -> ProviderFailure {
    match kind {
        FailureKind::Transient => ProviderFailure::transient(id, "upstream 503"),
        FailureKind::QuotaExceeded => ProviderFailure::quota_exceeded(id, "quota exhausted"),
        FailureKind::Malformed => ProviderFailure::malformed(id, "no recipe in response"),
    }
}

/// Defaults with retry delays and pacing removed so tests run instantly.
pub fn fast_config() -> SynthesisConfig {
    let no_delay = ProviderOverrides {
        backoff: Some(Backoff::None),
        ..ProviderOverrides::default()
    };
    SynthesisConfig {
        pacing_per_minute: None,
        gemini: no_delay.clone(),
        spoonacular: no_delay.clone(),
        unsplash: no_delay,
        ..SynthesisConfig::default()
    }
}

pub fn builder() -> OrchestratorBuilder {
    OrchestratorBuilder::new().with_config(fast_config())
}
