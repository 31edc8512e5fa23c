use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapters::{classify_status, AdapterFuture, ProviderFailure, RecipeSource};
use crate::extract::extract_recipe;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::{Provenance, ProviderId, SynthesisRequest, SynthesisResult};

pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
/// Used on the last attempt when the default model keeps failing.
pub const GEMINI_FALLBACK_MODEL: &str = "gemini-1.5-flash-8b";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generative primary provider.
///
/// Attempt 1 sends the full structured prompt, attempt 2 a simplified
/// prompt, attempt 3 the simplified prompt against the fallback model.
#[derive(Clone)]
pub struct GeminiAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    model: String,
    fallback_model: String,
    timeout_ms: u64,
}

impl GeminiAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_owned(),
            model: GEMINI_DEFAULT_MODEL.to_owned(),
            fallback_model: GEMINI_FALLBACK_MODEL.to_owned(),
            timeout_ms: 25_000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_models(mut self, model: impl Into<String>, fallback_model: impl Into<String>) -> Self {
        self.model = model.into();
        self.fallback_model = fallback_model.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn model_for(&self, attempt: u32) -> &str {
        if attempt >= 3 {
            &self.fallback_model
        } else {
            &self.model
        }
    }

    async fn generate(
        &self,
        request: &SynthesisRequest,
        attempt: u32,
    ) -> Result<SynthesisResult, ProviderFailure> {
        let provider = ProviderId::Gemini;
        let model = self.model_for(attempt);
        let (prompt, temperature) = if attempt <= 1 {
            (full_prompt(request), 0.7)
        } else {
            (simplified_prompt(request), 0.4)
        };

        let payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig { temperature },
        };

        let endpoint = format!("{}/models/{}:generateContent", self.base_url, model);
        let http_request = HttpRequest::post(endpoint)
            .with_json(&payload)
            .map_err(|e| ProviderFailure::malformed(provider, e.message()))?
            .with_auth(&HttpAuth::header("x-goog-api-key", self.api_key.as_str()))
            .with_timeout_ms(self.timeout_ms);

        debug!(model, attempt, "calling gemini generateContent");
        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|e| ProviderFailure::from_transport(provider, &e))?;

        if !response.is_success() {
            return Err(classify_gemini_status(response.status, &response.body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response.body).map_err(|e| {
            ProviderFailure::malformed(provider, format!("failed to parse gemini response: {e}"))
        })?;

        let text = parsed.text();
        if text.trim().is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| String::from("no candidate text"));
            return Err(ProviderFailure::malformed(
                provider,
                format!("gemini returned no usable text: {reason}"),
            ));
        }

        let extraction = extract_recipe(&text)
            .map_err(|e| ProviderFailure::malformed(provider, e.reason().to_owned()))?;
        debug!(tier = ?extraction.tier, "gemini output extracted");

        Ok(extraction
            .draft
            .finalize(request, provider.as_str(), Provenance::PrimaryProvider))
    }
}

impl RecipeSource for GeminiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn attempt<'a>(
        &'a self,
        request: &'a SynthesisRequest,
        attempt: u32,
    ) -> AdapterFuture<'a, SynthesisResult> {
        Box::pin(self.generate(request, attempt))
    }
}

fn classify_gemini_status(status: u16, body: &str) -> ProviderFailure {
    let lowered = body.to_ascii_lowercase();
    let quota_wording = body.contains("RESOURCE_EXHAUSTED") || lowered.contains("quota");
    if status == 429 || ((400..500).contains(&status) && quota_wording) {
        return ProviderFailure::quota_exceeded(
            ProviderId::Gemini,
            format!("gemini quota exhausted (status {status})"),
        );
    }
    classify_status(ProviderId::Gemini, status, body)
}

fn describe_request(request: &SynthesisRequest) -> String {
    match (request.dish_name(), request.has_ingredients()) {
        (Some(dish), true) => format!(
            "a recipe for \"{dish}\" that uses these ingredients: {}",
            request.ingredients().join(", ")
        ),
        (Some(dish), false) => format!("a recipe for \"{dish}\""),
        (None, _) => format!(
            "a recipe that uses these ingredients: {}",
            request.ingredients().join(", ")
        ),
    }
}

fn full_prompt(request: &SynthesisRequest) -> String {
    format!(
        "You are a helpful chef. Create {}.\n\
         Respond with a single JSON object and nothing else, using this shape:\n\
         {{\"name\": string, \"ingredients\": [string], \"instructions\": [string], \
         \"prepTime\": number (minutes), \"cookTime\": number (minutes), \"servings\": number, \
         \"nutrition\": {{\"calories\": number, \"protein\": number, \"carbs\": number, \"fat\": number}}}}\n\
         Include quantities in each ingredient line and keep instructions as short numbered steps.",
        describe_request(request)
    )
}

fn simplified_prompt(request: &SynthesisRequest) -> String {
    format!(
        "Write {}. Reply only with JSON: {{\"name\": \"...\", \"ingredients\": [\"...\"], \"instructions\": [\"...\"]}}",
        describe_request(request)
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
