use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pantry_core::{
    FailureKind, GeminiAdapter, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
    ImageSource, ProviderId, RecipeSource, SpoonacularAdapter, SynthesisRequest, UnsplashAdapter,
};

const SECRET: &str = "contract-secret-key";

/// Replays canned transport results and records every request.
struct CannedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    fn new(responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.requests.lock().expect("lock").push(request);
        let next = self
            .responses
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("no canned response left")));
        Box::pin(async move { next })
    }
}

#[derive(Clone, Copy)]
struct RecipeCase {
    id: ProviderId,
    success: &'static [&'static str],
}

const GEMINI_SUCCESS: &str = r#"{"candidates":[{"content":{"parts":[{"text":"Here you go:\n```json\n{\"title\":\"Egg Crepes\",\"ingredients\":[\"2 eggs\",\"1 cup flour\"],\"instructions\":[\"Whisk.\",\"Fry thin.\"],\"prepTime\":\"10 minutes\",\"cookTime\":15,\"servings\":2}\n```"}]}}]}"#;

const SPOONACULAR_SEARCH: &str = r#"[{"id":7,"title":"Crepes"}]"#;

const SPOONACULAR_INFORMATION: &str = r#"{
    "id": 7,
    "title": "Simple Crepes",
    "readyInMinutes": 25,
    "preparationMinutes": 10,
    "cookingMinutes": null,
    "servings": 4,
    "image": "https://img.spoonacular.test/7.jpg",
    "extendedIngredients": [{"original": "2 eggs"}, {"original": "1 cup flour"}],
    "analyzedInstructions": [{"steps": [{"number": 1, "step": "Whisk."}, {"number": 2, "step": "Fry."}]}],
    "nutrition": {"nutrients": [{"name": "Calories", "amount": 310.4, "unit": "kcal"}]}
}"#;

fn recipe_cases() -> Vec<RecipeCase> {
    vec![
        RecipeCase {
            id: ProviderId::Gemini,
            success: &[GEMINI_SUCCESS],
        },
        RecipeCase {
            id: ProviderId::Spoonacular,
            success: &[SPOONACULAR_SEARCH, SPOONACULAR_INFORMATION],
        },
    ]
}

fn recipe_adapter(id: ProviderId, client: Arc<CannedHttpClient>) -> Arc<dyn RecipeSource> {
    match id {
        ProviderId::Gemini => {
            Arc::new(GeminiAdapter::new(client, SECRET).with_base_url("https://gemini.test"))
        }
        ProviderId::Spoonacular => {
            Arc::new(SpoonacularAdapter::new(client, SECRET).with_base_url("https://spoon.test"))
        }
        ProviderId::Unsplash => unreachable!("unsplash is not a recipe source"),
    }
}

fn request() -> SynthesisRequest {
    SynthesisRequest::from_ingredients(["egg", "flour"]).expect("valid request")
}

#[tokio::test]
async fn recipe_sources_return_complete_results_on_success() {
    for case in recipe_cases() {
        let client = CannedHttpClient::new(
            case.success
                .iter()
                .map(|body| Ok(HttpResponse::ok_json(*body))),
        );
        let adapter = recipe_adapter(case.id, Arc::clone(&client));

        let result = adapter
            .attempt(&request(), 1)
            .await
            .unwrap_or_else(|failure| panic!("{} should succeed: {failure}", case.id));

        assert_eq!(adapter.id(), case.id);
        assert_eq!(result.source, case.id.as_str());
        assert!(!result.title.is_empty(), "{}: title", case.id);
        assert_eq!(result.ingredient_list, vec!["2 eggs", "1 cup flour"], "{}", case.id);
        assert!(result.instructions.starts_with("1. Whisk."), "{}", case.id);
        assert!(result.servings > 0);
        assert!(result.prep_time_minutes > 0 && result.cook_time_minutes > 0);
        assert!(result.nutrition.calories > 0);
        assert!(!result.image_url.is_empty());
    }
}

#[tokio::test]
async fn recipe_sources_classify_429_as_quota_exceeded() {
    for case in recipe_cases() {
        let client = CannedHttpClient::new([Ok(HttpResponse::new(429, "Too Many Requests"))]);
        let adapter = recipe_adapter(case.id, client);

        let failure = adapter.attempt(&request(), 1).await.expect_err("must fail");

        assert_eq!(failure.provider(), case.id);
        assert_eq!(failure.kind(), FailureKind::QuotaExceeded, "{}", case.id);
        assert!(!failure.retryable());
        assert_eq!(failure.code(), "provider.quota_exceeded");
    }
}

#[tokio::test]
async fn recipe_sources_classify_server_and_transport_errors_as_transient() {
    for case in recipe_cases() {
        let client = CannedHttpClient::new([
            Ok(HttpResponse::new(503, "Service Unavailable")),
            Err(HttpError::new("connection reset by peer")),
        ]);
        let adapter = recipe_adapter(case.id, client);

        let server = adapter.attempt(&request(), 1).await.expect_err("must fail");
        let transport = adapter.attempt(&request(), 1).await.expect_err("must fail");

        assert_eq!(server.kind(), FailureKind::Transient, "{}", case.id);
        assert_eq!(transport.kind(), FailureKind::Transient, "{}", case.id);
        assert!(transport.message().contains("connection reset"));
    }
}

#[tokio::test]
async fn recipe_sources_classify_unparseable_bodies_as_malformed() {
    for case in recipe_cases() {
        let client = CannedHttpClient::new([Ok(HttpResponse::ok_json("<html>oops</html>"))]);
        let adapter = recipe_adapter(case.id, client);

        let failure = adapter.attempt(&request(), 1).await.expect_err("must fail");

        assert_eq!(failure.kind(), FailureKind::Malformed, "{}", case.id);
        assert_eq!(failure.code(), "provider.malformed");
    }
}

#[tokio::test]
async fn credentials_travel_in_headers_never_in_urls() {
    let gemini_client = CannedHttpClient::new([Ok(HttpResponse::ok_json(GEMINI_SUCCESS))]);
    let spoon_client = CannedHttpClient::new([
        Ok(HttpResponse::ok_json(SPOONACULAR_SEARCH)),
        Ok(HttpResponse::ok_json(SPOONACULAR_INFORMATION)),
    ]);
    let unsplash_client = CannedHttpClient::new([Ok(HttpResponse::ok_json(
        r#"{"results":[{"urls":{"regular":"https://images.test/x.jpg"}}]}"#,
    ))]);

    recipe_adapter(ProviderId::Gemini, Arc::clone(&gemini_client))
        .attempt(&request(), 1)
        .await
        .expect("gemini succeeds");
    recipe_adapter(ProviderId::Spoonacular, Arc::clone(&spoon_client))
        .attempt(&request(), 1)
        .await
        .expect("spoonacular succeeds");
    UnsplashAdapter::new(Arc::clone(&unsplash_client) as Arc<dyn HttpClient>, SECRET)
        .with_base_url("https://unsplash.test")
        .lookup("Crepes")
        .await
        .expect("unsplash succeeds");

    let all_requests = gemini_client
        .requests()
        .into_iter()
        .chain(spoon_client.requests())
        .chain(unsplash_client.requests());
    for recorded in all_requests {
        assert!(!recorded.url.contains(SECRET), "key leaked into {}", recorded.url);
        assert!(
            recorded.headers.values().any(|value| value.contains(SECRET)),
            "key missing from headers of {}",
            recorded.url
        );
    }
}

#[tokio::test]
async fn image_source_reports_rate_limit_as_quota_and_empty_search_as_none() {
    let client = CannedHttpClient::new([
        Ok(HttpResponse::ok_json(r#"{"total":0,"results":[]}"#)),
        Ok(HttpResponse::new(403, "Rate Limit Exceeded")),
    ]);
    let adapter = UnsplashAdapter::new(client, SECRET).with_base_url("https://unsplash.test");

    let empty = adapter.lookup("Unobtainium Stew").await.expect("lookup ok");
    let limited = adapter.lookup("Unobtainium Stew").await.expect_err("must fail");

    assert_eq!(adapter.id(), ProviderId::Unsplash);
    assert_eq!(empty, None);
    assert_eq!(limited.kind(), FailureKind::QuotaExceeded);
}
