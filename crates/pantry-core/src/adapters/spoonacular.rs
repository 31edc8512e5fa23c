use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::adapters::{classify_status, AdapterFuture, ProviderFailure, RecipeSource};
use crate::domain::{NutritionDraft, RecipeDraft};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::{Provenance, ProviderId, SynthesisRequest, SynthesisResult};

const SPOONACULAR_BASE_URL: &str = "https://api.spoonacular.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    ByDish,
    ByIngredients,
}

/// Structured recipe database used as the secondary provider.
///
/// Each attempt is a search followed by a detail lookup of the best
/// candidate. Attempt 1 searches by dish name when one is given, otherwise
/// by ingredients; attempt 2 switches to the other mode when both inputs
/// exist.
#[derive(Clone)]
pub struct SpoonacularAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl SpoonacularAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: SPOONACULAR_BASE_URL.to_owned(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn auth(&self) -> HttpAuth {
        HttpAuth::header("x-api-key", self.api_key.as_str())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T, ProviderFailure> {
        let provider = ProviderId::Spoonacular;
        let request = HttpRequest::get(url)
            .with_auth(&self.auth())
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| ProviderFailure::from_transport(provider, &e))?;

        if !response.is_success() {
            return Err(classify_spoonacular_status(response.status, &response.body));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            ProviderFailure::malformed(provider, format!("failed to parse spoonacular response: {e}"))
        })
    }

    async fn search(
        &self,
        request: &SynthesisRequest,
        mode: SearchMode,
    ) -> Result<Option<u64>, ProviderFailure> {
        match mode {
            SearchMode::ByDish => {
                let dish = request.dish_name().unwrap_or_default();
                let url = format!(
                    "{}/recipes/complexSearch?query={}&number=1",
                    self.base_url,
                    urlencoding::encode(dish)
                );
                let page: ComplexSearchResponse = self.get_json(url).await?;
                Ok(page.results.first().map(|hit| hit.id))
            }
            SearchMode::ByIngredients => {
                let url = format!(
                    "{}/recipes/findByIngredients?ingredients={}&number=1&ranking=1&ignorePantry=true",
                    self.base_url,
                    urlencoding::encode(&request.ingredients().join(","))
                );
                let hits: Vec<IngredientSearchHit> = self.get_json(url).await?;
                Ok(hits.first().map(|hit| hit.id))
            }
        }
    }

    async fn lookup(
        &self,
        request: &SynthesisRequest,
        attempt: u32,
    ) -> Result<SynthesisResult, ProviderFailure> {
        let provider = ProviderId::Spoonacular;
        let mode = search_mode(request, attempt);
        debug!(?mode, attempt, "searching spoonacular");

        let recipe_id = self.search(request, mode).await?.ok_or_else(|| {
            ProviderFailure::malformed(
                provider,
                format!("spoonacular found no candidates for '{}'", request.subject()),
            )
        })?;

        let url = format!(
            "{}/recipes/{}/information?includeNutrition=true",
            self.base_url, recipe_id
        );
        let information: RecipeInformation = self.get_json(url).await?;

        let draft = information.into_draft();
        if !draft.is_substantive() {
            return Err(ProviderFailure::malformed(
                provider,
                format!("spoonacular recipe {recipe_id} has no ingredients or steps"),
            ));
        }

        Ok(draft.finalize(request, provider.as_str(), Provenance::SecondaryProvider))
    }
}

impl RecipeSource for SpoonacularAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Spoonacular
    }

    fn attempt<'a>(
        &'a self,
        request: &'a SynthesisRequest,
        attempt: u32,
    ) -> AdapterFuture<'a, SynthesisResult> {
        Box::pin(self.lookup(request, attempt))
    }
}

fn search_mode(request: &SynthesisRequest, attempt: u32) -> SearchMode {
    let preferred = if request.dish_name().is_some() {
        SearchMode::ByDish
    } else {
        SearchMode::ByIngredients
    };
    let both = request.dish_name().is_some() && request.has_ingredients();

    match (attempt, both, preferred) {
        (2.., true, SearchMode::ByDish) => SearchMode::ByIngredients,
        (2.., true, SearchMode::ByIngredients) => SearchMode::ByDish,
        _ => preferred,
    }
}

fn classify_spoonacular_status(status: u16, body: &str) -> ProviderFailure {
    if status == 402 || status == 429 {
        return ProviderFailure::quota_exceeded(
            ProviderId::Spoonacular,
            format!("spoonacular daily points exhausted (status {status})"),
        );
    }
    classify_status(ProviderId::Spoonacular, status, body)
}

#[derive(Debug, Deserialize)]
struct ComplexSearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct IngredientSearchHit {
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RecipeInformation {
    title: Option<String>,
    image: Option<String>,
    servings: Option<u32>,
    ready_in_minutes: Option<i64>,
    preparation_minutes: Option<i64>,
    cooking_minutes: Option<i64>,
    extended_ingredients: Vec<ExtendedIngredient>,
    analyzed_instructions: Vec<AnalyzedInstruction>,
    instructions: Option<String>,
    nutrition: Option<NutritionInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtendedIngredient {
    original: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzedInstruction {
    steps: Vec<InstructionStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstructionStep {
    step: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NutritionInfo {
    nutrients: Vec<Nutrient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Nutrient {
    name: String,
    amount: f64,
}

impl RecipeInformation {
    fn into_draft(self) -> RecipeDraft {
        let ingredients = self
            .extended_ingredients
            .into_iter()
            .filter_map(|ingredient| ingredient.original.or(ingredient.name))
            .collect();

        let mut steps: Vec<String> = self
            .analyzed_instructions
            .into_iter()
            .flat_map(|block| block.steps)
            .map(|step| step.step)
            .collect();
        if steps.is_empty() {
            steps = self
                .instructions
                .as_deref()
                .map(html_to_lines)
                .unwrap_or_default();
        }

        let prep = positive_minutes(self.preparation_minutes);
        let cook = positive_minutes(self.cooking_minutes).or_else(|| {
            let ready = positive_minutes(self.ready_in_minutes)?;
            positive_minutes(Some(i64::from(ready) - i64::from(prep.unwrap_or(0))))
        });

        let nutrients = self.nutrition.map(|n| n.nutrients).unwrap_or_default();
        let nutrient = |name: &str| {
            nutrients
                .iter()
                .find(|nutrient| nutrient.name.eq_ignore_ascii_case(name))
                .filter(|nutrient| nutrient.amount.is_finite() && nutrient.amount >= 0.0)
                .map(|nutrient| nutrient.amount.round() as u32)
        };

        RecipeDraft {
            title: self.title,
            ingredients,
            steps,
            prep_time_minutes: prep,
            cook_time_minutes: cook,
            servings: self.servings,
            nutrition: NutritionDraft {
                calories: nutrient("Calories"),
                protein: nutrient("Protein"),
                carbs: nutrient("Carbohydrates"),
                fat: nutrient("Fat"),
            },
            image_url: self.image,
        }
    }
}

fn positive_minutes(value: Option<i64>) -> Option<u32> {
    value
        .filter(|minutes| *minutes > 0)
        .and_then(|minutes| u32::try_from(minutes).ok())
}

/// Spoonacular's free-form `instructions` field is HTML; tags become line
/// breaks.
fn html_to_lines(html: &str) -> Vec<String> {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push('\n');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FailureKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::http_client::HttpResponse;

    const INFORMATION: &str = r#"{
        "id": 716429,
        "title": "Pasta with Garlic",
        "image": "https://img.spoonacular.test/716429.jpg",
        "servings": 2,
        "readyInMinutes": 45,
        "preparationMinutes": 10,
        "cookingMinutes": null,
        "extendedIngredients": [
            {"original": "1 tbsp butter", "name": "butter"},
            {"name": "garlic"}
        ],
        "analyzedInstructions": [
            {"steps": [{"number": 1, "step": "Boil the pasta."}, {"number": 2, "step": "Melt butter with garlic."}]}
        ],
        "nutrition": {"nutrients": [
            {"name": "Calories", "amount": 584.46, "unit": "kcal"},
            {"name": "Fat", "amount": 19.2, "unit": "g"},
            {"name": "Carbohydrates", "amount": 83.5, "unit": "g"},
            {"name": "Protein", "amount": 19.4, "unit": "g"}
        ]}
    }"#;

    fn adapter(client: Arc<ScriptedHttpClient>) -> SpoonacularAdapter {
        SpoonacularAdapter::new(client, "spoon-key").with_base_url("https://spoon.test")
    }

    #[tokio::test]
    async fn dish_search_then_detail_lookup() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok_json(r#"{"results":[{"id":716429,"title":"Pasta"}],"totalResults":1}"#)),
            Ok(HttpResponse::ok_json(INFORMATION)),
        ]));
        let request = SynthesisRequest::from_dish_name("Garlic Pasta").expect("valid request");

        let result = adapter(Arc::clone(&client))
            .attempt(&request, 1)
            .await
            .expect("attempt should succeed");

        assert_eq!(result.title, "Pasta with Garlic");
        assert_eq!(result.ingredient_list, vec!["1 tbsp butter", "garlic"]);
        assert_eq!(
            result.instructions,
            "1. Boil the pasta.\n2. Melt butter with garlic."
        );
        assert_eq!(result.prep_time_minutes, 10);
        assert_eq!(result.cook_time_minutes, 35);
        assert_eq!(result.servings, 2);
        assert_eq!(result.nutrition.calories, 584);
        assert_eq!(result.nutrition.carbs, 84);
        assert_eq!(result.image_url, "https://img.spoonacular.test/716429.jpg");
        assert_eq!(result.provenance, Provenance::SecondaryProvider);

        let requests = client.recorded_requests();
        assert_eq!(
            requests[0].url,
            "https://spoon.test/recipes/complexSearch?query=Garlic%20Pasta&number=1"
        );
        assert_eq!(
            requests[1].url,
            "https://spoon.test/recipes/716429/information?includeNutrition=true"
        );
        assert_eq!(
            requests[0].headers.get("x-api-key").map(String::as_str),
            Some("spoon-key")
        );
    }

    #[tokio::test]
    async fn ingredient_only_request_uses_find_by_ingredients() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok_json(r#"[{"id":42,"title":"Omelette"}]"#)),
            Ok(HttpResponse::ok_json(INFORMATION)),
        ]));
        let request = SynthesisRequest::from_ingredients(["egg", "flour"]).expect("valid request");

        adapter(Arc::clone(&client))
            .attempt(&request, 1)
            .await
            .expect("attempt should succeed");

        let requests = client.recorded_requests();
        assert!(requests[0]
            .url
            .starts_with("https://spoon.test/recipes/findByIngredients?ingredients=egg%2Cflour"));
    }

    #[test]
    fn second_attempt_switches_mode_only_when_both_inputs_exist() {
        let both = SynthesisRequest::new(["egg"], Some("Frittata")).expect("valid request");
        let dish_only = SynthesisRequest::from_dish_name("Frittata").expect("valid request");

        assert_eq!(search_mode(&both, 1), SearchMode::ByDish);
        assert_eq!(search_mode(&both, 2), SearchMode::ByIngredients);
        assert_eq!(search_mode(&dish_only, 2), SearchMode::ByDish);
    }

    #[tokio::test]
    async fn payment_required_is_quota_exceeded() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::new(
            402,
            r#"{"status":"failure","code":402,"message":"Your daily points limit of 150 has been reached."}"#,
        ))]));
        let request = SynthesisRequest::from_dish_name("Frittata").expect("valid request");

        let failure = adapter(client)
            .attempt(&request, 1)
            .await
            .expect_err("must fail");

        assert_eq!(failure.kind(), FailureKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn no_candidates_is_malformed() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
            r#"{"results":[],"totalResults":0}"#,
        ))]));
        let request = SynthesisRequest::from_dish_name("Unobtainium Stew").expect("valid request");

        let failure = adapter(client)
            .attempt(&request, 1)
            .await
            .expect_err("must fail");

        assert_eq!(failure.kind(), FailureKind::Malformed);
        assert!(failure.message().contains("Unobtainium Stew"));
    }

    #[test]
    fn html_instructions_become_steps() {
        let lines = html_to_lines("<ol><li>Chop onions.</li><li>Fry until golden.</li></ol>");
        assert_eq!(lines, vec!["Chop onions.", "Fry until golden."]);
    }
}
