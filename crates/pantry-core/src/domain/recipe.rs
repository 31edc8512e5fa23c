use serde::{Deserialize, Serialize};

use super::request::SynthesisRequest;

/// Image shown when no media provider supplied one.
pub const PLACEHOLDER_IMAGE_URL: &str = "/images/recipe-placeholder.jpg";

pub const DEFAULT_PREP_TIME_MINUTES: u32 = 15;
pub const DEFAULT_COOK_TIME_MINUTES: u32 = 30;
pub const DEFAULT_SERVINGS: u32 = 4;

const GENERIC_PANTRY_STAPLES: [&str; 4] = ["olive oil", "salt", "black pepper", "garlic"];

/// Which pipeline stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    Cache,
    PrimaryProvider,
    SecondaryProvider,
    Emergency,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "CACHE",
            Self::PrimaryProvider => "PRIMARY_PROVIDER",
            Self::SecondaryProvider => "SECONDARY_PROVIDER",
            Self::Emergency => "EMERGENCY",
        }
    }
}

/// Per-serving nutrition estimate. Macro values are grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

impl Default for Nutrition {
    fn default() -> Self {
        Self {
            calories: 400,
            protein: 15,
            carbs: 45,
            fat: 15,
        }
    }
}

/// Canonical synthesis output. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub title: String,
    pub ingredient_list: Vec<String>,
    pub instructions: String,
    pub prep_time_minutes: u32,
    pub cook_time_minutes: u32,
    pub servings: u32,
    pub nutrition: Nutrition,
    pub image_url: String,
    pub source: String,
    pub provenance: Provenance,
}

impl SynthesisResult {
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn has_placeholder_image(&self) -> bool {
        self.image_url == PLACEHOLDER_IMAGE_URL
    }
}

/// Partially-filled nutrition as reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NutritionDraft {
    pub calories: Option<u32>,
    pub protein: Option<u32>,
    pub carbs: Option<u32>,
    pub fat: Option<u32>,
}

/// Provider output before defaults are substituted.
///
/// Adapters fill what they can; [`RecipeDraft::finalize`] produces a
/// structurally complete [`SynthesisResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDraft {
    pub title: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub prep_time_minutes: Option<u32>,
    pub cook_time_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub nutrition: NutritionDraft,
    pub image_url: Option<String>,
}

impl RecipeDraft {
    /// True when the draft carries enough content to be worth returning.
    pub fn is_substantive(&self) -> bool {
        !self.ingredients.is_empty() || !self.steps.is_empty()
    }

    pub fn finalize(
        self,
        request: &SynthesisRequest,
        source: &str,
        provenance: Provenance,
    ) -> SynthesisResult {
        let title = non_blank(self.title).unwrap_or_else(|| default_title(request));

        let ingredient_list = {
            let cleaned = clean_lines(self.ingredients);
            if cleaned.is_empty() {
                default_ingredients(request)
            } else {
                cleaned
            }
        };

        let steps = clean_lines(self.steps);
        let instructions = if steps.is_empty() {
            generic_steps(request, &ingredient_list).join("\n")
        } else {
            number_steps(&steps)
        };

        let fallback = Nutrition::default();
        SynthesisResult {
            title,
            ingredient_list,
            instructions,
            prep_time_minutes: positive_or(self.prep_time_minutes, DEFAULT_PREP_TIME_MINUTES),
            cook_time_minutes: positive_or(self.cook_time_minutes, DEFAULT_COOK_TIME_MINUTES),
            servings: positive_or(self.servings, DEFAULT_SERVINGS),
            nutrition: Nutrition {
                calories: positive_or(self.nutrition.calories, fallback.calories),
                protein: self.nutrition.protein.unwrap_or(fallback.protein),
                carbs: self.nutrition.carbs.unwrap_or(fallback.carbs),
                fat: self.nutrition.fat.unwrap_or(fallback.fat),
            },
            image_url: non_blank(self.image_url)
                .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_owned()),
            source: source.to_owned(),
            provenance,
        }
    }
}

/// Title used when a provider omits one (and by emergency synthesis).
pub fn default_title(request: &SynthesisRequest) -> String {
    if let Some(name) = request.dish_name() {
        return name.to_owned();
    }

    let lead: Vec<&str> = request
        .ingredients()
        .iter()
        .take(3)
        .map(String::as_str)
        .collect();
    format!("Simple {} Dish", title_case(&lead.join(" & ")))
}

/// Ingredient list used when a provider omits one.
pub fn default_ingredients(request: &SynthesisRequest) -> Vec<String> {
    if request.has_ingredients() {
        request.ingredients().to_vec()
    } else {
        GENERIC_PANTRY_STAPLES
            .iter()
            .map(|item| (*item).to_owned())
            .collect()
    }
}

/// Generic, always-applicable cooking steps mentioning the request's subject.
pub fn generic_steps(request: &SynthesisRequest, ingredients: &[String]) -> Vec<String> {
    let subject = request.subject();
    let listed = ingredients.join(", ");
    vec![
        format!("1. Gather and prepare your ingredients: {listed}."),
        String::from("2. Wash, peel and chop everything into even, bite-sized pieces."),
        String::from("3. Heat a little oil in a large pan over medium heat."),
        String::from(
            "4. Add the ingredients that take longest to cook first, then the rest, stirring occasionally.",
        ),
        String::from("5. Season with salt and pepper, tasting as you go."),
        format!("6. Cook until everything is tender and heated through, then serve your {subject} warm."),
    ]
}

fn number_steps(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            if step.starts_with(|ch: char| ch.is_ascii_digit()) {
                step.clone()
            } else {
                format!("{}. {step}", index + 1)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty())
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn positive_or(value: Option<u32>, fallback: u32) -> u32 {
    value.filter(|value| *value > 0).unwrap_or(fallback)
}

fn title_case(input: &str) -> String {
    input
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn egg_flour() -> SynthesisRequest {
        SynthesisRequest::from_ingredients(["egg", "flour"]).expect("valid")
    }

    #[test]
    fn empty_draft_is_filled_with_defaults() {
        let result = RecipeDraft::default().finalize(&egg_flour(), "gemini", Provenance::PrimaryProvider);

        assert_eq!(result.title, "Simple Egg & Flour Dish");
        assert_eq!(result.ingredient_list, vec!["egg", "flour"]);
        assert!(!result.instructions.is_empty());
        assert_eq!(result.prep_time_minutes, DEFAULT_PREP_TIME_MINUTES);
        assert_eq!(result.cook_time_minutes, DEFAULT_COOK_TIME_MINUTES);
        assert_eq!(result.servings, DEFAULT_SERVINGS);
        assert_eq!(result.nutrition, Nutrition::default());
        assert!(result.has_placeholder_image());
        assert_eq!(result.source, "gemini");
    }

    #[test]
    fn zero_times_are_replaced_and_steps_numbered() {
        let draft = RecipeDraft {
            title: Some(String::from("  Pancakes ")),
            steps: vec![String::from("Whisk"), String::from(""), String::from("Fry")],
            prep_time_minutes: Some(0),
            servings: Some(2),
            ..RecipeDraft::default()
        };

        let result = draft.finalize(&egg_flour(), "spoonacular", Provenance::SecondaryProvider);

        assert_eq!(result.title, "Pancakes");
        assert_eq!(result.instructions, "1. Whisk\n2. Fry");
        assert_eq!(result.prep_time_minutes, DEFAULT_PREP_TIME_MINUTES);
        assert_eq!(result.servings, 2);
    }

    #[test]
    fn provenance_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Provenance::SecondaryProvider).expect("serialize");
        assert_eq!(json, "\"SECONDARY_PROVIDER\"");
    }

    #[test]
    fn result_serializes_camel_case_fields() {
        let result = RecipeDraft::default().finalize(&egg_flour(), "gemini", Provenance::Cache);
        let value = serde_json::to_value(&result).expect("serialize");

        assert!(value.get("ingredientList").is_some());
        assert!(value.get("prepTimeMinutes").is_some());
        assert_eq!(value["provenance"], "CACHE");
    }

    #[test]
    fn dish_only_request_gets_staple_ingredients() {
        let request = SynthesisRequest::from_dish_name("Tomato Soup").expect("valid");
        assert_eq!(default_title(&request), "Tomato Soup");
        assert_eq!(default_ingredients(&request).len(), GENERIC_PANTRY_STAPLES.len());
    }
}
