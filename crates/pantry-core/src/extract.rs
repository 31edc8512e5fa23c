//! Recipe extraction from free-form generative output.
//!
//! Tiers, tried in order:
//!
//! 1. a fenced code block containing a JSON object,
//! 2. the widest `{ ... }` span in the text,
//! 3. heuristic field extraction from prose (headings, bullets, numbers),
//! 4. give up with [`ExtractError`].
//!
//! A tier only wins when it yields a substantive draft (ingredients or
//! steps); otherwise the next tier is tried.

use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{NutritionDraft, RecipeDraft};

struct Patterns {
    fenced_json: Regex,
    list_marker: Regex,
    numbered_line: Regex,
    bullet_line: Regex,
    duration_part: Regex,
    prep_time: Regex,
    cook_time: Regex,
    servings: Regex,
    calories: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            fenced_json: Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```")?,
            list_marker: Regex::new(r"^\s*(?:[-*\u{2022}]|\d+[.)]|(?i:step)\s+\d+[:.)]?)\s*")?,
            numbered_line: Regex::new(r"^\s*(?:\d+[.)]|(?i:step)\s+\d+)")?,
            bullet_line: Regex::new(r"^\s*[-*\u{2022}]\s+")?,
            duration_part: Regex::new(
                r"(?i)(\d+(?:\.\d+)?)\s*(hours?|hrs?|h\b|minutes?|mins?|m\b)?",
            )?,
            prep_time: Regex::new(r"(?i)prep(?:aration)?\s*time[^\n\d]{0,20}([^\n]*)")?,
            cook_time: Regex::new(r"(?i)cook(?:ing)?\s*time[^\n\d]{0,20}([^\n]*)")?,
            servings: Regex::new(r"(?i)(?:serves|servings|yield)[^\n\d]{0,12}(\d+)")?,
            calories: Regex::new(r"(?i)(\d+)\s*(?:kcal|calories)|calories[^\n\d]{0,12}(\d+)")?,
        })
    }
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| Patterns::compile().ok());

/// Which tier produced the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    FencedBlock,
    BraceSpan,
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub draft: RecipeDraft,
    pub tier: ExtractionTier,
}

/// No tier produced a usable recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractError {
    reason: String,
}

impl ExtractError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ExtractError {}

pub fn extract_recipe(text: &str) -> Result<Extraction, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::new("provider returned empty text"));
    }
    let patterns = PATTERNS
        .as_ref()
        .ok_or_else(|| ExtractError::new("recipe extraction patterns failed to compile"))?;

    for captures in patterns.fenced_json.captures_iter(text) {
        if let Some(draft) = captures
            .get(1)
            .and_then(|m| patterns.json_draft(m.as_str()))
        {
            return Ok(Extraction {
                draft,
                tier: ExtractionTier::FencedBlock,
            });
        }
    }

    if let Some(draft) = brace_span(text).and_then(|span| patterns.json_draft(span)) {
        return Ok(Extraction {
            draft,
            tier: ExtractionTier::BraceSpan,
        });
    }

    let draft = patterns.free_text_draft(text);
    if draft.is_substantive() {
        return Ok(Extraction {
            draft,
            tier: ExtractionTier::FreeText,
        });
    }

    Err(ExtractError::new(
        "no JSON object or recognizable recipe structure in provider text",
    ))
}

/// "1 hour 15 minutes" -> 75, "20 mins" -> 20, "45" -> 45.
pub fn parse_minutes(text: &str) -> Option<u32> {
    PATTERNS.as_ref()?.minutes(text)
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GeneratedRecipe {
    #[serde(alias = "title", alias = "recipeName")]
    name: Option<String>,
    #[serde(alias = "ingredientList")]
    ingredients: Vec<Value>,
    #[serde(alias = "steps", alias = "method", alias = "directions")]
    instructions: Value,
    #[serde(alias = "prepTimeMinutes", alias = "prep_time")]
    prep_time: Value,
    #[serde(alias = "cookTimeMinutes", alias = "cook_time")]
    cook_time: Value,
    #[serde(alias = "serves", alias = "yield")]
    servings: Value,
    nutrition: Option<GeneratedNutrition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratedNutrition {
    calories: Value,
    protein: Value,
    #[serde(alias = "carbohydrates")]
    carbs: Value,
    fat: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Ingredients,
    Steps,
    Other,
}

impl Patterns {
    fn json_draft(&self, candidate: &str) -> Option<RecipeDraft> {
        let generated: GeneratedRecipe = serde_json::from_str(candidate).ok()?;
        let nutrition = generated.nutrition.unwrap_or_default();

        let draft = RecipeDraft {
            title: generated
                .name
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty()),
            ingredients: generated
                .ingredients
                .iter()
                .filter_map(|value| self.ingredient(value))
                .collect(),
            steps: self.steps(&generated.instructions),
            prep_time_minutes: self.minutes_value(&generated.prep_time),
            cook_time_minutes: self.minutes_value(&generated.cook_time),
            servings: self.number_value(&generated.servings),
            nutrition: NutritionDraft {
                calories: self.number_value(&nutrition.calories),
                protein: self.number_value(&nutrition.protein),
                carbs: self.number_value(&nutrition.carbs),
                fat: self.number_value(&nutrition.fat),
            },
            image_url: None,
        };

        draft.is_substantive().then_some(draft)
    }

    fn ingredient(&self, value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(self.strip_list_marker(text)).filter(|s| !s.is_empty()),
            Value::Object(map) => {
                let name = ["name", "ingredient", "item"]
                    .iter()
                    .find_map(|field| map.get(*field).and_then(Value::as_str))?;
                let quantity = ["quantity", "amount", "qty"]
                    .iter()
                    .find_map(|field| map.get(*field).map(scalar_text))
                    .filter(|text| !text.is_empty());
                let unit = map
                    .get("unit")
                    .map(scalar_text)
                    .filter(|text| !text.is_empty());

                let parts: Vec<String> = [quantity, unit, Some(name.trim().to_owned())]
                    .into_iter()
                    .flatten()
                    .collect();
                Some(parts.join(" "))
            }
            _ => None,
        }
    }

    fn steps(&self, value: &Value) -> Vec<String> {
        match value {
            Value::String(text) => text
                .lines()
                .map(|line| self.strip_list_marker(line))
                .filter(|line| !line.is_empty())
                .collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(self.strip_list_marker(text)),
                    Value::Object(map) => ["step", "text", "instruction", "description"]
                        .iter()
                        .find_map(|field| map.get(*field).and_then(Value::as_str))
                        .map(|text| self.strip_list_marker(text)),
                    _ => None,
                })
                .filter(|line| !line.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn number_value(&self, value: &Value) -> Option<u32> {
        match value {
            Value::Number(number) => number.as_f64().and_then(round_to_u32),
            Value::String(text) => self
                .duration_part
                .captures(text)
                .and_then(|captures| captures.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .and_then(round_to_u32),
            _ => None,
        }
    }

    fn minutes_value(&self, value: &Value) -> Option<u32> {
        match value {
            Value::Number(number) => number.as_f64().and_then(round_to_u32),
            Value::String(text) => self.minutes(text),
            _ => None,
        }
    }

    fn minutes(&self, text: &str) -> Option<u32> {
        let mut total = 0.0_f64;
        let mut matched = false;

        for captures in self.duration_part.captures_iter(text) {
            let Some(amount) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok())
            else {
                continue;
            };
            let unit = captures
                .get(2)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            total += if unit.starts_with('h') { amount * 60.0 } else { amount };
            matched = true;
        }

        if matched {
            round_to_u32(total)
        } else {
            None
        }
    }

    fn strip_list_marker(&self, line: &str) -> String {
        self.list_marker.replace(line.trim(), "").trim().to_owned()
    }

    fn is_list_line(&self, line: &str) -> bool {
        self.bullet_line.is_match(line) || self.numbered_line.is_match(line)
    }

    fn free_text_draft(&self, text: &str) -> RecipeDraft {
        let mut draft = RecipeDraft::default();
        let mut section = Section::Preamble;
        let mut saw_sections = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(next) = classify_heading(trimmed) {
                section = next;
                saw_sections = true;
                continue;
            }

            if draft.title.is_none() && section == Section::Preamble && !self.is_list_line(trimmed)
            {
                if let Some(title) = title_candidate(trimmed) {
                    draft.title = Some(title);
                    continue;
                }
            }

            let target = match section {
                Section::Ingredients => &mut draft.ingredients,
                Section::Steps => &mut draft.steps,
                Section::Preamble | Section::Other => continue,
            };
            let item = self.strip_list_marker(trimmed);
            if !item.is_empty() {
                target.push(item);
            }
        }

        if !saw_sections {
            for line in text.lines() {
                if self.bullet_line.is_match(line) {
                    draft.ingredients.push(self.strip_list_marker(line));
                } else if self.numbered_line.is_match(line) {
                    draft.steps.push(self.strip_list_marker(line));
                }
            }
        }

        draft.prep_time_minutes = self.captured_minutes(&self.prep_time, text);
        draft.cook_time_minutes = self.captured_minutes(&self.cook_time, text);
        draft.servings = self
            .servings
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse().ok());
        draft.nutrition.calories = self.calories.captures(text).and_then(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .and_then(|m| m.as_str().parse().ok())
        });

        draft
    }

    fn captured_minutes(&self, pattern: &Regex, text: &str) -> Option<u32> {
        pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|m| self.minutes(m.as_str()))
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

fn round_to_u32(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX))
        .then(|| value.round() as u32)
}

fn classify_heading(line: &str) -> Option<Section> {
    let heading = line
        .trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .to_ascii_lowercase();

    if heading.is_empty() || heading.len() > 40 {
        return None;
    }
    if heading.contains("ingredient") {
        return Some(Section::Ingredients);
    }
    if ["instruction", "method", "direction", "steps", "preparation"]
        .iter()
        .any(|word| heading.contains(word))
    {
        return Some(Section::Steps);
    }
    if ["nutrition", "notes", "tips"]
        .iter()
        .any(|word| heading.contains(word))
    {
        return Some(Section::Other);
    }
    None
}

fn title_candidate(line: &str) -> Option<String> {
    let lowered = line.to_ascii_lowercase();
    for prefix in ["title:", "recipe:", "name:"] {
        if lowered.starts_with(prefix) {
            return Some(line[prefix.len()..].trim().to_owned()).filter(|t| !t.is_empty());
        }
    }

    if line.starts_with('#') {
        let title = line.trim_start_matches('#').trim().trim_matches('*').trim();
        return (!title.is_empty()).then(|| title.to_owned());
    }

    let plain = line.trim_matches('*').trim();
    let lowered_plain = plain.to_ascii_lowercase();
    let mentions_metadata = ["prep", "cook", "serves", "servings", "calories"]
        .iter()
        .any(|word| lowered_plain.starts_with(word));
    let looks_like_title = !plain.is_empty()
        && plain.len() <= 80
        && !plain.ends_with(':')
        && !plain.ends_with('.')
        && !mentions_metadata;
    looks_like_title.then(|| plain.to_owned())
}
