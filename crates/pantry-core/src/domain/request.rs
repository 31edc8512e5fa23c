use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::ValidationError;

const MAX_INGREDIENT_LEN: usize = 100;
const MAX_INGREDIENTS: usize = 50;
const MAX_DISH_NAME_LEN: usize = 200;

/// Validated synthesis input: an ordered ingredient set and/or a dish name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    ingredients: Vec<String>,
    dish_name: Option<String>,
}

impl SynthesisRequest {
    /// Normalize and validate the caller's input.
    ///
    /// Ingredients are trimmed, blanks dropped and exact duplicates collapsed
    /// while keeping first-seen order. A blank dish name counts as absent.
    pub fn new<I, S>(ingredients: I, dish_name: Option<&str>) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for raw in ingredients {
            let trimmed = raw.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }

            let len = trimmed.chars().count();
            if len > MAX_INGREDIENT_LEN {
                return Err(ValidationError::IngredientTooLong {
                    len,
                    max: MAX_INGREDIENT_LEN,
                });
            }

            if !normalized.iter().any(|existing| existing == trimmed) {
                normalized.push(trimmed.to_owned());
            }
        }

        if normalized.len() > MAX_INGREDIENTS {
            return Err(ValidationError::TooManyIngredients {
                count: normalized.len(),
                max: MAX_INGREDIENTS,
            });
        }

        let dish_name = dish_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned);

        if let Some(name) = &dish_name {
            let len = name.chars().count();
            if len > MAX_DISH_NAME_LEN {
                return Err(ValidationError::DishNameTooLong {
                    len,
                    max: MAX_DISH_NAME_LEN,
                });
            }
        }

        if normalized.is_empty() && dish_name.is_none() {
            return Err(ValidationError::EmptyRequest);
        }

        Ok(Self {
            ingredients: normalized,
            dish_name,
        })
    }

    pub fn from_ingredients<I, S>(ingredients: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(ingredients, None)
    }

    pub fn from_dish_name(dish_name: &str) -> Result<Self, ValidationError> {
        Self::new(Vec::<String>::new(), Some(dish_name))
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn dish_name(&self) -> Option<&str> {
        self.dish_name.as_deref()
    }

    pub fn has_ingredients(&self) -> bool {
        !self.ingredients.is_empty()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_request(self)
    }

    /// Short human label used in prompts and generated titles.
    pub fn subject(&self) -> String {
        match &self.dish_name {
            Some(name) => name.clone(),
            None => self.ingredients.join(", "),
        }
    }
}

/// Deterministic cache key for a request.
///
/// Layout: `recipe:<dish name or empty>:<sorted, comma-joined ingredients>`.
/// Input order of the ingredients never changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub const PREFIX: &'static str = "recipe";

    pub fn for_request(request: &SynthesisRequest) -> Self {
        let mut sorted: Vec<&str> = request.ingredients.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        Self(format!(
            "{}:{}:{}",
            Self::PREFIX,
            request.dish_name().unwrap_or_default(),
            sorted.join(",")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CacheKey> for String {
    fn from(value: CacheKey) -> Self {
        value.0
    }
}
