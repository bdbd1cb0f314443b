use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryId, MenuId};

/// A menu the user has opened, with how often and when last
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuView {
    pub menu_id: MenuId,
    pub view_count: u32,
    #[serde(default)]
    pub last_viewed_at: Option<DateTime<Utc>>,
}

/// Learned preference for an ingredient token, roughly in [-10, 10]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientPreference {
    pub ingredient: String,
    pub score: f64,
}

/// Learned preference for a category, same range as ingredients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryPreference {
    pub category_id: CategoryId,
    #[serde(default)]
    pub category_name: Option<String>,
    pub score: f64,
}

impl CategoryPreference {
    /// Display label, falling back to the id when the category row carries no name
    pub fn label(&self) -> &str {
        self.category_name
            .as_deref()
            .unwrap_or_else(|| self.category_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchEntry {
    pub query: String,
    #[serde(default)]
    pub search_type: Option<String>,
    pub searched_at: DateTime<Utc>,
}

/// Point-in-time aggregate of one user's interaction history.
///
/// Rebuilt on every request and never persisted. Every list may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BehaviorSnapshot {
    pub viewed: Vec<MenuView>,
    pub liked: Vec<MenuId>,
    pub ingredient_preferences: Vec<IngredientPreference>,
    pub category_preferences: Vec<CategoryPreference>,
    pub recent_searches: Vec<SearchEntry>,
    pub meal_plan: Vec<MenuId>,
}

impl BehaviorSnapshot {
    pub fn is_empty(&self) -> bool {
        self.viewed.is_empty()
            && self.liked.is_empty()
            && self.ingredient_preferences.is_empty()
            && self.category_preferences.is_empty()
            && self.recent_searches.is_empty()
            && self.meal_plan.is_empty()
    }

    pub fn view_count(&self, menu_id: &MenuId) -> Option<u32> {
        self.viewed
            .iter()
            .find(|v| &v.menu_id == menu_id)
            .map(|v| v.view_count)
    }

    pub fn has_viewed(&self, menu_id: &MenuId) -> bool {
        self.view_count(menu_id).is_some()
    }

    pub fn has_liked(&self, menu_id: &MenuId) -> bool {
        self.liked.contains(menu_id)
    }

    pub fn in_meal_plan(&self, menu_id: &MenuId) -> bool {
        self.meal_plan.contains(menu_id)
    }

    /// Stored score for an ingredient token, matched case-insensitively
    pub fn ingredient_score(&self, ingredient: &str) -> Option<f64> {
        self.ingredient_preferences
            .iter()
            .find(|p| p.ingredient.to_lowercase() == ingredient.to_lowercase())
            .map(|p| p.score)
    }

    pub fn category_preference(&self, category_id: &CategoryId) -> Option<&CategoryPreference> {
        self.category_preferences
            .iter()
            .find(|p| &p.category_id == category_id)
    }

    /// Ingredients the user leans towards, strongest first
    pub fn liked_ingredients(&self) -> impl Iterator<Item = &IngredientPreference> {
        self.ingredient_preferences.iter().filter(|p| p.score > 0.0)
    }

    /// Ingredients the user avoids, strongest aversion first
    pub fn disliked_ingredients(&self) -> impl Iterator<Item = &IngredientPreference> {
        self.ingredient_preferences
            .iter()
            .rev()
            .filter(|p| p.score < 0.0)
    }
}
