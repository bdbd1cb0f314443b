use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod behavior;
pub mod menu;
pub mod profile;
pub mod recommendation;

pub use behavior::{
    BehaviorSnapshot, CategoryPreference, IngredientPreference, MenuView, SearchEntry,
};
pub use menu::{CatalogFilter, CatalogItem};
pub use profile::UserProfile;
pub use recommendation::{Method, RecommendationResult, RecommendationSummary, ScoredCandidate};

/// Stable identifier of a menu in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuId(pub String);

/// Identifier of a menu category
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

/// Identifier of a user whose behavior drives recommendations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

macro_rules! string_id {
    ($($ty:ident),*) => {
        $(
            impl Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }

            impl From<String> for $ty {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl $ty {
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }
        )*
    };
}

string_id!(MenuId, CategoryId, UserId);
