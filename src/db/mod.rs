//! Read capabilities over the menu/behavior data store
//!
//! The engine never writes. Each capability is a separate trait so callers can
//! back them with different stores, and so tests can fail one without the others.

use crate::{
    error::AppResult,
    models::{
        CatalogFilter, CatalogItem, CategoryPreference, IngredientPreference, MenuId, MenuView,
        SearchEntry, UserId, UserProfile,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Menu catalog listing
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_items(&self, filter: &CatalogFilter) -> AppResult<Vec<CatalogItem>>;
}

/// Per-field reads of a user's interaction history
///
/// Implementations may return records in any order; the aggregator sorts and caps.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BehaviorSource: Send + Sync {
    async fn viewed_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuView>>;

    async fn liked_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuId>>;

    async fn ingredient_preferences(
        &self,
        user_id: &UserId,
    ) -> AppResult<Vec<IngredientPreference>>;

    async fn category_preferences(&self, user_id: &UserId) -> AppResult<Vec<CategoryPreference>>;

    async fn recent_searches(&self, user_id: &UserId, limit: usize)
        -> AppResult<Vec<SearchEntry>>;

    async fn meal_plan_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuId>>;
}

/// User profile lookup; `None` when the user has no profile row
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &UserId) -> AppResult<Option<UserProfile>>;
}
