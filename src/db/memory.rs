use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BehaviorSource, CatalogStore, ProfileStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        CatalogFilter, CatalogItem, CategoryId, CategoryPreference, IngredientPreference, MenuId,
        MenuView, SearchEntry, UserId, UserProfile,
    },
};

/// Everything one user has done, keyed per field like the database tables
#[derive(Default)]
struct UserRecords {
    views: HashMap<MenuId, MenuView>,
    likes: Vec<MenuId>,
    ingredient_preferences: Vec<IngredientPreference>,
    category_preferences: Vec<CategoryPreference>,
    searches: Vec<SearchEntry>,
    meal_plan: Vec<MenuId>,
    profile: Option<UserProfile>,
}

#[derive(Default)]
struct MemoryStoreInner {
    items: Vec<CatalogItem>,
    category_names: HashMap<CategoryId, String>,
    users: HashMap<UserId, UserRecords>,
    unavailable: bool,
}

/// In-process store for local runs and tests
///
/// Mirrors the database semantics closely enough to drive the engine end to end.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_item(&self, item: CatalogItem) {
        let mut inner = self.inner.write().await;
        inner.items.retain(|existing| existing.id != item.id);
        inner.items.push(item);
    }

    pub async fn insert_category(
        &self,
        category_id: impl Into<CategoryId>,
        name: impl Into<String>,
    ) {
        let mut inner = self.inner.write().await;
        inner.category_names.insert(category_id.into(), name.into());
    }

    /// Makes every catalog read fail, as if the database were down
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    pub async fn record_view(&self, user_id: &UserId, menu_id: &MenuId, at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        let records = inner.users.entry(user_id.clone()).or_default();
        let view = records
            .views
            .entry(menu_id.clone())
            .or_insert_with(|| MenuView {
                menu_id: menu_id.clone(),
                view_count: 0,
                last_viewed_at: None,
            });
        view.view_count += 1;
        view.last_viewed_at = Some(at);
    }

    pub async fn record_like(&self, user_id: &UserId, menu_id: &MenuId) {
        let mut inner = self.inner.write().await;
        let records = inner.users.entry(user_id.clone()).or_default();
        if !records.likes.contains(menu_id) {
            records.likes.push(menu_id.clone());
        }
    }

    pub async fn set_ingredient_preference(&self, user_id: &UserId, ingredient: &str, score: f64) {
        let mut inner = self.inner.write().await;
        let records = inner.users.entry(user_id.clone()).or_default();
        records
            .ingredient_preferences
            .retain(|p| p.ingredient != ingredient);
        records.ingredient_preferences.push(IngredientPreference {
            ingredient: ingredient.to_string(),
            score,
        });
    }

    pub async fn set_category_preference(
        &self,
        user_id: &UserId,
        category_id: &CategoryId,
        score: f64,
    ) {
        let mut inner = self.inner.write().await;
        let category_name = inner.category_names.get(category_id).cloned();
        let records = inner.users.entry(user_id.clone()).or_default();
        records
            .category_preferences
            .retain(|p| &p.category_id != category_id);
        records.category_preferences.push(CategoryPreference {
            category_id: category_id.clone(),
            category_name,
            score,
        });
    }

    pub async fn record_search(&self, user_id: &UserId, query: &str, at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        let records = inner.users.entry(user_id.clone()).or_default();
        records.searches.push(SearchEntry {
            query: query.to_string(),
            search_type: None,
            searched_at: at,
        });
    }

    pub async fn add_to_meal_plan(&self, user_id: &UserId, menu_id: &MenuId) {
        let mut inner = self.inner.write().await;
        let records = inner.users.entry(user_id.clone()).or_default();
        records.meal_plan.push(menu_id.clone());
    }

    pub async fn set_profile(&self, user_id: &UserId, profile: UserProfile) {
        let mut inner = self.inner.write().await;
        inner.users.entry(user_id.clone()).or_default().profile = Some(profile);
    }

    async fn read_user<T>(
        &self,
        user_id: &UserId,
        read: impl FnOnce(&UserRecords) -> T,
    ) -> Option<T> {
        let inner = self.inner.read().await;
        inner.users.get(user_id).map(read)
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn list_items(&self, filter: &CatalogFilter) -> AppResult<Vec<CatalogItem>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            return Err(AppError::StoreUnavailable(
                "catalog store is not reachable".to_string(),
            ));
        }
        Ok(filter.apply(inner.items.clone()))
    }
}

#[async_trait::async_trait]
impl BehaviorSource for MemoryStore {
    async fn viewed_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuView>> {
        let mut views = self
            .read_user(user_id, |r| r.views.values().cloned().collect::<Vec<_>>())
            .await
            .unwrap_or_default();
        views.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        views.truncate(limit);
        Ok(views)
    }

    async fn liked_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuId>> {
        let mut likes = self
            .read_user(user_id, |r| r.likes.clone())
            .await
            .unwrap_or_default();
        likes.truncate(limit);
        Ok(likes)
    }

    async fn ingredient_preferences(
        &self,
        user_id: &UserId,
    ) -> AppResult<Vec<IngredientPreference>> {
        Ok(self
            .read_user(user_id, |r| r.ingredient_preferences.clone())
            .await
            .unwrap_or_default())
    }

    async fn category_preferences(&self, user_id: &UserId) -> AppResult<Vec<CategoryPreference>> {
        Ok(self
            .read_user(user_id, |r| r.category_preferences.clone())
            .await
            .unwrap_or_default())
    }

    async fn recent_searches(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AppResult<Vec<SearchEntry>> {
        let mut searches = self
            .read_user(user_id, |r| r.searches.clone())
            .await
            .unwrap_or_default();
        searches.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
        searches.truncate(limit);
        Ok(searches)
    }

    async fn meal_plan_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuId>> {
        let mut meal_plan = self
            .read_user(user_id, |r| r.meal_plan.clone())
            .await
            .unwrap_or_default();
        meal_plan.truncate(limit);
        Ok(meal_plan)
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &UserId) -> AppResult<Option<UserProfile>> {
        Ok(self
            .read_user(user_id, |r| r.profile.clone())
            .await
            .flatten())
    }
}
