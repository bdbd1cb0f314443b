use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use super::{BehaviorSource, CatalogStore, ProfileStore};
use crate::{
    error::AppResult,
    models::{
        CatalogFilter, CatalogItem, CategoryId, CategoryPreference, IngredientPreference, MenuId,
        MenuView, SearchEntry, UserId, UserProfile,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const MENU_COLUMNS: &str = r#"
    menu_id::text AS menu_id,
    menu_name,
    menu_image,
    menu_description,
    menu_recipe,
    category_id::text AS category_id,
    menu_like_count
"#;

#[derive(Debug, FromRow)]
struct MenuRow {
    menu_id: String,
    menu_name: String,
    menu_image: Option<String>,
    menu_description: Option<String>,
    menu_recipe: Option<String>,
    category_id: Option<String>,
    menu_like_count: Option<i32>,
}

impl From<MenuRow> for CatalogItem {
    fn from(row: MenuRow) -> Self {
        CatalogItem {
            id: MenuId(row.menu_id),
            name: row.menu_name,
            image: row.menu_image,
            description: row.menu_description.unwrap_or_default(),
            recipe: row.menu_recipe.unwrap_or_default(),
            category_id: row.category_id.map(CategoryId),
            // Counter is adjusted by like/unlike elsewhere and can dip below zero
            popularity: row.menu_like_count.unwrap_or(0).max(0) as u32,
        }
    }
}

#[derive(Debug, FromRow)]
struct ViewRow {
    menu_id: String,
    view_count: Option<i32>,
    last_viewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct MenuIdRow {
    menu_id: String,
}

#[derive(Debug, FromRow)]
struct IngredientPrefRow {
    ingredient_name: String,
    preference_score: Option<f64>,
}

#[derive(Debug, FromRow)]
struct CategoryPrefRow {
    category_id: String,
    category_name: Option<String>,
    preference_score: Option<f64>,
}

#[derive(Debug, FromRow)]
struct SearchRow {
    search_query: String,
    search_type: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    allergies: Option<String>,
    favorite_foods: Option<String>,
    calorie_limit: Option<i32>,
}

/// PostgreSQL-backed store using the schema in `migrations/`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `LIMIT NULL` is `LIMIT ALL` in PostgreSQL, so one statement serves both filters
fn catalog_query(filter: &CatalogFilter) -> String {
    let order = if filter.by_popularity {
        "ORDER BY menu_like_count DESC NULLS LAST, menu_id"
    } else {
        "ORDER BY menu_id"
    };
    format!("SELECT {} FROM menus {} LIMIT $1", MENU_COLUMNS, order)
}

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    async fn list_items(&self, filter: &CatalogFilter) -> AppResult<Vec<CatalogItem>> {
        let sql = catalog_query(filter);
        let rows: Vec<MenuRow> = sqlx::query_as(&sql)
            .bind(filter.limit.map(|limit| limit as i64))
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = rows.len(), "Loaded catalog from database");

        Ok(rows.into_iter().map(CatalogItem::from).collect())
    }
}

#[async_trait::async_trait]
impl BehaviorSource for PgStore {
    async fn viewed_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuView>> {
        let rows: Vec<ViewRow> = sqlx::query_as(
            r#"
            SELECT menu_id::text AS menu_id, view_count, last_viewed_at
            FROM user_menu_views
            WHERE user_id = $1
            ORDER BY view_count DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MenuView {
                menu_id: MenuId(row.menu_id),
                view_count: row.view_count.unwrap_or(0).max(0) as u32,
                last_viewed_at: row.last_viewed_at,
            })
            .collect())
    }

    async fn liked_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuId>> {
        let rows: Vec<MenuIdRow> = sqlx::query_as(
            r#"
            SELECT menu_id::text AS menu_id
            FROM menu_likes
            WHERE user_id = $1
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| MenuId(row.menu_id)).collect())
    }

    async fn ingredient_preferences(
        &self,
        user_id: &UserId,
    ) -> AppResult<Vec<IngredientPreference>> {
        let rows: Vec<IngredientPrefRow> = sqlx::query_as(
            r#"
            SELECT ingredient_name, preference_score
            FROM user_ingredient_preferences
            WHERE user_id = $1
            ORDER BY preference_score DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| IngredientPreference {
                ingredient: row.ingredient_name,
                score: row.preference_score.unwrap_or(0.0),
            })
            .collect())
    }

    async fn category_preferences(&self, user_id: &UserId) -> AppResult<Vec<CategoryPreference>> {
        let rows: Vec<CategoryPrefRow> = sqlx::query_as(
            r#"
            SELECT p.category_id::text AS category_id, c.category_name, p.preference_score
            FROM user_category_preferences p
            LEFT JOIN categories c ON c.category_id = p.category_id
            WHERE p.user_id = $1
            ORDER BY p.preference_score DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryPreference {
                category_id: CategoryId(row.category_id),
                category_name: row.category_name,
                score: row.preference_score.unwrap_or(0.0),
            })
            .collect())
    }

    async fn recent_searches(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AppResult<Vec<SearchEntry>> {
        let rows: Vec<SearchRow> = sqlx::query_as(
            r#"
            SELECT search_query, search_type, created_at
            FROM user_search_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SearchEntry {
                query: row.search_query,
                search_type: row.search_type,
                searched_at: row.created_at,
            })
            .collect())
    }

    async fn meal_plan_menus(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<MenuId>> {
        let rows: Vec<MenuIdRow> = sqlx::query_as(
            r#"
            SELECT menu_id::text AS menu_id
            FROM weekly_meal_plans
            WHERE user_id = $1
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| MenuId(row.menu_id)).collect())
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: &UserId) -> AppResult<Option<UserProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT allergies, favorite_foods, calorie_limit
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserProfile {
            allergies: row.allergies,
            favorite_foods: row.favorite_foods,
            calorie_limit: row.calorie_limit,
        }))
    }
}
