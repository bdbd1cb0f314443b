use std::sync::Arc;

use crate::{
    db::BehaviorSource,
    error::AppResult,
    models::{BehaviorSnapshot, UserId},
};

/// Caps applied to each behavior list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorLimits {
    pub viewed: usize,
    pub liked: usize,
    pub searches: usize,
    pub meal_plan: usize,
}

impl Default for BehaviorLimits {
    fn default() -> Self {
        Self {
            viewed: 20,
            liked: 20,
            searches: 10,
            meal_plan: 30,
        }
    }
}

/// Collects a user's behavior records into one snapshot
#[derive(Clone)]
pub struct BehaviorAggregator {
    source: Arc<dyn BehaviorSource>,
    limits: BehaviorLimits,
}

impl BehaviorAggregator {
    pub fn new(source: Arc<dyn BehaviorSource>, limits: BehaviorLimits) -> Self {
        Self { source, limits }
    }

    /// Fetches all behavior fields concurrently.
    ///
    /// A failing sub-query leaves its field empty; the snapshot itself never fails.
    /// Ordering and caps are enforced here whatever order the source returned.
    pub async fn snapshot(&self, user_id: &UserId) -> BehaviorSnapshot {
        let limits = self.limits;
        let (viewed, liked, ingredients, categories, searches, meal_plan) = tokio::join!(
            self.source.viewed_menus(user_id, limits.viewed),
            self.source.liked_menus(user_id, limits.liked),
            self.source.ingredient_preferences(user_id),
            self.source.category_preferences(user_id),
            self.source.recent_searches(user_id, limits.searches),
            self.source.meal_plan_menus(user_id, limits.meal_plan),
        );

        let mut snapshot = BehaviorSnapshot {
            viewed: or_empty(viewed, user_id, "viewed_menus"),
            liked: or_empty(liked, user_id, "liked_menus"),
            ingredient_preferences: or_empty(ingredients, user_id, "ingredient_preferences"),
            category_preferences: or_empty(categories, user_id, "category_preferences"),
            recent_searches: or_empty(searches, user_id, "recent_searches"),
            meal_plan: or_empty(meal_plan, user_id, "meal_plan"),
        };

        snapshot
            .viewed
            .sort_by(|a, b| b.view_count.cmp(&a.view_count));
        snapshot.viewed.truncate(limits.viewed);
        snapshot.liked.truncate(limits.liked);
        snapshot
            .ingredient_preferences
            .sort_by(|a, b| b.score.total_cmp(&a.score));
        snapshot
            .category_preferences
            .sort_by(|a, b| b.score.total_cmp(&a.score));
        snapshot
            .recent_searches
            .sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
        snapshot.recent_searches.truncate(limits.searches);
        snapshot.meal_plan.truncate(limits.meal_plan);

        tracing::debug!(
            user_id = %user_id,
            viewed = snapshot.viewed.len(),
            liked = snapshot.liked.len(),
            ingredient_prefs = snapshot.ingredient_preferences.len(),
            category_prefs = snapshot.category_preferences.len(),
            searches = snapshot.recent_searches.len(),
            meal_plan = snapshot.meal_plan.len(),
            "Behavior snapshot assembled"
        );

        snapshot
    }
}

fn or_empty<T>(result: AppResult<Vec<T>>, user_id: &UserId, field: &'static str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(
            user_id = %user_id,
            field = field,
            error = %e,
            "Behavior query failed, continuing without it"
        );
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockBehaviorSource;
    use crate::error::AppError;
    use crate::models::{IngredientPreference, MenuId, MenuView, SearchEntry};
    use chrono::{Duration, Utc};

    fn healthy_source() -> MockBehaviorSource {
        let mut source = MockBehaviorSource::new();
        source.expect_viewed_menus().returning(|_, _| {
            Ok(vec![
                MenuView {
                    menu_id: MenuId::from("M1"),
                    view_count: 1,
                    last_viewed_at: None,
                },
                MenuView {
                    menu_id: MenuId::from("M2"),
                    view_count: 7,
                    last_viewed_at: None,
                },
            ])
        });
        source
            .expect_liked_menus()
            .returning(|_, _| Ok(vec![MenuId::from("M3")]));
        source.expect_ingredient_preferences().returning(|_| {
            Ok(vec![
                IngredientPreference {
                    ingredient: "tofu".to_string(),
                    score: -2.0,
                },
                IngredientPreference {
                    ingredient: "pork".to_string(),
                    score: 8.0,
                },
            ])
        });
        source
            .expect_category_preferences()
            .returning(|_| Ok(vec![]));
        source.expect_recent_searches().returning(|_, _| {
            let now = Utc::now();
            Ok(vec![
                SearchEntry {
                    query: "old".to_string(),
                    search_type: None,
                    searched_at: now - Duration::days(2),
                },
                SearchEntry {
                    query: "new".to_string(),
                    search_type: None,
                    searched_at: now,
                },
            ])
        });
        source
            .expect_meal_plan_menus()
            .returning(|_, _| Ok(vec![MenuId::from("M4")]));
        source
    }

    #[tokio::test]
    async fn test_snapshot_orders_fields() {
        let aggregator =
            BehaviorAggregator::new(Arc::new(healthy_source()), BehaviorLimits::default());

        let snapshot = aggregator.snapshot(&UserId::from("U1")).await;

        assert_eq!(snapshot.viewed[0].menu_id, MenuId::from("M2"));
        assert_eq!(snapshot.ingredient_preferences[0].ingredient, "pork");
        assert_eq!(snapshot.recent_searches[0].query, "new");
        assert_eq!(snapshot.meal_plan, vec![MenuId::from("M4")]);
    }

    #[tokio::test]
    async fn test_failed_subquery_degrades_to_empty() {
        let mut source = MockBehaviorSource::new();
        source
            .expect_viewed_menus()
            .returning(|_, _| Err(AppError::Internal("connection reset".to_string())));
        source
            .expect_liked_menus()
            .returning(|_, _| Ok(vec![MenuId::from("M3")]));
        source
            .expect_ingredient_preferences()
            .returning(|_| Err(AppError::Internal("timeout".to_string())));
        source
            .expect_category_preferences()
            .returning(|_| Ok(vec![]));
        source
            .expect_recent_searches()
            .returning(|_, _| Ok(vec![]));
        source
            .expect_meal_plan_menus()
            .returning(|_, _| Ok(vec![]));

        let aggregator = BehaviorAggregator::new(Arc::new(source), BehaviorLimits::default());
        let snapshot = aggregator.snapshot(&UserId::from("U1")).await;

        assert!(snapshot.viewed.is_empty());
        assert!(snapshot.ingredient_preferences.is_empty());
        assert_eq!(snapshot.liked, vec![MenuId::from("M3")]);
    }

    #[test]
    fn test_caps_applied_even_if_source_ignores_limit() {
        let mut source = MockBehaviorSource::new();
        source.expect_viewed_menus().returning(|_, _| {
            Ok((0..50)
                .map(|i| MenuView {
                    menu_id: MenuId(format!("M{}", i)),
                    view_count: i,
                    last_viewed_at: None,
                })
                .collect())
        });
        source.expect_liked_menus().returning(|_, _| Ok(vec![]));
        source
            .expect_ingredient_preferences()
            .returning(|_| Ok(vec![]));
        source
            .expect_category_preferences()
            .returning(|_| Ok(vec![]));
        source
            .expect_recent_searches()
            .returning(|_, _| Ok(vec![]));
        source
            .expect_meal_plan_menus()
            .returning(|_, _| Ok(vec![]));

        let aggregator = BehaviorAggregator::new(Arc::new(source), BehaviorLimits::default());
        let snapshot = tokio_test::block_on(aggregator.snapshot(&UserId::from("U1")));

        assert_eq!(snapshot.viewed.len(), 20);
        assert_eq!(snapshot.viewed[0].view_count, 49);
    }
}
