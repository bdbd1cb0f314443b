use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    db::{BehaviorSource, CatalogStore, ProfileStore},
    error::AppResult,
    models::{
        BehaviorSnapshot, CatalogFilter, CatalogItem, MenuId, Method, RecommendationResult,
        ScoredCandidate, UserId, UserProfile,
    },
    services::{
        behavior::{BehaviorAggregator, BehaviorLimits},
        oracle::{
            validate_proposals, OracleCandidate, OracleContext, OracleVerdict,
            RecommendationOracle,
        },
        rule_based::{RuleBasedScorer, RuleWeights},
        similarity::{Allergens, FamiliarityPenalties, SimilarityRanker},
        vectorizer::{build_user_vector, FeatureSpace, Vocabulary},
    },
};

/// Tunables of the recommendation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSettings {
    pub max_recommendations: usize,
    pub meal_suggestion_count: usize,
    /// Most popular catalog items shown to the oracle
    pub oracle_candidate_window: usize,
    /// Oracle matches needed to skip the similarity tier (capped by the target)
    pub oracle_accept_threshold: usize,
    pub oracle_timeout: Duration,
    pub penalties: FamiliarityPenalties,
    pub high_match_threshold: f64,
    pub rule_weights: RuleWeights,
    pub behavior_limits: BehaviorLimits,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            max_recommendations: 10,
            meal_suggestion_count: 3,
            oracle_candidate_window: 150,
            oracle_accept_threshold: 10,
            oracle_timeout: Duration::from_secs(15),
            penalties: FamiliarityPenalties::default(),
            high_match_threshold: 0.3,
            rule_weights: RuleWeights::default(),
            behavior_limits: BehaviorLimits::default(),
        }
    }
}

/// Drives the oracle → similarity → rule fallback chain
#[derive(Clone)]
pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    profiles: Arc<dyn ProfileStore>,
    behavior: BehaviorAggregator,
    oracle: Option<Arc<dyn RecommendationOracle>>,
    vocabulary: Arc<Vocabulary>,
    ranker: SimilarityRanker,
    rule_scorer: RuleBasedScorer,
    settings: RecommendationSettings,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        behavior: Arc<dyn BehaviorSource>,
        profiles: Arc<dyn ProfileStore>,
        vocabulary: Arc<Vocabulary>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            catalog,
            profiles,
            behavior: BehaviorAggregator::new(behavior, settings.behavior_limits),
            oracle: None,
            vocabulary,
            ranker: SimilarityRanker::new(settings.penalties, settings.high_match_threshold),
            rule_scorer: RuleBasedScorer::new(settings.rule_weights),
            settings,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RecommendationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn settings(&self) -> &RecommendationSettings {
        &self.settings
    }

    /// Full recommendation list for a user
    pub async fn get_recommendations(&self, user_id: &UserId) -> AppResult<RecommendationResult> {
        self.recommend(user_id, self.settings.max_recommendations).await
    }

    /// Short list for meal planning; `count` is capped by the maximum list size
    pub async fn get_meal_suggestions(
        &self,
        user_id: &UserId,
        count: Option<usize>,
    ) -> AppResult<RecommendationResult> {
        let target = count
            .unwrap_or(self.settings.meal_suggestion_count)
            .min(self.settings.max_recommendations);
        self.recommend(user_id, target).await
    }

    async fn recommend(&self, user_id: &UserId, target: usize) -> AppResult<RecommendationResult> {
        let start = Instant::now();

        // The only failure that reaches the caller: no tier can run without a catalog
        let catalog = self.catalog.list_items(&CatalogFilter::all()).await?;

        if catalog.is_empty() || target == 0 {
            tracing::warn!(user_id = %user_id, requested = target, "No catalog items to recommend");
            return Ok(RecommendationResult::empty(Method::ContentBased));
        }

        let (snapshot, profile) =
            tokio::join!(self.behavior.snapshot(user_id), self.load_profile(user_id));

        tracing::info!(
            user_id = %user_id,
            catalog = catalog.len(),
            requested = target,
            cold_start = snapshot.is_empty(),
            "Generating recommendations"
        );

        // Tier A
        let oracle_picks = match &self.oracle {
            Some(oracle) => {
                self.oracle_tier(oracle.as_ref(), &catalog, &snapshot, &profile, target)
                    .await
            }
            None => Vec::new(),
        };

        let accept_at = self.settings.oracle_accept_threshold.min(target).max(1);
        if oracle_picks.len() >= accept_at {
            return Ok(self.finish(user_id, oracle_picks, Method::OracleAssisted, target, start));
        }

        // Tier B
        let space = FeatureSpace::from_catalog(&self.vocabulary, &catalog);
        let user_vector = build_user_vector(&snapshot, &space);
        let similar = self.ranker.rank(
            &catalog,
            &space,
            &user_vector,
            &snapshot,
            &profile,
            target + oracle_picks.len(),
        );

        let oracle_contributed = !oracle_picks.is_empty();
        let merged = merge_unique(oracle_picks, similar, target);

        if !merged.is_empty() {
            let method = if oracle_contributed {
                Method::OracleAssisted
            } else {
                Method::ContentBased
            };
            return Ok(self.finish(user_id, merged, method, target, start));
        }

        // Tier C. Similarity only comes back empty when allergens exclude every item,
        // so this yields an empty rule_based result
        tracing::warn!(user_id = %user_id, "Similarity ranking empty, using rule-based scoring");
        let ruled = self.rule_scorer.score(&catalog, &snapshot, &profile, target);

        Ok(self.finish(user_id, ruled, Method::RuleBased, target, start))
    }

    async fn load_profile(&self, user_id: &UserId) -> UserProfile {
        match self.profiles.get_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => UserProfile::default(),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Profile lookup failed, using defaults"
                );
                UserProfile::default()
            }
        }
    }

    async fn oracle_tier(
        &self,
        oracle: &dyn RecommendationOracle,
        catalog: &[CatalogItem],
        snapshot: &BehaviorSnapshot,
        profile: &UserProfile,
        target: usize,
    ) -> Vec<ScoredCandidate> {
        let allergens = Allergens::from_profile(profile);
        let eligible: Vec<CatalogItem> = catalog
            .iter()
            .filter(|item| !allergens.excludes(item))
            .cloned()
            .collect();
        let window =
            CatalogFilter::most_popular(self.settings.oracle_candidate_window).apply(eligible);

        if window.is_empty() {
            return Vec::new();
        }

        let context = build_oracle_context(&window, snapshot, profile, target);

        let proposals =
            match tokio::time::timeout(self.settings.oracle_timeout, oracle.propose(&context)).await
            {
                Ok(Ok(proposals)) => proposals,
                Ok(Err(e)) => {
                    tracing::warn!(
                        oracle = oracle.name(),
                        error = %e,
                        "Oracle failed, skipping tier"
                    );
                    return Vec::new();
                }
                Err(_) => {
                    tracing::warn!(
                        oracle = oracle.name(),
                        timeout_ms = self.settings.oracle_timeout.as_millis() as u64,
                        "Oracle timed out, skipping tier"
                    );
                    return Vec::new();
                }
            };

        let mut matched = Vec::new();
        for verdict in validate_proposals(&window, proposals, target) {
            match verdict {
                OracleVerdict::Matched(candidate) => matched.push(candidate),
                OracleVerdict::Rejected { item_id, reason } => {
                    tracing::warn!(
                        oracle = oracle.name(),
                        menu_id = %item_id,
                        reason = ?reason,
                        "Discarding oracle proposal"
                    );
                }
            }
        }

        matched
    }

    fn finish(
        &self,
        user_id: &UserId,
        candidates: Vec<ScoredCandidate>,
        method: Method,
        target: usize,
        start: Instant,
    ) -> RecommendationResult {
        let result = RecommendationResult::from_candidates(candidates, method, target);

        tracing::info!(
            user_id = %user_id,
            method = %result.method,
            count = result.recommendations.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendations generated"
        );

        result
    }
}

fn build_oracle_context(
    window: &[CatalogItem],
    snapshot: &BehaviorSnapshot,
    profile: &UserProfile,
    target: usize,
) -> OracleContext {
    OracleContext {
        allergies: profile.allergies.clone(),
        favorite_foods: profile.favorite_foods.clone(),
        calorie_limit: profile.calorie_limit,
        liked_ingredients: snapshot
            .liked_ingredients()
            .take(10)
            .map(|p| p.ingredient.clone())
            .collect(),
        disliked_ingredients: snapshot
            .disliked_ingredients()
            .take(10)
            .map(|p| p.ingredient.clone())
            .collect(),
        preferred_categories: snapshot
            .category_preferences
            .iter()
            .take(5)
            .map(|p| p.label().to_string())
            .collect(),
        recent_searches: snapshot
            .recent_searches
            .iter()
            .take(5)
            .map(|s| s.query.clone())
            .collect(),
        candidates: window.iter().map(OracleCandidate::from).collect(),
        count: target,
    }
}

/// Keeps `first` in order, then appends unseen ids from `rest` up to `limit`
fn merge_unique(
    first: Vec<ScoredCandidate>,
    rest: Vec<ScoredCandidate>,
    limit: usize,
) -> Vec<ScoredCandidate> {
    let mut seen: HashSet<MenuId> = HashSet::new();
    first
        .into_iter()
        .chain(rest)
        .filter(|c| seen.insert(c.item_id().clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, MockCatalogStore, MockProfileStore};
    use crate::error::AppError;
    use crate::models::CategoryId;
    use crate::services::oracle::{MockRecommendationOracle, OracleProposal};

    fn user() -> UserId {
        UserId::from("U1")
    }

    async fn soup_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_item(
                CatalogItem::new("M1", "Pork ginger soup")
                    .with_recipe("pork, ginger")
                    .with_category("soup")
                    .with_popularity(50),
            )
            .await;
        store
            .insert_item(
                CatalogItem::new("M2", "Tofu soup")
                    .with_recipe("tofu")
                    .with_category("soup")
                    .with_popularity(5),
            )
            .await;
        store
    }

    fn engine(store: &MemoryStore) -> RecommendationEngine {
        RecommendationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(Vocabulary::new(["pork", "ginger", "tofu"])),
            RecommendationSettings::default(),
        )
    }

    fn proposals(ids: &[&str]) -> Vec<OracleProposal> {
        ids.iter()
            .map(|id| OracleProposal {
                item_id: MenuId::from(*id),
                rationale: Some("Suggested".to_string()),
                matching_preferences: vec![],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pork_preference_ranks_pork_soup_first() {
        let store = soup_store().await;
        store.set_ingredient_preference(&user(), "pork", 8.0).await;

        let result = engine(&store).get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::ContentBased);
        assert_eq!(result.ids(), vec!["M1", "M2"]);
    }

    #[tokio::test]
    async fn test_allergy_removes_item() {
        let store = soup_store().await;
        store.set_ingredient_preference(&user(), "pork", 8.0).await;
        store
            .set_profile(&user(), UserProfile::with_allergies("pork"))
            .await;

        let result = engine(&store).get_recommendations(&user()).await.unwrap();

        assert_eq!(result.ids(), vec!["M2"]);
    }

    #[tokio::test]
    async fn test_everything_allergenic_falls_through_to_rules() {
        let store = soup_store().await;
        store
            .set_profile(&user(), UserProfile::with_allergies("soup, pork, tofu"))
            .await;

        let result = engine(&store).get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::RuleBased);
        assert!(result.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_returns_empty_content_based() {
        let store = MemoryStore::new();

        let result = engine(&store).get_recommendations(&user()).await.unwrap();

        assert_eq!(result, RecommendationResult::empty(Method::ContentBased));
    }

    #[tokio::test]
    async fn test_catalog_failure_propagates() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_list_items()
            .returning(|_| Err(AppError::StoreUnavailable("down".to_string())));
        let store = MemoryStore::new();
        let engine = RecommendationEngine::new(
            Arc::new(catalog),
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(Vocabulary::default()),
            RecommendationSettings::default(),
        );

        let result = engine.get_recommendations(&user()).await;

        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_profile_failure_degrades_to_defaults() {
        let store = soup_store().await;
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_get_profile()
            .returning(|_| Err(AppError::Internal("profile table missing".to_string())));
        let engine = RecommendationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(profiles),
            Arc::new(Vocabulary::default()),
            RecommendationSettings::default(),
        );

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.recommendations.len(), 2);
    }

    #[tokio::test]
    async fn test_cold_start_fills_target_by_popularity() {
        let store = MemoryStore::new();
        for i in 0..15u32 {
            store
                .insert_item(CatalogItem::new(format!("M{:02}", i), "Plain").with_popularity(i))
                .await;
        }

        let result = engine(&store).get_recommendations(&user()).await.unwrap();

        assert_eq!(result.recommendations.len(), 10);
        assert_eq!(result.recommendations[0].id.as_str(), "M14");
        assert_eq!(result.recommendations[9].id.as_str(), "M05");
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let store = soup_store().await;
        store.set_ingredient_preference(&user(), "ginger", 3.0).await;
        store
            .set_category_preference(&user(), &CategoryId::from("soup"), 2.0)
            .await;
        let engine = engine(&store);

        let first = engine.get_recommendations(&user()).await.unwrap();
        let second = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_meal_suggestions_use_smaller_cap() {
        let store = MemoryStore::new();
        for i in 0..6u32 {
            store
                .insert_item(CatalogItem::new(format!("M{}", i), "Plain").with_popularity(i))
                .await;
        }
        let engine = engine(&store);

        let default = engine.get_meal_suggestions(&user(), None).await.unwrap();
        let oversized = engine.get_meal_suggestions(&user(), Some(50)).await.unwrap();

        assert_eq!(default.recommendations.len(), 3);
        assert_eq!(oversized.recommendations.len(), 6);
    }

    #[tokio::test]
    async fn test_oracle_filling_target_returns_immediately() {
        let store = soup_store().await;
        let mut oracle = MockRecommendationOracle::new();
        oracle
            .expect_propose()
            .returning(|_| Ok(proposals(&["M2", "M1"])));
        oracle.expect_name().return_const("mock");
        let settings = RecommendationSettings {
            oracle_accept_threshold: 2,
            ..Default::default()
        };
        let engine = RecommendationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(Vocabulary::default()),
            settings,
        )
        .with_oracle(Arc::new(oracle));

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::OracleAssisted);
        assert_eq!(result.ids(), vec!["M2", "M1"]);
        assert!(result.recommendations.iter().all(|r| r.score.is_none()));
    }

    #[tokio::test]
    async fn test_hallucinated_ids_dropped_and_gap_filled() {
        let store = soup_store().await;
        store
            .insert_item(CatalogItem::new("M3", "Fried rice").with_popularity(20))
            .await;
        let mut oracle = MockRecommendationOracle::new();
        oracle
            .expect_propose()
            .returning(|_| Ok(proposals(&["M404", "M2"])));
        oracle.expect_name().return_const("mock");
        let engine = engine(&store).with_oracle(Arc::new(oracle));

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::OracleAssisted);
        assert_eq!(result.ids()[0], "M2");
        assert!(!result.ids().contains(&"M404"));
        assert_eq!(result.recommendations.len(), 3);
        assert!(result.recommendations.iter().all(|r| r.exists_in_catalog));
    }

    #[tokio::test]
    async fn test_oracle_never_sees_allergens() {
        let store = soup_store().await;
        store
            .set_profile(&user(), UserProfile::with_allergies("pork"))
            .await;
        let mut oracle = MockRecommendationOracle::new();
        oracle
            .expect_propose()
            .withf(|ctx| ctx.candidates.iter().all(|c| c.menu_id.as_str() != "M1"))
            .returning(|_| Ok(proposals(&["M1", "M2"])));
        oracle.expect_name().return_const("mock");
        let engine = engine(&store).with_oracle(Arc::new(oracle));

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.ids(), vec!["M2"]);
    }

    #[tokio::test]
    async fn test_oracle_context_carries_behavior_newest_search_first() {
        let store = soup_store().await;
        let now = chrono::Utc::now();
        store
            .record_search(&user(), "tom yum", now - chrono::Duration::hours(2))
            .await;
        store.record_search(&user(), "pad thai", now).await;
        store.set_ingredient_preference(&user(), "ginger", 4.0).await;
        store.set_ingredient_preference(&user(), "tofu", -6.0).await;
        let mut oracle = MockRecommendationOracle::new();
        oracle
            .expect_propose()
            .withf(|ctx| {
                ctx.recent_searches == vec!["pad thai".to_string(), "tom yum".to_string()]
                    && ctx.liked_ingredients == vec!["ginger".to_string()]
                    && ctx.disliked_ingredients == vec!["tofu".to_string()]
                    && ctx.count == 10
            })
            .times(1)
            .returning(|_| Ok(proposals(&["M1", "M2"])));
        oracle.expect_name().return_const("mock");
        let engine = engine(&store).with_oracle(Arc::new(oracle));

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::OracleAssisted);
        assert_eq!(result.ids(), vec!["M1", "M2"]);
    }

    #[tokio::test]
    async fn test_oracle_error_falls_back_to_similarity() {
        let store = soup_store().await;
        let mut oracle = MockRecommendationOracle::new();
        oracle
            .expect_propose()
            .returning(|_| Err(AppError::ExternalApi("bad gateway".to_string())));
        oracle.expect_name().return_const("mock");
        let engine = engine(&store).with_oracle(Arc::new(oracle));

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::ContentBased);
        assert_eq!(result.recommendations.len(), 2);
    }

    struct SlowOracle;

    #[async_trait::async_trait]
    impl RecommendationOracle for SlowOracle {
        async fn propose(&self, _context: &OracleContext) -> AppResult<Vec<OracleProposal>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(proposals(&["M1", "M2"]))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_oracle_timeout_is_treated_as_no_candidates() {
        let store = soup_store().await;
        let settings = RecommendationSettings {
            oracle_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let engine = RecommendationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(Vocabulary::default()),
            settings,
        )
        .with_oracle(Arc::new(SlowOracle));

        let result = engine.get_recommendations(&user()).await.unwrap();

        assert_eq!(result.method, Method::ContentBased);
        assert_eq!(result.recommendations.len(), 2);
    }

    #[test]
    fn test_merge_unique_keeps_first_and_skips_duplicates() {
        let candidate = |id: &str| ScoredCandidate {
            item: CatalogItem::new(id, id),
            score: None,
            reason: String::new(),
            matching_preferences: vec![],
            exists_in_catalog: true,
        };

        let merged = merge_unique(
            vec![candidate("B"), candidate("A")],
            vec![candidate("A"), candidate("C"), candidate("D")],
            3,
        );

        let ids: Vec<&str> = merged.iter().map(|c| c.item_id().as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }
}
