use crate::{
    models::{BehaviorSnapshot, CatalogItem, ScoredCandidate, UserProfile},
    services::similarity::{compare_scored, Allergens},
};

const DEFAULT_REASON: &str = "Based on general preferences";

/// Weights of the additive rule score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleWeights {
    /// Multiplier on a matching category preference
    pub category: f64,
    /// Subtracted per previous view
    pub per_view: f64,
    /// Subtracted once if the item is already planned
    pub meal_plan: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            category: 2.0,
            per_view: 0.1,
            meal_plan: 0.5,
        }
    }
}

/// Deterministic scoring that needs no vectors
#[derive(Debug, Clone, Default)]
pub struct RuleBasedScorer {
    weights: RuleWeights,
}

impl RuleBasedScorer {
    pub fn new(weights: RuleWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        catalog: &[CatalogItem],
        snapshot: &BehaviorSnapshot,
        profile: &UserProfile,
        k: usize,
    ) -> Vec<ScoredCandidate> {
        let allergens = Allergens::from_profile(profile);

        let mut candidates: Vec<ScoredCandidate> = catalog
            .iter()
            .filter(|item| !allergens.excludes(item))
            .map(|item| self.score_item(item, snapshot))
            .collect();

        candidates.sort_by(compare_scored);
        candidates.truncate(k);

        tracing::debug!(
            catalog = catalog.len(),
            scored = candidates.len(),
            "Rule-based scoring completed"
        );

        candidates
    }

    fn score_item(&self, item: &CatalogItem, snapshot: &BehaviorSnapshot) -> ScoredCandidate {
        let text = item.searchable_text();
        let mut score = 0.0;
        let mut reasons = Vec::new();

        for pref in &snapshot.ingredient_preferences {
            let ingredient = pref.ingredient.trim().to_lowercase();
            if ingredient.is_empty() {
                continue;
            }
            if text.contains(&ingredient) {
                score += pref.score;
                if pref.score > 0.0 {
                    reasons.push(format!("Contains liked ingredient: {}", pref.ingredient));
                }
            }
        }

        if let Some(pref) = item
            .category_id
            .as_ref()
            .and_then(|id| snapshot.category_preference(id))
        {
            score += pref.score * self.weights.category;
            reasons.push(format!("Preferred category: {}", pref.label()));
        }

        if let Some(views) = snapshot.view_count(&item.id) {
            score -= views as f64 * self.weights.per_view;
        }

        if snapshot.in_meal_plan(&item.id) {
            score -= self.weights.meal_plan;
        }

        let reason = if reasons.is_empty() {
            DEFAULT_REASON.to_string()
        } else {
            reasons.join(", ")
        };

        ScoredCandidate {
            item: item.clone(),
            score: Some(score),
            reason,
            matching_preferences: reasons,
            exists_in_catalog: true,
        }
    }
}
