use std::cmp::Ordering;

use crate::{
    models::{BehaviorSnapshot, CatalogItem, ScoredCandidate, UserProfile},
    services::vectorizer::{build_item_vector, FeatureSpace, FeatureVector},
};

const HIGH_MATCH_NOTE: &str = "High similarity to your preferences";
const DEFAULT_REASON: &str = "Based on content similarity";
const MAX_LISTED_INGREDIENTS: usize = 3;

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0 for a zero-norm input or mismatched lengths.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Lowercased allergy tokens parsed from a profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allergens(Vec<String>);

impl Allergens {
    /// Splits on commas; blank tokens are ignored so a trailing comma excludes nothing
    pub fn parse(allergies: Option<&str>) -> Self {
        Self(
            allergies
                .unwrap_or_default()
                .split(',')
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        )
    }

    pub fn from_profile(profile: &UserProfile) -> Self {
        Self::parse(profile.allergies.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn excludes(&self, item: &CatalogItem) -> bool {
        if self.0.is_empty() {
            return false;
        }
        let text = item.searchable_text();
        self.0.iter().any(|a| text.contains(a.as_str()))
    }
}

/// Additive penalties for items the user already knows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamiliarityPenalties {
    pub viewed: f64,
    pub liked: f64,
    pub meal_plan: f64,
}

impl Default for FamiliarityPenalties {
    fn default() -> Self {
        Self {
            viewed: 0.05,
            liked: 0.03,
            meal_plan: 0.10,
        }
    }
}

/// Ranks the catalog against a user vector by cosine similarity
#[derive(Debug, Clone)]
pub struct SimilarityRanker {
    penalties: FamiliarityPenalties,
    high_match_threshold: f64,
}

impl Default for SimilarityRanker {
    fn default() -> Self {
        Self::new(FamiliarityPenalties::default(), 0.3)
    }
}

impl SimilarityRanker {
    pub fn new(penalties: FamiliarityPenalties, high_match_threshold: f64) -> Self {
        Self {
            penalties,
            high_match_threshold,
        }
    }

    /// Scores every catalog item and returns the best `k`.
    ///
    /// Allergen matches are dropped before scoring. Adjusted scores are never negative.
    pub fn rank(
        &self,
        catalog: &[CatalogItem],
        space: &FeatureSpace,
        user_vector: &FeatureVector,
        snapshot: &BehaviorSnapshot,
        profile: &UserProfile,
        k: usize,
    ) -> Vec<ScoredCandidate> {
        let allergens = Allergens::from_profile(profile);
        let liked: Vec<String> = snapshot
            .liked_ingredients()
            .map(|p| p.ingredient.to_lowercase())
            .collect();

        let mut candidates: Vec<ScoredCandidate> = catalog
            .iter()
            .filter(|item| !allergens.excludes(item))
            .map(|item| {
                let item_vector = build_item_vector(item, space);
                let raw = cosine_similarity(item_vector.as_slice(), user_vector.as_slice());
                let adjusted = (raw - self.penalty_for(item, snapshot)).max(0.0);

                let text = item.searchable_text();
                let matching: Vec<String> = space
                    .ingredients
                    .tokens_in(&text)
                    .filter(|token| liked.contains(&token.to_lowercase()))
                    .take(MAX_LISTED_INGREDIENTS)
                    .map(str::to_string)
                    .collect();

                let mut notes = Vec::new();
                if raw > self.high_match_threshold {
                    notes.push(HIGH_MATCH_NOTE.to_string());
                }
                if !matching.is_empty() {
                    notes.push(format!("Contains: {}", matching.join(", ")));
                }
                let reason = if notes.is_empty() {
                    DEFAULT_REASON.to_string()
                } else {
                    notes.join(" | ")
                };

                ScoredCandidate {
                    item: item.clone(),
                    score: Some(adjusted),
                    reason,
                    matching_preferences: matching,
                    exists_in_catalog: true,
                }
            })
            .collect();

        candidates.sort_by(compare_scored);
        candidates.truncate(k);

        tracing::debug!(
            catalog = catalog.len(),
            ranked = candidates.len(),
            allergens = allergens.tokens().len(),
            "Similarity ranking completed"
        );

        candidates
    }

    fn penalty_for(&self, item: &CatalogItem, snapshot: &BehaviorSnapshot) -> f64 {
        let mut penalty = 0.0;
        if snapshot.has_viewed(&item.id) {
            penalty += self.penalties.viewed;
        }
        if snapshot.has_liked(&item.id) {
            penalty += self.penalties.liked;
        }
        if snapshot.in_meal_plan(&item.id) {
            penalty += self.penalties.meal_plan;
        }
        penalty
    }
}

/// Score descending, then popularity descending, then id for a stable order
pub(crate) fn compare_scored(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    let score_a = a.score.unwrap_or(f64::NEG_INFINITY);
    let score_b = b.score.unwrap_or(f64::NEG_INFINITY);
    score_b
        .total_cmp(&score_a)
        .then_with(|| b.item.popularity.cmp(&a.item.popularity))
        .then_with(|| a.item.id.cmp(&b.item.id))
}
