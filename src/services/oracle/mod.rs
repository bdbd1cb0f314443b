//! External ranking oracle
//!
//! An optional black box that proposes menu ids with a rationale. Its output is
//! untrusted: every proposal is checked against the candidate window that was
//! sent before anything reaches the caller.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    error::AppResult,
    models::{CatalogItem, CategoryId, MenuId, ScoredCandidate},
};

pub mod generative;

pub use generative::GenerativeOracle;

/// Candidate menu as shown to the oracle
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OracleCandidate {
    pub menu_id: MenuId,
    pub menu_name: String,
    pub menu_description: String,
    pub menu_recipe: String,
    pub category_id: Option<CategoryId>,
    pub menu_like_count: u32,
}

impl From<&CatalogItem> for OracleCandidate {
    fn from(item: &CatalogItem) -> Self {
        Self {
            menu_id: item.id.clone(),
            menu_name: item.name.clone(),
            menu_description: item.description.clone(),
            menu_recipe: item.recipe.clone(),
            category_id: item.category_id.clone(),
            menu_like_count: item.popularity,
        }
    }
}

/// Everything the oracle is told about one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleContext {
    pub allergies: Option<String>,
    pub favorite_foods: Option<String>,
    pub calorie_limit: Option<i32>,
    pub liked_ingredients: Vec<String>,
    pub disliked_ingredients: Vec<String>,
    pub preferred_categories: Vec<String>,
    pub recent_searches: Vec<String>,
    pub candidates: Vec<OracleCandidate>,
    /// How many picks are wanted
    pub count: usize,
}

/// One raw pick returned by the oracle
#[derive(Debug, Clone, PartialEq)]
pub struct OracleProposal {
    pub item_id: MenuId,
    pub rationale: Option<String>,
    pub matching_preferences: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Not in the window that was sent
    UnknownId,
    Duplicate,
    OverLimit,
}

/// Outcome of checking one proposal against the candidate window
#[derive(Debug, Clone, PartialEq)]
pub enum OracleVerdict {
    Matched(ScoredCandidate),
    Rejected {
        item_id: MenuId,
        reason: RejectReason,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationOracle: Send + Sync {
    /// Proposes menu ids for the given context
    async fn propose(&self, context: &OracleContext) -> AppResult<Vec<OracleProposal>>;

    /// Oracle name for logging
    fn name(&self) -> &'static str;
}

/// Checks proposals against the window, keeping at most `limit` matches
pub fn validate_proposals(
    window: &[CatalogItem],
    proposals: Vec<OracleProposal>,
    limit: usize,
) -> Vec<OracleVerdict> {
    let by_id: HashMap<&MenuId, &CatalogItem> = window.iter().map(|i| (&i.id, i)).collect();
    let mut accepted: HashSet<MenuId> = HashSet::new();

    proposals
        .into_iter()
        .map(|proposal| {
            let Some(item) = by_id.get(&proposal.item_id) else {
                return OracleVerdict::Rejected {
                    item_id: proposal.item_id,
                    reason: RejectReason::UnknownId,
                };
            };
            if accepted.contains(&proposal.item_id) {
                return OracleVerdict::Rejected {
                    item_id: proposal.item_id,
                    reason: RejectReason::Duplicate,
                };
            }
            if accepted.len() >= limit {
                return OracleVerdict::Rejected {
                    item_id: proposal.item_id,
                    reason: RejectReason::OverLimit,
                };
            }

            accepted.insert(proposal.item_id.clone());
            OracleVerdict::Matched(ScoredCandidate {
                item: (*item).clone(),
                score: None,
                reason: proposal
                    .rationale
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "Based on your preferences".to_string()),
                matching_preferences: proposal.matching_preferences,
                exists_in_catalog: true,
            })
        })
        .collect()
}
