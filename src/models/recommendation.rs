use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{CatalogItem, MenuId};

/// Which tier of the fallback chain produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    OracleAssisted,
    ContentBased,
    RuleBased,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::OracleAssisted => write!(f, "oracle_assisted"),
            Method::ContentBased => write!(f, "content_based"),
            Method::RuleBased => write!(f, "rule_based"),
        }
    }
}

/// A catalog item together with the score and explanation one tier assigned it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item: CatalogItem,
    /// `None` for oracle picks, which carry no numeric score
    pub score: Option<f64>,
    pub reason: String,
    pub matching_preferences: Vec<String>,
    /// Confirmed against the catalog snapshot
    pub exists_in_catalog: bool,
}

impl ScoredCandidate {
    pub fn item_id(&self) -> &MenuId {
        &self.item.id
    }
}

/// One entry of the response list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSummary {
    pub id: MenuId,
    pub name: String,
    pub image: Option<String>,
    pub description: String,
    pub reason: String,
    pub score: Option<f64>,
    pub matching_preferences: Vec<String>,
    pub exists_in_catalog: bool,
}

impl From<ScoredCandidate> for RecommendationSummary {
    fn from(candidate: ScoredCandidate) -> Self {
        Self {
            id: candidate.item.id,
            name: candidate.item.name,
            image: candidate.item.image,
            description: candidate.item.description,
            reason: candidate.reason,
            score: candidate.score.map(|s| (s * 1000.0).round() / 1000.0),
            matching_preferences: candidate.matching_preferences,
            exists_in_catalog: candidate.exists_in_catalog,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub recommendations: Vec<RecommendationSummary>,
    pub method: Method,
}

impl RecommendationResult {
    pub fn empty(method: Method) -> Self {
        Self {
            recommendations: Vec::new(),
            method,
        }
    }

    pub fn from_candidates(candidates: Vec<ScoredCandidate>, method: Method, limit: usize) -> Self {
        Self {
            recommendations: candidates
                .into_iter()
                .take(limit)
                .map(RecommendationSummary::from)
                .collect(),
            method,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.recommendations.iter().map(|r| r.id.as_str()).collect()
    }
}
