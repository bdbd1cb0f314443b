pub mod behavior;
pub mod oracle;
pub mod recommendations;
pub mod rule_based;
pub mod similarity;
pub mod vectorizer;

pub use recommendations::{RecommendationEngine, RecommendationSettings};
