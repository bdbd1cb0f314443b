use serde::{Deserialize, Serialize};

/// Profile fields the engine reads for a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    /// Comma separated, matched case-insensitively
    #[serde(default)]
    pub allergies: Option<String>,
    /// Informational only, forwarded to the oracle
    #[serde(default)]
    pub favorite_foods: Option<String>,
    /// Reserved for calorie filtering; not used by the ranking math
    #[serde(default)]
    pub calorie_limit: Option<i32>,
}

impl UserProfile {
    pub fn with_allergies(allergies: impl Into<String>) -> Self {
        Self {
            allergies: Some(allergies.into()),
            ..Default::default()
        }
    }
}
