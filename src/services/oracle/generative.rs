//! Generative-language oracle over HTTP
//!
//! Sends one generateContent request per call and parses the JSON array the model
//! is instructed to return. No retries; the orchestrator owns the timeout.

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{OracleContext, OracleProposal, RecommendationOracle};
use crate::{
    error::{AppError, AppResult},
    models::MenuId,
};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Deserialize)]
struct GenerateCandidate {
    content: Option<GenerateContent>,
}

#[derive(Debug, Deserialize)]
struct GenerateContent {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Deserialize)]
struct GeneratePart {
    #[serde(default)]
    text: Option<String>,
}

/// Shape each array element must have
#[derive(Debug, Deserialize)]
struct RawProposal {
    menu_id: Value,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    matching_preferences: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct GenerativeOracle {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl GenerativeOracle {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            model,
        }
    }

    fn build_prompt(&self, context: &OracleContext) -> AppResult<String> {
        let candidates = serde_json::to_string(&context.candidates)
            .map_err(|e| AppError::Internal(format!("Candidate serialization error: {}", e)))?;

        Ok(format!(
            r#"You are a Thai food recommendation system.
Choose up to {count} menus from the database menus below that best fit this user.

User profile:
- Allergies: {allergies}
- Favorite foods: {favorites}
- Calorie limit: {calories}

User behavior summary:
- Liked ingredients: {liked}
- Avoided ingredients: {disliked}
- Preferred categories: {categories}
- Recent searches: {searches}

Database menus (JSON):
{candidates}

Rules:
1. Only choose menus from the database list and use their exact "menu_id".
2. Never invent menus or ids.
3. Prefer new menus similar to the user's preferences over ones they already know.
4. Avoid the user's allergies and avoided ingredients.
5. Prefer variety across categories.

Respond with ONLY a JSON array of objects:
[{{"menu_id": "id from database", "reason": "short explanation", "matching_preferences": ["ingredient or category"]}}]"#,
            count = context.count,
            allergies = context.allergies.as_deref().unwrap_or("None"),
            favorites = context.favorite_foods.as_deref().unwrap_or("Not specified"),
            calories = context
                .calorie_limit
                .map(|c| c.to_string())
                .unwrap_or_else(|| "Not specified".to_string()),
            liked = join_or_none(&context.liked_ingredients),
            disliked = join_or_none(&context.disliked_ingredients),
            categories = join_or_none(&context.preferred_categories),
            searches = join_or_none(&context.recent_searches),
            candidates = candidates,
        ))
    }
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "None".to_string()
    } else {
        values.join(", ")
    }
}

/// Pulls the proposals out of free-form model text.
///
/// The first `[` to the last `]` must parse as a JSON array. Elements that do not
/// match the expected shape are dropped individually.
pub fn parse_proposals(text: &str) -> AppResult<Vec<OracleProposal>> {
    let (start, end) = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(AppError::ExternalApi(
                "Oracle response contains no JSON array".to_string(),
            ))
        }
    };

    let elements: Vec<Value> = serde_json::from_str(&text[start..=end])
        .map_err(|e| AppError::ExternalApi(format!("Oracle returned malformed JSON: {}", e)))?;

    let proposals = elements
        .into_iter()
        .filter_map(|element| {
            let raw: RawProposal = match serde_json::from_value(element) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping oracle entry with unexpected shape");
                    return None;
                }
            };
            let item_id = match raw.menu_id {
                Value::String(id) if !id.trim().is_empty() => MenuId(id.trim().to_string()),
                Value::Number(id) => MenuId(id.to_string()),
                other => {
                    tracing::warn!(
                        menu_id = %other,
                        "Dropping oracle entry without usable menu_id"
                    );
                    return None;
                }
            };
            Some(OracleProposal {
                item_id,
                rationale: raw.reason,
                matching_preferences: raw.matching_preferences.unwrap_or_default(),
            })
        })
        .collect();

    Ok(proposals)
}

#[async_trait::async_trait]
impl RecommendationOracle for GenerativeOracle {
    async fn propose(&self, context: &OracleContext) -> AppResult<Vec<OracleProposal>> {
        let prompt = self.build_prompt(context)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        );

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Oracle API returned status {}: {}",
                status, body
            )));
        }

        let generated: GenerateResponse = response.json().await?;
        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| AppError::ExternalApi("Oracle returned no candidates".to_string()))?;

        let proposals = parse_proposals(&text)?;

        tracing::info!(
            oracle = self.name(),
            candidates = context.candidates.len(),
            proposals = proposals.len(),
            "Oracle proposals received"
        );

        Ok(proposals)
    }

    fn name(&self) -> &'static str {
        "generative"
    }
}
