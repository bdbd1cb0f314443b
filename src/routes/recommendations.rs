use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{RecommendationResult, UserId},
    routes::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct MealSuggestionRequest {
    #[serde(default)]
    pub count: Option<usize>,
    /// Informational: breakfast, lunch, dinner...
    #[serde(default)]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<String>,
}

fn parse_user_id(raw: String) -> AppResult<UserId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("user id cannot be empty".to_string()));
    }
    Ok(UserId::from(trimmed))
}

/// Handler for the full recommendation list
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> AppResult<Json<RecommendationResult>> {
    let user_id = parse_user_id(user_id)?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        "Processing recommendation request"
    );

    let result = state.engine.get_recommendations(&user_id).await?;

    Ok(Json(result))
}

/// Handler for meal-plan suggestions
pub async fn meal_suggestions(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
    body: Option<Json<MealSuggestionRequest>>,
) -> AppResult<Json<RecommendationResult>> {
    let user_id = parse_user_id(user_id)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    if request.count == Some(0) {
        return Err(AppError::InvalidInput(
            "count must be at least 1".to_string(),
        ));
    }

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        count = ?request.count,
        meal_type = ?request.meal_type,
        day_of_week = ?request.day_of_week,
        "Processing meal suggestion request"
    );

    let result = state
        .engine
        .get_meal_suggestions(&user_id, request.count)
        .await?;

    Ok(Json(result))
}
