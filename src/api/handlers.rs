use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{
    FavoriteRequest, FavoriteResponse, ItemId, ModelStatus, RecommendationMode,
    RecommendationRequest, RecommendationResponse, UserId,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub n: Option<usize>,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Currently serving collaborative model
pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.service.status().await)
}

/// Record a favorite, wait for the refreshed model and return its recommendations
pub async fn record_favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRequest>,
) -> AppResult<(StatusCode, Json<FavoriteResponse>)> {
    let n = state.limits.resolve(request.n)?;

    tracing::info!(
        user_id = request.user_id,
        item_id = request.item_id,
        "Processing favorite"
    );

    let outcome = state
        .service
        .record_favorite(request.user_id, request.item_id)
        .await?;
    let recommendations = state
        .service
        .recommend_collaborative(request.user_id, n)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(FavoriteResponse {
            outcome,
            recommendations,
        }),
    ))
}

/// Recommendations in either mode, selected by the request body
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let n = state.limits.resolve(request.n)?;

    let titles = match request.mode {
        RecommendationMode::Collaborative => {
            let user_id = request.user_id.ok_or_else(|| {
                AppError::InvalidInput("user_id is required for collaborative mode".to_string())
            })?;
            state.service.recommend_collaborative(user_id, n).await?
        }
        RecommendationMode::Content => {
            let item_id = request.item_id.ok_or_else(|| {
                AppError::InvalidInput("item_id is required for content mode".to_string())
            })?;
            state.service.recommend_content_based(item_id, n).await?
        }
    };

    tracing::info!(mode = ?request.mode, count = titles.len(), "Recommendations served");

    Ok(Json(RecommendationResponse {
        mode: request.mode,
        titles,
    }))
}

/// Collaborative recommendations for a user
pub async fn user_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<CountQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let n = state.limits.resolve(query.n)?;
    let titles = state.service.recommend_collaborative(user_id, n).await?;

    Ok(Json(RecommendationResponse {
        mode: RecommendationMode::Collaborative,
        titles,
    }))
}

/// Items with the most similar descriptions
pub async fn similar_items(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
    Query(query): Query<CountQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let n = state.limits.resolve(query.n)?;
    let titles = state.service.recommend_content_based(item_id, n).await?;

    Ok(Json(RecommendationResponse {
        mode: RecommendationMode::Content,
        titles,
    }))
}
