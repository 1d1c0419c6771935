use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{AppState, MutationResponse};
use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{ReviewId, Usefulness, UserId},
};

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: UserId,
    pub is_like: Option<bool>,
}

async fn cast(
    state: &AppState,
    request_id: RequestId,
    review_id: ReviewId,
    user_id: UserId,
    is_like: bool,
) -> AppResult<Json<MutationResponse>> {
    tracing::info!(request_id = %request_id, %review_id, %user_id, is_like, "Vote requested");
    let outcome = state
        .social
        .usefulness
        .vote(review_id, user_id, is_like)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn like(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((review_id, user_id)): Path<(ReviewId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    cast(&state, request_id, review_id, user_id, true).await
}

pub async fn dislike(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((review_id, user_id)): Path<(ReviewId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    cast(&state, request_id, review_id, user_id, false).await
}

/// `POST /reviews/:id/votes` with `{"user_id": 1, "is_like": true}`
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(review_id): Path<ReviewId>,
    Json(request): Json<VoteRequest>,
) -> AppResult<Json<MutationResponse>> {
    let is_like = request
        .is_like
        .ok_or_else(|| AppError::Validation("is_like is required".to_string()))?;
    cast(&state, request_id, review_id, request.user_id, is_like).await
}

/// Deletes the user's vote; serves both the like and dislike paths
pub async fn retract(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((review_id, user_id)): Path<(ReviewId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    tracing::info!(request_id = %request_id, %review_id, %user_id, "Vote retraction requested");
    let outcome = state.social.usefulness.retract(review_id, user_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn useful(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<ReviewId>,
) -> AppResult<Json<Usefulness>> {
    Ok(Json(state.social.usefulness.score(review_id).await?))
}
