use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

use super::{AppState, MutationResponse};
use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{FeedEvent, Film, User, UserId},
};

pub async fn add_friend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((user_id, friend_id)): Path<(UserId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    tracing::info!(request_id = %request_id, %user_id, %friend_id, "Follow requested");
    let outcome = state.social.friends.follow(user_id, friend_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn remove_friend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((user_id, friend_id)): Path<(UserId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    tracing::info!(request_id = %request_id, %user_id, %friend_id, "Unfollow requested");
    let outcome = state.social.friends.unfollow(user_id, friend_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn friends(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.social.friends.friends_of(user_id).await?))
}

pub async fn common_friends(
    State(state): State<Arc<AppState>>,
    Path((user_id, other_id)): Path<(UserId, UserId)>,
) -> AppResult<Json<Vec<User>>> {
    let users = state
        .social
        .friends
        .common_friends(user_id, other_id)
        .await?;
    Ok(Json(users))
}

pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<Vec<Film>>> {
    tracing::debug!(request_id = %request_id, %user_id, "Recommendations requested");
    let films = state
        .social
        .recommendations
        .recommendations_for(user_id)
        .await?;
    Ok(Json(films))
}

pub async fn feed(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<Vec<FeedEvent>>> {
    Ok(Json(state.social.feed.feed_for(user_id).await?))
}
