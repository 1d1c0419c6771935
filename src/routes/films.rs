use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AppState, MutationResponse};
use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{Film, FilmId, GenreId, PopularityFilter, RankedFilm, UserId},
    services::popularity::DEFAULT_COUNT,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularQuery {
    pub count: Option<i64>,
    pub genre_id: Option<GenreId>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonQuery {
    pub user_id: UserId,
    pub friend_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCountResponse {
    pub film_id: FilmId,
    pub likes: i64,
}

pub async fn add_like(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((film_id, user_id)): Path<(FilmId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    tracing::info!(request_id = %request_id, %film_id, %user_id, "Like requested");
    let outcome = state.social.likes.add_like(film_id, user_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn remove_like(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((film_id, user_id)): Path<(FilmId, UserId)>,
) -> AppResult<Json<MutationResponse>> {
    tracing::info!(request_id = %request_id, %film_id, %user_id, "Unlike requested");
    let outcome = state.social.likes.remove_like(film_id, user_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn like_count(
    State(state): State<Arc<AppState>>,
    Path(film_id): Path<FilmId>,
) -> AppResult<Json<LikeCountResponse>> {
    let likes = state.social.likes.like_count(film_id).await?;
    Ok(Json(LikeCountResponse { film_id, likes }))
}

/// `GET /films/popular?count=10&genreId=1&year=1999`
pub async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PopularQuery>,
) -> AppResult<Json<Vec<RankedFilm>>> {
    let filter = PopularityFilter {
        genre_id: params.genre_id,
        year: params.year,
    };
    let films = state
        .social
        .popularity
        .popular_films(params.count.unwrap_or(DEFAULT_COUNT), filter)
        .await?;
    Ok(Json(films))
}

/// `GET /films/common?userId=1&friendId=2`
pub async fn common(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CommonQuery>,
) -> AppResult<Json<Vec<Film>>> {
    let films = state
        .social
        .likes
        .common_films(params.user_id, params.friend_id)
        .await?;
    Ok(Json(films))
}
