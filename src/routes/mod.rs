use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{propagate_request_id, request_span},
    models::EdgeOutcome,
    services::Social,
};

pub mod films;
pub mod reviews;
pub mod users;

/// Shared handler state
pub struct AppState {
    pub social: Social,
}

impl AppState {
    pub fn new(social: Social) -> Self {
        Self { social }
    }
}

/// Body returned by every graph mutation
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub outcome: EdgeOutcome,
}

impl From<EdgeOutcome> for MutationResponse {
    fn from(outcome: EdgeOutcome) -> Self {
        Self { outcome }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(film_routes())
        .merge(user_routes())
        .merge(review_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(propagate_request_id))
                .layer(TraceLayer::new_for_http().make_span_with(request_span)),
        )
}

fn film_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/films/popular", get(films::popular))
        .route("/films/common", get(films::common))
        .route("/films/:id/likes", get(films::like_count))
        .route(
            "/films/:id/like/:user_id",
            put(films::add_like).delete(films::remove_like),
        )
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:id/friends", get(users::friends))
        .route(
            "/users/:id/friends/:friend_id",
            put(users::add_friend).delete(users::remove_friend),
        )
        .route(
            "/users/:id/friends/common/:other_id",
            get(users::common_friends),
        )
        .route("/users/:id/recommendations", get(users::recommendations))
        .route("/users/:id/feed", get(users::feed))
}

fn review_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/reviews/:id/like/:user_id",
            put(reviews::like).delete(reviews::retract),
        )
        .route(
            "/reviews/:id/dislike/:user_id",
            put(reviews::dislike).delete(reviews::retract),
        )
        .route("/reviews/:id/votes", post(reviews::vote))
        .route("/reviews/:id/useful", get(reviews::useful))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
