use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn services() -> Router<AppState> {
    Router::new()
        .route(
            "/services",
            get(handlers::list_services).post(handlers::warn_service),
        )
        .route(
            "/services/:id",
            get(handlers::get_service).post(handlers::moderate_service),
        )
        .route(
            "/services/:id/reactivate",
            post(handlers::reactivate_service),
        )
}

pub fn warnings() -> Router<AppState> {
    Router::new().route(
        "/warning",
        get(handlers::list_warnings).post(handlers::create_warning),
    )
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
}
