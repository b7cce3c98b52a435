//! HTTP adapter over the catalog service.

pub mod error;
mod extract;
mod handlers;
mod middleware;
pub mod models;
mod shutdown;
mod state;

pub use middleware::REQUEST_ID_HEADER;
pub use shutdown::{Drain, run_until_drained};
pub use state::{ApiState, ReadinessProbe};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::error::ErrorReport;

use self::middleware::{log_responses, set_request_context};
use self::models::HealthResponse;

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/api/v1/products/{id}",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/api/v1/categories", get(handlers::list_categories))
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health(State(state): State<ApiState>) -> Response {
    match state.readiness.ready().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            cache_backend: state.cache_backend,
        })
        .into_response(),
        Err(err) => {
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    cache_backend: state.cache_backend,
                }),
            )
                .into_response();
            ErrorReport::from_error("infra::http::health", StatusCode::SERVICE_UNAVAILABLE, &err)
                .attach(&mut response);
            response
        }
    }
}
