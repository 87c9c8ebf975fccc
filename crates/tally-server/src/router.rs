use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Tally endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/users", post(handler::register_handler))
        .route("/v1/users/:username/points", get(handler::points_handler))
        .route(
            "/v1/users/:username/bonus",
            get(handler::bonus_status_handler).post(handler::collect_bonus_handler),
        )
        .route(
            "/v1/tasks",
            get(handler::list_tasks_handler).post(handler::create_task_handler),
        )
        .route("/v1/tasks/:slug/complete", post(handler::complete_task_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
