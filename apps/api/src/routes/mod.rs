pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::letters::handlers;
use crate::rate_limit::enforce_download_limit;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/application-letters",
            get(handlers::handle_list).post(handlers::handle_create),
        )
        .route(
            "/api/application-letters/:id",
            get(handlers::handle_get)
                .put(handlers::handle_update)
                .delete(handlers::handle_delete),
        )
        .route(
            "/api/application-letters/:id/duplicate",
            post(handlers::handle_duplicate),
        )
        // Rendering is expensive; downloads get their own per-user budget
        .route(
            "/api/application-letters/:id/download",
            get(handlers::handle_download).route_layer(middleware::from_fn_with_state(
                state.clone(),
                enforce_download_limit,
            )),
        )
        .with_state(state)
}
