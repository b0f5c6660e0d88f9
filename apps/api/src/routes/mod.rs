pub mod health;

use axum::{routing::get, Router};

use crate::models::report::ReportFamily;
use crate::reports::handlers::family_routes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Guest interviews (invitation links)
        .nest("/api/v1/guest", family_routes(ReportFamily::Guest))
        // Registered candidates
        .nest("/api/v1", family_routes(ReportFamily::Regular))
        .with_state(state)
}
