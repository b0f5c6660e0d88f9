use crate::reports::dispatcher::ReportDispatcher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Accepts report jobs and owns the per-family report stores.
    pub dispatcher: ReportDispatcher,
}
