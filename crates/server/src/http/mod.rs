use std::time::Duration;

use axum::{Router, middleware::from_fn, routing::get};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{AppState, routes};

pub mod auth;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let api_routes = Router::new()
        .merge(routes::todos::router())
        .merge(routes::comments::router())
        .merge(routes::attachments::router(&state))
        .merge(routes::categories::router())
        .layer(from_fn(auth::require_owner));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", api_routes);
    with_middleware(app, request_timeout).with_state(state)
}

/// Requests still running after `request_timeout` are dropped and answered
/// with 408.
fn with_middleware(app: Router<AppState>, request_timeout: Duration) -> Router<AppState> {
    app.layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}
