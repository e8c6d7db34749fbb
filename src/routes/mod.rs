pub mod admin;
pub mod dashboard;
pub mod health;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::common::AppState;
use crate::station::StationApi;

pub fn build_router<S: StationApi + 'static>(state: AppState<S>) -> Router {
    let read_routes = Router::new()
        .route("/view", get(dashboard::view::<S>))
        .route("/charts", get(dashboard::charts::<S>));

    let action_routes = Router::new()
        .route("/refresh", post(admin::refresh::<S>))
        .route("/devices/configure", post(admin::configure_device::<S>))
        .route("/devices/delete", post(admin::delete_device::<S>))
        .route("/capteurs", post(admin::add_capteur::<S>))
        .route("/capteurs/{id}", delete(admin::delete_capteur::<S>))
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // 64KB body limit

    // Health check routes
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    Router::new()
        .route("/", get(dashboard::index::<S>))
        .nest("/api", read_routes.merge(action_routes))
        .merge(health_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
