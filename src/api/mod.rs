mod handlers;
pub mod middleware;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::store::Store;

pub use middleware::SecurityConfig;

pub fn create_router(store: Store, security: SecurityConfig) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Satellite registry
        .route("/satellites", post(handlers::create_satellite))
        .route("/satellites", get(handlers::list_satellites))
        .route("/satellites/{id}", patch(handlers::update_satellite))
        .route("/satellites/{id}", delete(handlers::delete_satellite))
        .route("/satellite-types", get(handlers::list_satellite_types))
        .route("/seed/mock-satellites", post(handlers::seed_satellites))
        // Ground station registry
        .route("/ground-stations", post(handlers::create_ground_station))
        .route("/ground-stations", get(handlers::list_ground_stations))
        .route("/ground-stations/{id}", patch(handlers::update_ground_station))
        .route("/ground-stations/{id}", delete(handlers::delete_ground_station))
        .route(
            "/seed/mock-ground-stations",
            post(handlers::seed_ground_stations),
        )
        // Command lifecycle
        .route("/uplink", post(handlers::uplink_command))
        .route("/commands", get(handlers::list_commands))
        .route("/commands/{id}", get(handlers::get_command))
        .route("/commands/{id}/rerun", post(handlers::rerun_command))
        // Artifacts
        .route("/downloads/{id}", get(handlers::download_image))
        .route("/downloads/{id}/save-local", post(handlers::save_local_download))
        .route("/images/clear", post(handlers::clear_images))
        // Stateless preview
        .route("/preview/external-map", get(handlers::preview_external_map));

    let cors = match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        None => CorsLayer::permissive(),
    };

    let mut router = Router::new().nest("/api/v1", api);
    if let Some(limiter) = security.rate_limiter.clone() {
        router = router.layer(from_fn_with_state(limiter, middleware::rate_limit_middleware));
    }
    router
        .layer(from_fn_with_state(security, middleware::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(store)
}
