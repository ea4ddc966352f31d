pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Room for a base64-encoded proof of `MAX_PROOF_BYTES` plus its JSON envelope.
fn body_limit(max_proof_bytes: usize) -> usize {
    max_proof_bytes / 3 * 4 + 64 * 1024
}

fn cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn app(state: Arc<AppState>) -> Router {
    let limit = body_limit(state.config.max_proof_bytes);
    let cors = cors(&state.config.cors_origins);

    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/users/profile", get(handlers::auth::profile))
        .route("/api/routes", get(handlers::routes::list_routes))
        .route("/api/routes/info", post(handlers::routes::route_info))
        .route("/api/routes/:id", get(handlers::routes::get_route))
        .route("/api/schedules/search", post(handlers::schedules::search))
        .route("/api/schedules/:id", get(handlers::schedules::get_schedule))
        .route("/api/schedules/:id/seats", get(handlers::schedules::get_seats))
        .route(
            "/api/schedules/:id/events",
            get(handlers::schedules::events_stream),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/api/bookings/active", get(handlers::bookings::active_bookings))
        .route("/api/bookings/past", get(handlers::bookings::past_bookings))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/payment",
            post(handlers::bookings::confirm_payment),
        )
        .route(
            "/api/payments/create-intent",
            post(handlers::payments::create_intent),
        )
        .route("/api/payments/webhook", post(handlers::payments::stripe_webhook))
        .route(
            "/api/payments/upload-proof",
            post(handlers::payments::upload_proof),
        )
        .layer(DefaultBodyLimit::max(limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
