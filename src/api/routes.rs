/*
 * Responsibility
 * - URL structure served by this process
 * - Access control is NOT applied here; middleware::auth::access wraps the whole router
 */
use axum::{Router, routing::get};

use crate::api::handlers::{
    health::health,
    session::{auth_check, me, not_found},
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/check", get(auth_check))
        .route("/api/me", get(me))
        .fallback(not_found)
}
