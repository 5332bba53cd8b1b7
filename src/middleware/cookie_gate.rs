//! Outgoing Set-Cookie hardening for every response this process sends.
//!
//! Runs after the handler (and after the access layer), so cookies set by handlers,
//! cookies copied from proxied upstream responses, and the session-clearing cookie on
//! 401s all pass the same policy.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, cookie_gate_middleware))
}

async fn cookie_gate_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    state.cookies.harden(response.headers_mut());
    response
}
