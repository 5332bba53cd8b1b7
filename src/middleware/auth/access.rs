//! Session cookie check -> access decision -> forward / redirect / deny.
//!
//! - Client-supplied identity headers are always removed first.
//! - Admitted requests get the identity headers and an `Identity` extension, so handlers
//!   never re-verify the token.
//! - Denied or redirected requests never reach the handler.

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::services::auth::access::{AccessDecision, IDENTITY_HEADERS, Outcome, cookie_header};
use crate::state::AppState;

/// Put the access decision in front of every route (fallback included).
///
/// ```ignore
/// let router = middleware::auth::access::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    for name in IDENTITY_HEADERS.iter() {
        req.headers_mut().remove(name);
    }

    let cookies = cookie_header(req.headers());

    let target = original_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| original_uri.path());

    let decision = state
        .access
        .decide(cookies.as_deref(), target, req.method(), Utc::now());

    match decision.outcome {
        Outcome::Admitted => {
            for (name, value) in &decision.identity_headers {
                req.headers_mut().insert(name.clone(), value.clone());
            }
            if let Some(identity) = decision.identity {
                // middleware → extractor への受け渡し
                req.extensions_mut().insert(identity);
            }
            next.run(req).await
        }
        Outcome::Redirected => {
            debug!(path = %original_uri.path(), role = ?decision.role, "authenticated user sent to role home");
            redirect(&decision)
        }
        Outcome::Denied => {
            match decision.failure {
                Some(failure) => warn!(
                    failure = ?failure,
                    path = %original_uri.path(),
                    "session token rejected"
                ),
                None if decision.response_status == Some(StatusCode::FORBIDDEN) => warn!(
                    role = ?decision.role,
                    path = %original_uri.path(),
                    "role not permitted"
                ),
                None => debug!(path = %original_uri.path(), "no session cookie"),
            }
            deny(&decision, &state)
        }
    }
}

fn redirect(decision: &AccessDecision) -> Response {
    let location = decision.redirect_to.as_deref().unwrap_or("/");
    let mut response = Redirect::to(location).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn deny(decision: &AccessDecision, state: &AppState) -> Response {
    // page routes: redirect to login / role home
    if decision.redirect_to.is_some() {
        return redirect(decision);
    }

    let error = match decision.response_status {
        Some(StatusCode::FORBIDDEN) => AppError::Forbidden,
        _ => AppError::Unauthorized,
    };
    let mut response = error.into_response();

    if decision.clear_session_cookie {
        match HeaderValue::from_str(&state.cookies.policy().clearing_cookie()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "could not build session clearing cookie"),
        }
    }
    response
}
