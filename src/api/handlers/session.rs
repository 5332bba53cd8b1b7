/*
 * Responsibility
 * - GET /api/auth/check: public; tells the front end whether its cookie is still good
 * - GET /api/me: protected; echoes the identity the middleware verified
 * - fallback: JSON 404
 */
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;

use crate::api::extractors::IdentityExtractor;
use crate::error::AppError;
use crate::services::auth::Role;
use crate::services::auth::access::cookie_header;
use crate::services::auth::roles::home_for;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCheckResponse {
    pub authenticated: bool,
    pub role: Option<&'static str>,
    pub home: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub subject_id: String,
    pub email: String,
    pub name: String,
    pub role: Option<&'static str>,
}

pub async fn auth_check(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookies = cookie_header(&headers);

    let body = match state.access.verify_cookie(cookies.as_deref(), Utc::now()) {
        Some(Ok(claims)) => {
            let role = Role::normalize(&claims.role);
            AuthCheckResponse {
                authenticated: true,
                role: role.map(|r| r.as_str()),
                home: Some(home_for(role)),
            }
        }
        _ => AuthCheckResponse {
            authenticated: false,
            role: None,
            home: None,
        },
    };

    no_store(Json(body).into_response())
}

pub async fn me(IdentityExtractor(identity): IdentityExtractor) -> Response {
    let body = MeResponse {
        subject_id: identity.subject_id,
        email: identity.email,
        name: identity.name,
        role: identity.role.map(|r| r.as_str()),
    };
    no_store(Json(body).into_response())
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::VARY, HeaderValue::from_static("Cookie"));
    response
}
