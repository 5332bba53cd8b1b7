//! Access decision: route class + session token + role policy -> admit / redirect / deny.
//!
//! `AccessEngine` is built once from the immutable policy tables and the verifier
//! settings, then called per request. It returns a value; turning that value into an
//! HTTP response is the middleware's job.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use chrono::{DateTime, Utc};
use url::form_urlencoded;

use super::roles::{Role, home_for};
use super::routes::{RouteClass, RoutePolicy, is_api_path};
use super::token::{self, Claims, VerificationFailure};

pub const SUBJECT_ID_HEADER: HeaderName = HeaderName::from_static("subject-id");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("user-email");
pub const USER_NAME_HEADER: HeaderName = HeaderName::from_static("user-name");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("user-role");
pub const TOKEN_VALID_HEADER: HeaderName = HeaderName::from_static("token-valid");

/// Headers only this layer may set. Anything a client sends under these names is dropped.
pub const IDENTITY_HEADERS: [HeaderName; 5] = [
    SUBJECT_ID_HEADER,
    USER_EMAIL_HEADER,
    USER_NAME_HEADER,
    USER_ROLE_HEADER,
    TOKEN_VALID_HEADER,
];

pub const RETURN_TO_PARAM: &str = "returnTo";

/// Verified caller identity handed to downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub name: String,
    // None when the claim role is not in the closed set
    pub role: Option<Role>,
}

impl Identity {
    pub fn from_claims(claims: Claims) -> Self {
        let role = Role::normalize(&claims.role);
        Self {
            subject_id: claims.sub,
            email: claims.email,
            name: claims.name,
            role,
        }
    }

    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        vec![
            (SUBJECT_ID_HEADER, header_value(&self.subject_id)),
            (USER_EMAIL_HEADER, header_value(&self.email)),
            (USER_NAME_HEADER, header_value(&self.name)),
            (
                USER_ROLE_HEADER,
                header_value(self.role.map(|r| r.as_str()).unwrap_or("")),
            ),
            (TOKEN_VALID_HEADER, HeaderValue::from_static("true")),
        ]
    }
}

// Only visible ASCII goes through as-is. `HeaderValue` would also take obs-text bytes,
// which downstream services cannot decode reliably.
fn header_value(raw: &str) -> HeaderValue {
    if raw.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        if let Ok(v) = HeaderValue::from_str(raw) {
            return v;
        }
    }
    let encoded: String = form_urlencoded::byte_serialize(raw.as_bytes()).collect();
    HeaderValue::from_str(&encoded).unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    Redirected,
    Denied,
}

#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub outcome: Outcome,
    pub admit: bool,
    pub role: Option<Role>,
    pub redirect_to: Option<String>,
    // 401/403 for denials, 303 for re-entry redirects, None when admitted
    pub response_status: Option<StatusCode>,
    pub identity_headers: Vec<(HeaderName, HeaderValue)>,
    pub identity: Option<Identity>,
    pub clear_session_cookie: bool,
    // server-side only; never rendered to the client
    pub failure: Option<VerificationFailure>,
}

impl AccessDecision {
    fn admitted(identity: Option<Identity>) -> Self {
        Self {
            outcome: Outcome::Admitted,
            admit: true,
            role: identity.as_ref().and_then(|i| i.role),
            redirect_to: None,
            response_status: None,
            identity_headers: identity.as_ref().map(Identity::headers).unwrap_or_default(),
            identity,
            clear_session_cookie: false,
            failure: None,
        }
    }

    fn redirected(role: Option<Role>, location: String) -> Self {
        Self {
            outcome: Outcome::Redirected,
            admit: false,
            role,
            redirect_to: Some(location),
            response_status: Some(StatusCode::SEE_OTHER),
            identity_headers: Vec::new(),
            identity: None,
            clear_session_cookie: false,
            failure: None,
        }
    }

    fn denied(status: StatusCode, role: Option<Role>, redirect_to: Option<String>) -> Self {
        Self {
            outcome: Outcome::Denied,
            admit: false,
            role,
            redirect_to,
            response_status: Some(status),
            identity_headers: Vec::new(),
            identity: None,
            clear_session_cookie: false,
            failure: None,
        }
    }
}

pub struct AccessEngine {
    policy: RoutePolicy,
    secret: String,
    expected_issuer: Option<String>,
    cookie_name: String,
}

impl std::fmt::Debug for AccessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("AccessEngine")
            .field("expected_issuer", &self.expected_issuer)
            .field("cookie_name", &self.cookie_name)
            .field("signed", &!self.secret.is_empty())
            .finish()
    }
}

impl AccessEngine {
    pub fn new(
        policy: RoutePolicy,
        secret: impl Into<String>,
        expected_issuer: Option<String>,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            secret: secret.into(),
            expected_issuer,
            cookie_name: cookie_name.into(),
        }
    }

    /// Verify the session cookie found in a `cookie` header, if any.
    pub fn verify_cookie(
        &self,
        cookie_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Result<Claims, VerificationFailure>> {
        let token = session_token(cookie_header?, &self.cookie_name)?;
        Some(token::verify(
            token,
            &self.secret,
            self.expected_issuer.as_deref(),
            now,
        ))
    }

    /// Decide one request.
    ///
    /// `target` is the request path, optionally followed by `?query`. The query only
    /// feeds the return-to parameter of a login redirect.
    pub fn decide(
        &self,
        cookie_header: Option<&str>,
        target: &str,
        method: &Method,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        let path = target.split_once('?').map(|(p, _)| p).unwrap_or(target);

        match self.policy.classify(path, method) {
            RouteClass::StaticAsset => AccessDecision::admitted(None),
            RouteClass::Public => {
                if self.policy.is_entry_page(path) {
                    if let Some(Ok(claims)) = self.verify_cookie(cookie_header, now) {
                        let role = Role::normalize(&claims.role);
                        return AccessDecision::redirected(role, home_for(role).to_string());
                    }
                }
                AccessDecision::admitted(None)
            }
            RouteClass::Protected => self.require_session(cookie_header, target, path, None, now),
            RouteClass::RoleRestricted(roles) => {
                self.require_session(cookie_header, target, path, Some(roles.as_slice()), now)
            }
        }
    }

    fn require_session(
        &self,
        cookie_header: Option<&str>,
        target: &str,
        path: &str,
        roles: Option<&[Role]>,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        let claims = match self.verify_cookie(cookie_header, now) {
            Some(Ok(claims)) => claims,
            Some(Err(failure)) => return self.unauthenticated(target, path, Some(failure)),
            None => return self.unauthenticated(target, path, None),
        };

        let identity = Identity::from_claims(claims);

        if let Some(roles) = roles {
            let permitted = identity.role.is_some_and(|r| roles.contains(&r));
            if !permitted {
                return forbidden(path, identity.role);
            }
        }

        AccessDecision::admitted(Some(identity))
    }

    fn unauthenticated(
        &self,
        target: &str,
        path: &str,
        failure: Option<VerificationFailure>,
    ) -> AccessDecision {
        let mut decision = if is_api_path(path) {
            let mut d = AccessDecision::denied(StatusCode::UNAUTHORIZED, None, None);
            d.clear_session_cookie = true;
            d
        } else {
            let return_to: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
            let location = format!(
                "{}?{}={}",
                self.policy.login_path, RETURN_TO_PARAM, return_to
            );
            AccessDecision::denied(StatusCode::UNAUTHORIZED, None, Some(location))
        };
        decision.failure = failure;
        decision
    }
}

fn forbidden(path: &str, role: Option<Role>) -> AccessDecision {
    if is_api_path(path) {
        AccessDecision::denied(StatusCode::FORBIDDEN, role, None)
    } else {
        let location = format!("{}?forbidden=1", home_for(role));
        AccessDecision::denied(StatusCode::FORBIDDEN, role, Some(location))
    }
}

/// All `cookie` request headers joined into one (HTTP/2 clients may split them).
pub fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join("; "))
}

/// Pull the session token out of a `cookie` request header. Name match is exact.
pub fn session_token<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"'))
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::TimeZone;
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;

    const SECRET: &str = "s3cret";

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn engine() -> AccessEngine {
        AccessEngine::new(
            RoutePolicy::scheduling("/login").unwrap(),
            SECRET,
            None,
            "app_session",
        )
    }

    fn mint(role: &str, exp: i64) -> String {
        let h = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256"}).to_string());
        let p = URL_SAFE_NO_PAD.encode(
            json!({"sub": "u1", "email": "u1@example.com", "name": "Zoë", "role": role, "exp": exp})
                .to_string(),
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{h}.{p}").as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{h}.{p}.{sig}")
    }

    fn cookie(role: &str, exp: i64) -> String {
        format!("theme=dark; app_session={}", mint(role, exp))
    }

    fn header<'a>(decision: &'a AccessDecision, name: &HeaderName) -> Option<&'a HeaderValue> {
        decision
            .identity_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[test]
    fn advisor_is_admitted_to_advisor_catalog() {
        let c = cookie("advisor", now().timestamp() + 3600);
        let d = engine().decide(Some(&c), "/api/advisor/catalog", &Method::GET, now());

        assert_eq!(d.outcome, Outcome::Admitted);
        assert!(d.admit);
        assert_eq!(d.role, Some(Role::Advisor));
        assert_eq!(header(&d, &SUBJECT_ID_HEADER).unwrap(), "u1");
        assert_eq!(header(&d, &USER_ROLE_HEADER).unwrap(), "advisor");
        assert_eq!(header(&d, &TOKEN_VALID_HEADER).unwrap(), "true");
        // non-ASCII display name is percent-encoded
        assert_eq!(header(&d, &USER_NAME_HEADER).unwrap(), "Zo%C3%AB");
    }

    #[test]
    fn identity_header_values_are_visible_ascii() {
        assert_eq!(header_value("User One"), "User One");
        assert_eq!(header_value("u1@example.com"), "u1@example.com");
        assert_eq!(header_value("Zoë").as_bytes(), b"Zo%C3%AB");
        assert_eq!(header_value("Ada\tLovelace"), "Ada%09Lovelace");
        assert_eq!(header_value("a\u{7f}b"), "a%7Fb");
    }

    #[test]
    fn role_outside_rule_is_forbidden() {
        let c = cookie("student", now().timestamp() + 3600);
        let d = engine().decide(Some(&c), "/api/advisor/catalog", &Method::GET, now());

        assert_eq!(d.outcome, Outcome::Denied);
        assert!(!d.admit);
        assert_eq!(d.response_status, Some(StatusCode::FORBIDDEN));
        assert!(d.redirect_to.is_none());
        assert!(d.identity_headers.is_empty());
    }

    #[test]
    fn unknown_role_satisfies_no_rule_but_passes_plain_protected() {
        let c = cookie("janitor", now().timestamp() + 3600);
        let e = engine();

        let restricted = e.decide(Some(&c), "/admin", &Method::GET, now());
        assert_eq!(restricted.response_status, Some(StatusCode::FORBIDDEN));
        assert_eq!(
            restricted.redirect_to.as_deref(),
            Some("/home?forbidden=1")
        );

        let plain = e.decide(Some(&c), "/api/me", &Method::GET, now());
        assert!(plain.admit);
        assert_eq!(header(&plain, &USER_ROLE_HEADER).unwrap(), "");
    }

    #[test]
    fn expired_token_on_page_redirects_to_login_with_return_to() {
        let c = cookie("advisor", now().timestamp() - 1);
        let d = engine().decide(Some(&c), "/advisor/plans?week=3", &Method::GET, now());

        assert_eq!(d.outcome, Outcome::Denied);
        assert_eq!(d.response_status, Some(StatusCode::UNAUTHORIZED));
        assert_eq!(d.failure, Some(VerificationFailure::Expired));
        assert_eq!(
            d.redirect_to.as_deref(),
            Some("/login?returnTo=%2Fadvisor%2Fplans%3Fweek%3D3")
        );
        assert!(!d.clear_session_cookie);
    }

    #[test]
    fn invalid_token_on_api_is_401_and_clears_cookie() {
        let d = engine().decide(
            Some("app_session=not.a.token"),
            "/api/me",
            &Method::GET,
            now(),
        );
        assert_eq!(d.response_status, Some(StatusCode::UNAUTHORIZED));
        assert!(d.redirect_to.is_none());
        assert!(d.clear_session_cookie);
        assert!(d.failure.is_some());
    }

    #[test]
    fn missing_cookie_is_denied_without_failure_subtype() {
        let d = engine().decide(None, "/home", &Method::GET, now());
        assert_eq!(d.outcome, Outcome::Denied);
        assert_eq!(d.failure, None);
        assert_eq!(d.redirect_to.as_deref(), Some("/login?returnTo=%2Fhome"));
    }

    #[test]
    fn cookie_name_is_case_sensitive() {
        let token = mint("admin", now().timestamp() + 60);
        let header = format!("App_Session={token}");
        let d = engine().decide(Some(&header), "/api/me", &Method::GET, now());
        assert!(!d.admit);
    }

    #[test]
    fn authenticated_user_on_login_is_sent_home() {
        let c = cookie("teacher", now().timestamp() + 60);
        let e = engine();

        for path in ["/login", "/login/", "/"] {
            let d = e.decide(Some(&c), path, &Method::GET, now());
            assert_eq!(d.outcome, Outcome::Redirected, "{path}");
            assert_eq!(d.redirect_to.as_deref(), Some("/teacher"));
        }
    }

    #[test]
    fn anonymous_or_stale_user_on_login_is_admitted() {
        let e = engine();
        assert!(e.decide(None, "/login", &Method::GET, now()).admit);

        let stale = cookie("teacher", now().timestamp() - 60);
        let d = e.decide(Some(&stale), "/login", &Method::GET, now());
        assert!(d.admit);
        assert!(d.identity_headers.is_empty());
    }

    #[test]
    fn static_assets_are_admitted_without_identity() {
        let d = engine().decide(None, "/assets/app.css", &Method::GET, now());
        assert!(d.admit);
        assert!(d.identity.is_none());
    }

    #[test]
    fn split_cookie_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("app_session=tok"));
        let joined = cookie_header(&headers).unwrap();
        assert_eq!(joined, "a=1; app_session=tok");
        assert_eq!(session_token(&joined, "app_session"), Some("tok"));
        assert_eq!(cookie_header(&HeaderMap::new()), None);
    }

    #[test]
    fn session_token_extraction() {
        assert_eq!(session_token("a=1; app_session=tok", "app_session"), Some("tok"));
        assert_eq!(session_token("app_session=\"tok\"", "app_session"), Some("tok"));
        assert_eq!(session_token("app_session=", "app_session"), None);
        assert_eq!(session_token("xapp_session=tok", "app_session"), None);
    }
}
