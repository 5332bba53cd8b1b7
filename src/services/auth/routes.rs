//! Route classification: which paths are public, which need a session, and which need a
//! specific role.
//!
//! The table is built once at startup (`RoutePolicy::scheduling`) and shared read-only.

use axum::http::Method;
use regex::Regex;

use super::roles::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    StaticAsset,
    Protected,
    RoleRestricted(Vec<Role>),
}

#[derive(Debug, Clone)]
pub enum PathPattern {
    Exact(String),
    // segment-aware: `/admin` matches `/admin` and `/admin/x`, not `/administrator`
    Prefix(String),
    Regex(Regex),
}

impl PathPattern {
    pub fn exact(path: &str) -> Self {
        Self::Exact(path.to_string())
    }

    pub fn prefix(path: &str) -> Self {
        Self::Prefix(path.trim_end_matches('/').to_string())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Prefix(p) => prefix_matches(p, path),
            PathPattern::Regex(re) => re.is_match(path),
        }
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct RoleRule {
    pub pattern: PathPattern,
    pub roles: Vec<Role>,
}

impl RoleRule {
    pub fn new(pattern: PathPattern, roles: &[Role]) -> Self {
        Self {
            pattern,
            roles: roles.to_vec(),
        }
    }
}

/// Static route policy.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub public: Vec<PathPattern>,
    pub protected: Vec<PathPattern>,
    // evaluated in order, first match wins
    pub role_rules: Vec<RoleRule>,
    pub login_path: String,
}

impl RoutePolicy {
    /// The compiled-in policy for the scheduling front end.
    pub fn scheduling(login_path: &str) -> Result<Self, regex::Error> {
        use Role::*;

        let login_path = normalize_path(login_path);

        let public = vec![
            PathPattern::exact("/"),
            PathPattern::exact(&login_path),
            PathPattern::exact("/health"),
            PathPattern::exact("/api/auth/check"),
            PathPattern::prefix("/auth"),
            PathPattern::prefix("/api/auth"),
        ];

        let protected = vec![
            PathPattern::prefix("/home"),
            PathPattern::prefix("/sessions"),
            PathPattern::prefix("/api"),
        ];

        let role_rules = vec![
            RoleRule::new(PathPattern::prefix("/api/admin"), &[Admin]),
            RoleRule::new(PathPattern::prefix("/admin"), &[Admin]),
            RoleRule::new(
                PathPattern::regex(r"^/api/courses/[^/]+/roster$")?,
                &[Teacher, Admin],
            ),
            RoleRule::new(PathPattern::prefix("/api/advisor"), &[Advisor, Teacher, Admin]),
            RoleRule::new(PathPattern::prefix("/advisor"), &[Advisor, Teacher, Admin]),
            RoleRule::new(PathPattern::prefix("/api/teacher"), &[Teacher, Admin]),
            RoleRule::new(PathPattern::prefix("/teacher"), &[Teacher, Admin]),
            RoleRule::new(PathPattern::prefix("/api/student"), &[Student, Admin]),
            RoleRule::new(PathPattern::prefix("/student"), &[Student, Admin]),
        ];

        Ok(Self {
            public,
            protected,
            role_rules,
            login_path,
        })
    }

    /// Classify a request path. `path` must not carry a query string.
    pub fn classify(&self, path: &str, method: &Method) -> RouteClass {
        let path = normalize_path(path);

        // Any last segment with a dot-extension counts as an asset, under /api too. A route
        // whose path parameter may hold a dot (`/api/x/{id}` with id `a.b`) is therefore
        // admitted without identity.
        if *method == Method::OPTIONS || has_file_extension(&path) {
            return RouteClass::StaticAsset;
        }

        if self.public.iter().any(|p| p.matches(&path)) {
            return RouteClass::Public;
        }

        if let Some(rule) = self.role_rules.iter().find(|r| r.pattern.matches(&path)) {
            return RouteClass::RoleRestricted(rule.roles.clone());
        }

        if self.protected.iter().any(|p| p.matches(&path)) {
            return RouteClass::Protected;
        }

        // Unlisted paths need a session.
        RouteClass::Protected
    }

    /// Paths from which an authenticated user is sent straight to their role home.
    pub fn is_entry_page(&self, path: &str) -> bool {
        let path = normalize_path(path);
        path == "/" || path == self.login_path
    }
}

/// Drop a trailing slash, except for the root.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// API paths get JSON denials; everything else is a page.
pub fn is_api_path(path: &str) -> bool {
    prefix_matches("/api", path)
}

fn has_file_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rfind('.') {
        Some(idx) => idx > 0 && idx + 1 < last.len(),
        None => false,
    }
}
