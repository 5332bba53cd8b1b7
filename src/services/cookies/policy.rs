//! Set-Cookie hardening.
//!
//! - `sanitize` strips `Domain=` so no origin (ours or upstream) can widen a cookie's scope.
//! - `HardenedCookiePolicy::enforce_session_cookie_policy` checks the session cookie's
//!   attributes and rejects the whole batch on any violation (fail-closed).
//! - Both work on raw bytes too (`sanitize_bytes`, `enforce_on_raw_lines`) so proxied
//!   cookie values are never re-encoded.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    HttpOnly,
    Secure,
    // Strict or Lax
    SameSite,
    // Path=/
    Path,
    // Max-Age or Expires
    Lifetime,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Requirement::HttpOnly => "HttpOnly",
            Requirement::Secure => "Secure",
            Requirement::SameSite => "SameSite=Strict|Lax",
            Requirement::Path => "Path=/",
            Requirement::Lifetime => "Max-Age or Expires",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cookie '{cookie}' is missing {requirement}")]
pub struct PolicyViolation {
    pub cookie: String,
    pub requirement: Requirement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    // valueless attribute, e.g. `HttpOnly`
    Flag,
    Value(String),
}

/// One Set-Cookie line split into its name and attributes. Attribute keys are lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCookie {
    pub name: String,
    pub attributes: HashMap<String, AttributeValue>,
}

impl ParsedCookie {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split(';');
        let name = parts
            .next()
            .and_then(|pair| pair.split_once('=').map(|(n, _)| n).or(Some(pair)))
            .unwrap_or("")
            .trim()
            .to_string();

        let attributes = parts
            .filter_map(|attr| {
                let attr = attr.trim();
                if attr.is_empty() {
                    return None;
                }
                Some(match attr.split_once('=') {
                    Some((k, v)) => (
                        k.trim().to_ascii_lowercase(),
                        AttributeValue::Value(v.trim().to_string()),
                    ),
                    None => (attr.to_ascii_lowercase(), AttributeValue::Flag),
                })
            })
            .collect();

        Self { name, attributes }
    }

    fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    fn value(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(AttributeValue::Value(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    fn violations(&self) -> Vec<Requirement> {
        let mut missing = Vec::new();
        if !self.has("httponly") {
            missing.push(Requirement::HttpOnly);
        }
        if !self.has("secure") {
            missing.push(Requirement::Secure);
        }
        let same_site_ok = self
            .value("samesite")
            .is_some_and(|v| v.eq_ignore_ascii_case("strict") || v.eq_ignore_ascii_case("lax"));
        if !same_site_ok {
            missing.push(Requirement::SameSite);
        }
        if self.value("path") != Some("/") {
            missing.push(Requirement::Path);
        }
        if !(self.has("max-age") || self.has("expires")) {
            missing.push(Requirement::Lifetime);
        }
        missing
    }
}

/// Remove every `Domain=...` attribute from one Set-Cookie line. Everything else is kept
/// byte for byte, in order.
pub fn sanitize(line: &str) -> String {
    into_string(sanitize_bytes(line.as_bytes()))
}

/// `sanitize` for raw header bytes. Cookie values may carry obs-text, which must reach
/// the browser unchanged.
pub fn sanitize_bytes(line: &[u8]) -> Vec<u8> {
    let mut segments = line.split(|b| *b == b';');
    let mut out = Vec::with_capacity(line.len());
    if let Some(first) = segments.next() {
        out.extend_from_slice(first);
    }
    for segment in segments {
        let key = segment
            .split(|b| *b == b'=')
            .next()
            .unwrap_or_default()
            .trim_ascii();
        if key.eq_ignore_ascii_case(b"domain") {
            continue;
        }
        out.push(b';');
        out.extend_from_slice(segment);
    }
    out
}

// Input was UTF-8 and only whole ASCII-delimited segments were removed.
fn into_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

#[derive(Debug, Clone)]
pub struct HardenedCookiePolicy {
    session_cookie: String,
}

impl HardenedCookiePolicy {
    pub fn new(session_cookie: impl Into<String>) -> Self {
        Self {
            session_cookie: session_cookie.into(),
        }
    }

    /// Check a batch of Set-Cookie lines.
    ///
    /// Any violation on any session-cookie line rejects the whole batch, unrelated cookies
    /// included. Otherwise every line comes back sanitized.
    pub fn enforce_session_cookie_policy<S: AsRef<str>>(
        &self,
        lines: &[S],
    ) -> Result<Vec<String>, Vec<PolicyViolation>> {
        let raw: Vec<&[u8]> = lines.iter().map(|line| line.as_ref().as_bytes()).collect();
        Ok(self
            .enforce_on_raw_lines(&raw)?
            .into_iter()
            .map(into_string)
            .collect())
    }

    /// Same check over raw header bytes, as read from a `HeaderMap`.
    pub fn enforce_on_raw_lines<S: AsRef<[u8]>>(
        &self,
        lines: &[S],
    ) -> Result<Vec<Vec<u8>>, Vec<PolicyViolation>> {
        // Attributes are ASCII, so a lossy view is enough to inspect them. The output is
        // built from the original bytes.
        let violations: Vec<PolicyViolation> = lines
            .iter()
            .map(|line| ParsedCookie::parse(&String::from_utf8_lossy(line.as_ref())))
            .filter(|cookie| cookie.name.eq_ignore_ascii_case(&self.session_cookie))
            .flat_map(|cookie| {
                cookie
                    .violations()
                    .into_iter()
                    .map(move |requirement| PolicyViolation {
                        cookie: cookie.name.clone(),
                        requirement,
                    })
            })
            .collect();

        if !violations.is_empty() {
            return Err(violations);
        }

        Ok(lines
            .iter()
            .map(|line| sanitize_bytes(line.as_ref()))
            .collect())
    }

    /// A Set-Cookie line that expires the session cookie and still satisfies the policy.
    pub fn clearing_cookie(&self) -> String {
        format!(
            "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
            self.session_cookie
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> HardenedCookiePolicy {
        HardenedCookiePolicy::new("app_session")
    }

    const GOOD: &str = "app_session=abc; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=3600";

    #[test]
    fn sanitize_removes_only_domain() {
        assert_eq!(
            sanitize(
                "app_session=abc; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=3600; Domain=example.com"
            ),
            GOOD
        );
        assert_eq!(
            sanitize("a=b; domain=.example.com; Path=/;  Secure"),
            "a=b; Path=/;  Secure"
        );
        assert_eq!(sanitize("a=b; DOMAIN = x; HttpOnly"), "a=b; HttpOnly");
    }

    #[test]
    fn sanitize_leaves_domain_free_lines_alone() {
        assert_eq!(sanitize(GOOD), GOOD);
        // cookie value that merely contains the word is not an attribute
        assert_eq!(sanitize("domain=x; Path=/"), "domain=x; Path=/");
    }

    #[test]
    fn sanitize_bytes_keeps_obs_text() {
        assert_eq!(
            sanitize_bytes(b"pref=caf\xe9; Domain=x.com; Path=/"),
            b"pref=caf\xe9; Path=/".to_vec()
        );
    }

    #[test]
    fn raw_lines_are_vetted_like_text() {
        let batch: [&[u8]; 2] = [b"app_session=\xff; Path=/", b"other=1"];
        let err = policy().enforce_on_raw_lines(&batch).unwrap_err();
        assert!(err.iter().all(|v| v.cookie == "app_session"));
    }

    #[test]
    fn parse_lowercases_keys_and_records_flags() {
        let c = ParsedCookie::parse("Sid=1; HTTPONLY; SameSite=Strict; max-age=5");
        assert_eq!(c.name, "Sid");
        assert_eq!(c.attributes.get("httponly"), Some(&AttributeValue::Flag));
        assert_eq!(
            c.attributes.get("samesite"),
            Some(&AttributeValue::Value("Strict".into()))
        );
        assert!(c.attributes.contains_key("max-age"));
    }

    #[test]
    fn hardened_session_cookie_passes_and_is_sanitized() {
        let lines = vec![
            format!("{GOOD}; Domain=example.com"),
            "theme=dark; Path=/; Domain=example.com".to_string(),
        ];
        let out = policy().enforce_session_cookie_policy(&lines).unwrap();
        assert_eq!(out, vec![GOOD.to_string(), "theme=dark; Path=/".to_string()]);
    }

    #[test]
    fn expires_counts_as_lifetime() {
        let line = "app_session=abc; HttpOnly; Secure; SameSite=Strict; Path=/; Expires=Wed, 21 Oct 2037 07:28:00 GMT";
        assert!(policy().enforce_session_cookie_policy(&[line]).is_ok());
    }

    #[test]
    fn each_missing_requirement_rejects_the_batch() {
        let cases = [
            ("app_session=abc; Secure; SameSite=Lax; Path=/; Max-Age=1", Requirement::HttpOnly),
            ("app_session=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=1", Requirement::Secure),
            ("app_session=abc; HttpOnly; Secure; Path=/; Max-Age=1", Requirement::SameSite),
            ("app_session=abc; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=1", Requirement::SameSite),
            ("app_session=abc; HttpOnly; Secure; SameSite=Lax; Path=/api; Max-Age=1", Requirement::Path),
            ("app_session=abc; HttpOnly; Secure; SameSite=Lax; Path=/", Requirement::Lifetime),
        ];

        for (line, requirement) in cases {
            let batch = [line, "other=1; Path=/"];
            let err = policy().enforce_session_cookie_policy(&batch).unwrap_err();
            assert_eq!(
                err,
                vec![PolicyViolation {
                    cookie: "app_session".into(),
                    requirement
                }],
                "{line}"
            );
        }
    }

    #[test]
    fn bare_session_cookie_reports_every_violation() {
        let batch = ["app_session=abc; Path=/", "other=1; Path=/"];
        let err = policy().enforce_session_cookie_policy(&batch).unwrap_err();
        let requirements: Vec<Requirement> = err.iter().map(|v| v.requirement).collect();
        assert_eq!(
            requirements,
            vec![
                Requirement::HttpOnly,
                Requirement::Secure,
                Requirement::SameSite,
                Requirement::Lifetime
            ]
        );
    }

    #[test]
    fn session_cookie_name_matches_case_insensitively() {
        let err = policy()
            .enforce_session_cookie_policy(&["APP_SESSION=abc"])
            .unwrap_err();
        assert_eq!(err[0].cookie, "APP_SESSION");
    }

    #[test]
    fn batches_without_session_cookie_pass() {
        let out = policy()
            .enforce_session_cookie_policy(&["theme=dark", "lang=en; Domain=x.com"])
            .unwrap();
        assert_eq!(out, vec!["theme=dark", "lang=en"]);
    }

    #[test]
    fn clearing_cookie_satisfies_policy() {
        let p = policy();
        assert!(p.enforce_session_cookie_policy(&[p.clearing_cookie()]).is_ok());
    }
}
