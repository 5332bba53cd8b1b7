//! Set-Cookie collection for our own responses and for responses proxied from upstream
//! services.
//!
//! Every path that hands cookies to the browser goes through `UpstreamResponseReader`, so
//! the hardening policy lives in exactly one place.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use tracing::{error, warn};

use super::policy::{HardenedCookiePolicy, PolicyViolation};

/// How Set-Cookie lines are read out of a header map. Picked once at startup.
///
/// Lines are raw header bytes: cookie values may hold obs-text and must be forwarded
/// unchanged.
pub trait MultiValueHeaderReader: Send + Sync {
    fn set_cookie_lines(&self, headers: &HeaderMap) -> Vec<Vec<u8>>;
}

/// One header entry per cookie (the normal case for `http::HeaderMap`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHeaderReader;

impl MultiValueHeaderReader for NativeHeaderReader {
    fn set_cookie_lines(&self, headers: &HeaderMap) -> Vec<Vec<u8>> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.as_bytes().to_vec())
            .collect()
    }
}

/// For clients that fold all Set-Cookie headers into one comma-joined value.
#[derive(Debug, Default, Clone, Copy)]
pub struct CombinedHeaderReader;

impl MultiValueHeaderReader for CombinedHeaderReader {
    fn set_cookie_lines(&self, headers: &HeaderMap) -> Vec<Vec<u8>> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .flat_map(|v| split_combined(v.as_bytes()))
            .collect()
    }
}

/// Split a folded Set-Cookie value. A comma only separates cookies when the text after it
/// starts a new `name=` pair, so `Expires=Wed, 21 Oct ...` stays intact.
pub fn split_combined(value: &[u8]) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (idx, byte) in value.iter().enumerate() {
        if *byte == b',' && starts_cookie_pair(&value[idx + 1..]) {
            push_trimmed(&mut lines, &value[start..idx]);
            start = idx + 1;
        }
    }
    push_trimmed(&mut lines, &value[start..]);
    lines
}

fn starts_cookie_pair(rest: &[u8]) -> bool {
    let rest = rest.trim_ascii_start();
    match rest.iter().position(|b| *b == b'=') {
        Some(eq) => {
            let name = &rest[..eq];
            !name.is_empty() && !name.iter().any(|b| matches!(b, b';' | b',' | b' ' | b'\t'))
        }
        None => false,
    }
}

fn push_trimmed(lines: &mut Vec<Vec<u8>>, raw: &[u8]) {
    let line = raw.trim_ascii();
    if !line.is_empty() {
        lines.push(line.to_vec());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderReaderKind {
    Native,
    Combined,
}

impl HeaderReaderKind {
    pub fn build(self) -> Arc<dyn MultiValueHeaderReader> {
        match self {
            HeaderReaderKind::Native => Arc::new(NativeHeaderReader),
            HeaderReaderKind::Combined => Arc::new(CombinedHeaderReader),
        }
    }
}

#[derive(Clone)]
pub struct UpstreamResponseReader {
    reader: Arc<dyn MultiValueHeaderReader>,
    policy: HardenedCookiePolicy,
}

impl std::fmt::Debug for UpstreamResponseReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponseReader")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl UpstreamResponseReader {
    pub fn new(reader: Arc<dyn MultiValueHeaderReader>, policy: HardenedCookiePolicy) -> Self {
        Self { reader, policy }
    }

    pub fn policy(&self) -> &HardenedCookiePolicy {
        &self.policy
    }

    /// Read and vet the Set-Cookie lines of a response.
    pub fn cookies(&self, headers: &HeaderMap) -> Result<Vec<Vec<u8>>, Vec<PolicyViolation>> {
        let lines = self.reader.set_cookie_lines(headers);
        self.policy.enforce_on_raw_lines(&lines)
    }

    /// Rewrite a response's own Set-Cookie headers in place. On a policy violation all of
    /// them are removed.
    pub fn harden(&self, headers: &mut HeaderMap) {
        if !headers.contains_key(SET_COOKIE) {
            return;
        }
        let vetted = self.vet(headers);
        headers.remove(SET_COOKIE);
        append_all(headers, vetted);
    }

    /// Copy the cookies of a proxied `upstream` response onto `downstream`.
    pub fn forward(&self, upstream: &HeaderMap, downstream: &mut HeaderMap) {
        let vetted = self.vet(upstream);
        append_all(downstream, vetted);
    }

    fn vet(&self, headers: &HeaderMap) -> Vec<Vec<u8>> {
        match self.cookies(headers) {
            Ok(lines) => lines,
            Err(violations) => {
                for v in &violations {
                    error!(cookie = %v.cookie, requirement = %v.requirement, "session cookie policy violation");
                }
                error!(
                    violations = violations.len(),
                    "dropping entire Set-Cookie batch"
                );
                Vec::new()
            }
        }
    }
}

fn append_all(headers: &mut HeaderMap, lines: Vec<Vec<u8>>) {
    for line in lines {
        match HeaderValue::from_bytes(&line) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "dropping unencodable Set-Cookie line"),
        }
    }
}
