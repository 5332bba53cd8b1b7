/*
 * Responsibility
 * - Load environment / .env settings (secret, issuer, cookie name, HTTP limits)
 * - Validate them (missing session secret fails startup)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::services::cookies::HeaderReaderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // HMAC key for session tokens. Empty only when unsigned tokens are explicitly allowed.
    pub session_secret: String,
    pub expected_issuer: Option<String>,
    pub allow_unsigned_tokens: bool,

    pub session_cookie_name: String,
    pub login_path: String,
    pub set_cookie_reader: HeaderReaderKind,

    pub request_timeout_seconds: u64,
    pub request_body_limit_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("expected_issuer", &self.expected_issuer)
            .field("allow_unsigned_tokens", &self.allow_unsigned_tokens)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("login_path", &self.login_path)
            .field("set_cookie_reader", &self.set_cookie_reader)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match lookup("PORT") {
            Some(s) => s.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let allow_unsigned_tokens = lookup("ALLOW_UNSIGNED_SESSION_TOKENS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        // Unsigned tokens are a local-development escape hatch only.
        if allow_unsigned_tokens && app_env.is_production() {
            return Err(ConfigError::Invalid("ALLOW_UNSIGNED_SESSION_TOKENS"));
        }

        let session_secret = lookup("SESSION_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let session_secret = match (session_secret, allow_unsigned_tokens) {
            (Some(secret), _) => secret,
            (None, true) => String::new(),
            (None, false) => return Err(ConfigError::Missing("SESSION_SECRET")),
        };

        let expected_issuer = lookup("AUTH_EXPECTED_ISSUER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let session_cookie_name =
            lookup("SESSION_COOKIE_NAME").unwrap_or_else(|| "app_session".to_string());
        if session_cookie_name.is_empty()
            || session_cookie_name.contains([';', '=', ',', ' '])
        {
            return Err(ConfigError::Invalid("SESSION_COOKIE_NAME"));
        }

        let login_path = lookup("LOGIN_PATH").unwrap_or_else(|| "/login".to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::Invalid("LOGIN_PATH"));
        }

        let set_cookie_reader = match lookup("SET_COOKIE_READER")
            .unwrap_or_else(|| "native".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "native" => HeaderReaderKind::Native,
            "combined" => HeaderReaderKind::Combined,
            _ => return Err(ConfigError::Invalid("SET_COOKIE_READER")),
        };

        let request_timeout_seconds = lookup("REQUEST_TIMEOUT_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let request_body_limit_bytes = lookup("REQUEST_BODY_LIMIT_BYTES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        Ok(Self {
            addr,
            app_env,
            session_secret,
            expected_issuer,
            allow_unsigned_tokens,
            session_cookie_name,
            login_path,
            set_cookie_reader,
            request_timeout_seconds,
            request_body_limit_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_secret() {
        let config = load(&[("SESSION_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.session_cookie_name, "app_session");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.set_cookie_reader, HeaderReaderKind::Native);
        assert_eq!(config.expected_issuer, None);
        assert!(!config.allow_unsigned_tokens);
    }

    #[test]
    fn missing_secret_fails_fast() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("SESSION_SECRET"));
        assert_eq!(
            load(&[("SESSION_SECRET", "   ")]).unwrap_err(),
            ConfigError::Missing("SESSION_SECRET")
        );
    }

    #[test]
    fn unsigned_tokens_need_explicit_opt_in_outside_production() {
        let config = load(&[("ALLOW_UNSIGNED_SESSION_TOKENS", "true")]).unwrap();
        assert!(config.session_secret.is_empty());

        assert_eq!(
            load(&[
                ("ALLOW_UNSIGNED_SESSION_TOKENS", "true"),
                ("APP_ENV", "production"),
            ])
            .unwrap_err(),
            ConfigError::Invalid("ALLOW_UNSIGNED_SESSION_TOKENS")
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            load(&[("SESSION_SECRET", "x"), ("PORT", "http")]).unwrap_err(),
            ConfigError::Invalid("PORT")
        );
        assert_eq!(
            load(&[("SESSION_SECRET", "x"), ("SET_COOKIE_READER", "magic")]).unwrap_err(),
            ConfigError::Invalid("SET_COOKIE_READER")
        );
        assert_eq!(
            load(&[("SESSION_SECRET", "x"), ("SESSION_COOKIE_NAME", "a b")]).unwrap_err(),
            ConfigError::Invalid("SESSION_COOKIE_NAME")
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let config = load(&[("SESSION_SECRET", "top-secret-value")]).unwrap();
        assert!(!format!("{config:?}").contains("top-secret-value"));
    }
}
