/// Factory: build the access engine and cookie reader from application `Config`.
use std::sync::Arc;

use tracing::{error, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::services::auth::{AccessEngine, RoutePolicy};
use crate::services::cookies::{HardenedCookiePolicy, UpstreamResponseReader};

pub fn build_access_engine(config: &Config) -> Result<Arc<AccessEngine>, AppError> {
    let policy = RoutePolicy::scheduling(&config.login_path).map_err(|e| {
        error!(error = %e, "invalid route policy pattern");
        AppError::Internal
    })?;

    if config.session_secret.is_empty() {
        warn!("SESSION_SECRET is empty; session token signatures will not be verified");
    }

    Ok(Arc::new(AccessEngine::new(
        policy,
        config.session_secret.clone(),
        config.expected_issuer.clone(),
        config.session_cookie_name.clone(),
    )))
}

pub fn build_cookie_reader(config: &Config) -> Arc<UpstreamResponseReader> {
    Arc::new(UpstreamResponseReader::new(
        config.set_cookie_reader.build(),
        HardenedCookiePolicy::new(config.session_cookie_name.clone()),
    ))
}
