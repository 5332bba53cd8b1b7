/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Everything inside is built once at startup and only read afterwards
 */
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::services::auth::{AccessEngine, build_access_engine, build_cookie_reader};
use crate::services::cookies::UpstreamResponseReader;

#[derive(Clone, Debug)]
pub struct AppState {
    pub access: Arc<AccessEngine>,
    pub cookies: Arc<UpstreamResponseReader>,
}

impl AppState {
    pub fn new(access: Arc<AccessEngine>, cookies: Arc<UpstreamResponseReader>) -> Self {
        Self { access, cookies }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            build_access_engine(config)?,
            build_cookie_reader(config),
        ))
    }
}
