/*
 * Responsibility
 * - tracing / panic hook
 * - Config 読み込み → AppState 生成 → Router 組み立て
 * - Layer order (outermost first): http → cookie gate → access → routes
 * - axum::serve() で起動
 */
use std::{panic, process};

use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // RUST_LOG=info,schedule_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash so we notice. Production: keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "refusing to start");
    })?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    build_router_with(api::routes(), state, config)
}

/// Wrap any set of routes (ours or a collaborator's) in the gateway layers.
pub fn build_router_with(routes: Router<AppState>, state: AppState, config: &Config) -> Router {
    let router = middleware::auth::access::apply(routes, state.clone());
    let router = middleware::cookie_gate::apply(router, state.clone());
    let router = router.with_state(state);

    middleware::http::apply(router, config)
}
