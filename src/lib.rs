//! Request admission and Set-Cookie hardening for the scheduling front end.
//!
//! Every request is classified by path, its session cookie is verified (HS256, no
//! external JWT library), and the role policy decides whether it is forwarded with
//! trusted identity headers, redirected, or denied. Every outgoing Set-Cookie header,
//! ours or proxied, passes the hardened session-cookie policy.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;
