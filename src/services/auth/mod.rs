pub mod access;
pub mod factory;
pub mod roles;
pub mod routes;
pub mod token;

pub use access::{AccessDecision, AccessEngine, Identity, Outcome};
pub use factory::{build_access_engine, build_cookie_reader};
pub use roles::Role;
pub use routes::{RouteClass, RoutePolicy};
pub use token::{Claims, VerificationFailure};
