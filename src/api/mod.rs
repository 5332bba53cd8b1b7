/*
 * Responsibility
 * - routes() の re-export
 * - The handlers here are thin stand-ins; the scheduling handlers live elsewhere
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
