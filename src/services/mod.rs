/*
 * Responsibility
 * - Pure request/response security logic (no axum handlers here)
 * - auth: token verification, route classification, access decisions
 * - cookies: Set-Cookie hardening for our own and proxied responses
 */
pub mod auth;
pub mod cookies;
