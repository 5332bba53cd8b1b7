/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: access decision in front of every route
 * - cookie_gate: Set-Cookie hardening on every response
 * - http: request id / tracing / limits
 */
pub mod auth;
pub mod cookie_gate;
pub mod http;
