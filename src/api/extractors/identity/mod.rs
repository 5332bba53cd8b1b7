/*!
 * Verified identity extractor
 *
 * Responsibility:
 * - Hand the identity verified by the access middleware to handlers
 * - The type itself lives with the access engine; this module only re-exports it
 *
 * Public API:
 * - Identity
 * - IdentityExtractor
 */

mod core;

pub use crate::services::auth::Identity;
pub use self::core::IdentityExtractor;
