pub mod policy;
pub mod upstream;

pub use policy::{HardenedCookiePolicy, PolicyViolation, Requirement, sanitize, sanitize_bytes};
pub use upstream::{HeaderReaderKind, MultiValueHeaderReader, UpstreamResponseReader};
