//! thoth-common — Shared types, errors, and ambient infrastructure used
//! across all Thoth crates: abstract error kinds, the content cache (C1),
//! the external gateway (C2: rate limiting, retry, allowlisting), content
//! fingerprinting, and the document splitter shared by C4 and C6.

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod lexical;
pub mod splitter;

pub use cache::{CacheEntry, CacheStore, ContentCache};
pub use error::{AppError, Result};
pub use fingerprint::{fingerprint, fingerprint_bytes};
pub use gateway::{Gateway, GatewayRequest, ServiceConfig};
pub use lexical::lexical_tokens;
