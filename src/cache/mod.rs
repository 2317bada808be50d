//! Caching subsystem.
//!
//! Two pieces:
//!
//! - [`fingerprint::Fingerprint`] — deterministic cache key derived from
//!   the logical request identity (user, session, raw prompt, generation
//!   parameters). Deliberately independent of the assembled prompt text,
//!   so cache hits survive prompt-template changes.
//!
//! - [`response::ResponseCache`] — bounded LRU + TTL store of generated
//!   completions, sitting in front of the engine as a read-through /
//!   write-through layer. Keyed on the fingerprint; generation
//!   parameters are inside the key, so same-prompt/different-params
//!   requests are cache-distinct.

pub mod fingerprint;
pub mod response;

pub use fingerprint::Fingerprint;
pub use response::{CacheConfig, ResponseCache};
