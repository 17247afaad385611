//! Response caching primitives
//!
//! - **Per-entry TTL**: each insert chooses its own lifetime
//! - **Lazy validity**: stale entries are ignored on lookup, never swept
//! - **Testable**: clock abstraction for deterministic time-based tests
//! - **Observable**: hit/miss/stale counters via [`CacheStats`]

mod stats;
mod ttl;

pub use stats::CacheStats;
pub use ttl::TtlCache;
