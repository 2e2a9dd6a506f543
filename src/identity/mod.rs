//! Session identity management
//!
//! Supplies a fresh user-agent/proxy/locale/viewport combination per session
//! attempt and keeps rotating proxy state behind a single lock.

mod pool;
mod probe;

pub use pool::{Identity, IdentityPool};
pub use probe::{probe_candidates, ProbeConfig, ProxySource, StaticProxySource};
