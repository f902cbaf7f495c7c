//! # veneer_client
//!
//! HTTP/1.1 and HTTP/2 client engine whose distinguishing feature is
//! browser-accurate TLS fingerprinting: the ClientHello is shaped to match
//! a named browser profile (cipher order, extension order, groups, ALPN,
//! ALPS, GREASE, certificate compression) and its JA3 is computed from the
//! profile, not the negotiation.
//!
//! The engine is readiness-driven: a request is a state machine stepped to
//! quiescence, suspending on socket readiness the embedder supplies.
//! Connections are cached by authority with browser-like limits; HTTP/2
//! connections multiplex through a session manager with its own I/O
//! thread.
//!
//! The public fluent API lives in the `veneer` crate; this crate is the
//! machinery.

use std::sync::OnceLock;

pub mod client;
pub mod config;
pub mod cookie;
pub mod decode;
pub mod dns;
pub mod error;
pub mod http;
pub mod io;
pub mod machine;
pub mod manager;
pub mod pool;
pub mod profiles;
pub mod proto;
pub mod proxy;
pub mod tls;

pub mod prelude;

pub use crate::prelude::*;

static LIBRARY: OnceLock<Library> = OnceLock::new();

/// Process-wide library state. TLS backend initialization underneath is
/// once-only; everything after construction is per-client.
#[derive(Debug)]
pub struct Library {
    version: &'static str,
}

impl Library {
    pub fn version(&self) -> &'static str {
        self.version
    }
}

/// Initialize the library. Idempotent; every `Client` calls this.
pub fn init() -> &'static Library {
    LIBRARY.get_or_init(|| {
        boring2::init();
        Library {
            version: env!("CARGO_PKG_VERSION"),
        }
    })
}

/// The library version string.
pub fn version() -> &'static str {
    init().version
}

/// Release process-wide resources. Everything the library holds is owned
/// by values with destructors, so this is a checkpoint rather than a
/// teardown: it exists so embedders have a symmetric call to pair with
/// [`init`].
pub fn cleanup() {}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        let first = super::init() as *const _;
        let second = super::init() as *const _;
        assert_eq!(first, second);
        assert!(!super::version().is_empty());
    }
}
