//! HTTP/2 over one TLS connection: frame codec, HPACK, the session, and
//! the concurrent session manager.
//!
//! The wire layer is in-house because fingerprint accuracy requires
//! emitting SETTINGS in profile order, the browser's connection
//! WINDOW_UPDATE value, and PRIORITY on the initial HEADERS — none of
//! which a general-purpose HTTP/2 library exposes.

pub mod frame;
pub mod hpack;
pub mod manager;
pub mod session;

pub use frame::PrioritySpec;
pub use manager::SessionManager;
pub use session::{H2RequestHead, H2Session, StreamState};
