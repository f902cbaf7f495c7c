//! I/O primitives: readiness waiting and socket construction.

pub mod readiness;
pub mod socket;

pub use readiness::{Readiness, ReadinessPoller, ReadySet};
pub use socket::{connect_begin, connect_finish, ConnectStart};
