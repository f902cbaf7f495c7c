//! Canonical re-exports: the types most embedders touch.

pub use crate::client::session::Session;
pub use crate::client::{Client, ClientStats, ClientStatsSnapshot};
pub use crate::config::ClientConfig;
pub use crate::error::{Error, Kind, Result};
pub use crate::http::{HeaderList, ProxyConfig, Request, Response, StreamPriority, Timings, TlsInfo};
pub use crate::io::{Readiness, ReadinessPoller, ReadySet};
pub use crate::machine::{Progress, RequestMachine, State};
pub use crate::manager::{AsyncManager, RequestId};
pub use crate::pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use crate::profiles::{Browser, BrowserProfile};
