//! HTTP data model: requests, responses, and the ordered header list.

pub mod headers;
pub mod request;
pub mod response;

pub use headers::{Header, HeaderList};
pub use request::{ProxyConfig, Request, StreamPriority};
pub use response::{Response, Timings, TlsInfo};
