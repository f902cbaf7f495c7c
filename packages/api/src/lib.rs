//! # veneer
//!
//! An HTTP/1.1 + HTTP/2 client that wears a browser's TLS fingerprint.
//! Requests are shaped so the ClientHello (cipher order, extension order,
//! groups, ALPN, ALPS, GREASE, certificate compression) matches a named
//! browser build, and the JA3 the server sees is the profile's JA3.
//!
//! ```no_run
//! use veneer::{Browser, Veneer};
//!
//! let client = veneer::Client::new().expect("client");
//! let response = Veneer::get("https://example.com/")
//!     .browser(Browser::Chrome131)
//!     .header("x-requested-with", "veneer")
//!     .send(&client);
//!
//! println!("{} {} bytes", response.status, response.body_len());
//! println!("ja3: {:?}", response.tls.ja3);
//! ```

#![deny(unsafe_code)]

pub mod builder;

pub use builder::RequestBuilder;

// Re-export the engine types embedders touch.
pub use veneer_client::{
    AsyncManager, Browser, BrowserProfile, Client, ClientConfig, ClientStatsSnapshot,
    ConnectionPool, Error, HeaderList, Kind, Progress, ProxyConfig, Request, RequestId,
    RequestMachine, Response, Session, State, StreamPriority, Timings, TlsInfo,
};

use http::Method;

/// Entry point: static shorthands for each request method.
pub struct Veneer;

impl Veneer {
    pub fn get(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::GET, url)
    }

    pub fn post(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::POST, url)
    }

    pub fn put(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::PUT, url)
    }

    pub fn delete(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::DELETE, url)
    }

    pub fn head(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::HEAD, url)
    }

    pub fn options(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::OPTIONS, url)
    }

    pub fn patch(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::PATCH, url)
    }

    /// Builder for an arbitrary method.
    pub fn request(method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }
}

/// Library version string.
pub fn version() -> &'static str {
    veneer_client::version()
}
