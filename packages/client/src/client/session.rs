//! Session: a client plus a cookie jar bound to one browser profile.

use url::Url;

use super::Client;
use crate::cookie::Jar;
use crate::error::Error;
use crate::http::{Request, Response};
use crate::profiles::Browser;

/// Stateful browsing session. Requests pick up stored cookies; responses
/// feed `Set-Cookie` back into the jar.
pub struct Session {
    client: Client,
    jar: Jar,
    browser: Browser,
}

impl Session {
    pub fn new(browser: Browser) -> Result<Self, Error> {
        Ok(Self {
            client: Client::new()?,
            jar: Jar::new(),
            browser,
        })
    }

    pub fn with_client(client: Client, browser: Browser) -> Self {
        Self {
            client,
            jar: Jar::new(),
            browser,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn cookie_count(&self) -> usize {
        self.jar.len()
    }

    pub fn clear_cookies(&self) {
        self.jar.clear();
    }

    /// Execute under this session's profile and cookie jar.
    pub fn execute(&self, mut request: Request) -> Response {
        request.browser = self.browser;

        if !request.headers.contains("cookie") {
            if let Some(header) = self.jar.header_for(&request.url) {
                request.headers.append("cookie", header);
            }
        }

        let url = request.url.clone();
        let response = self.client.execute(request);
        self.ingest_cookies(&response, &url);
        response
    }

    fn ingest_cookies(&self, response: &Response, url: &Url) {
        for value in response.headers.get_all("set-cookie") {
            self.jar.store(value, url);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("browser", &self.browser)
            .field("cookies", &self.cookie_count())
            .finish()
    }
}
