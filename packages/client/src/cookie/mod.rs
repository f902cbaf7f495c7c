//! Cookie jar
//!
//! RFC 6265 basics for session continuity: the jar honours `Domain`,
//! `Path`, `Secure`, and `HttpOnly` and deliberately ignores `Max-Age`,
//! `Expires`, and `SameSite`. Cookies live for the session.

use std::sync::RwLock;

use url::Url;

/// One stored cookie with the attributes the jar acts on.
#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
}

/// Session-scoped cookie storage.
#[derive(Debug, Default)]
pub struct Jar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl Jar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one `Set-Cookie` header received from `url`. Malformed
    /// cookies are dropped.
    pub fn store(&self, set_cookie: &str, url: &Url) {
        let Ok(parsed) = cookie::Cookie::parse(set_cookie.to_string()) else {
            tracing::debug!("dropping malformed cookie");
            return;
        };
        let request_host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let domain = parsed
            .domain()
            .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| request_host.clone());
        // A Domain attribute must cover the responding host.
        if !domain_matches(&request_host, &domain) {
            tracing::debug!("dropping cookie for foreign domain");
            return;
        }

        let stored = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path: parsed.path().unwrap_or("/").to_string(),
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
        };

        let mut cookies = self.write();
        cookies.retain(|c| {
            !(c.name == stored.name && c.domain == stored.domain && c.path == stored.path)
        });
        cookies.push(stored);
    }

    /// The `Cookie:` header value for a request to `url`, or `None` when
    /// nothing matches.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let path = url.path();
        let https = url.scheme() == "https";

        let cookies = self.read();
        let mut pairs: Vec<String> = cookies
            .iter()
            .filter(|c| domain_matches(&host, &c.domain))
            .filter(|c| path_matches(path, &c.path))
            .filter(|c| !c.secure || https)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            return None;
        }
        pairs.dedup();
        Some(pairs.join("; "))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<StoredCookie>> {
        self.cookies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<StoredCookie>> {
        self.cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// RFC 6265 §5.1.3 domain matching.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || (host.ends_with(domain) && host[..host.len() - domain.len()].ends_with('.'))
}

/// RFC 6265 §5.1.4 path matching.
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/')))
}
