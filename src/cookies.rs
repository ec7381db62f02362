//! Snapshotable cookie jar.
//!
//! The upstream HTTP client's jar cannot be enumerated, filtered or
//! restored, so the session keeps its own. The jar round-trips through the
//! persisted state blob, and single-use challenge cookies can be removed by
//! name before a dump so they are never replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cookie as stored in the session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain attribute, when the site sent one.
    #[serde(default)]
    pub domain: Option<String>,
    /// Path attribute, when the site sent one.
    #[serde(default)]
    pub path: Option<String>,
    /// Secure attribute.
    #[serde(default)]
    pub secure: bool,
    /// Expiry, when the site sent `Expires` or `Max-Age`.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// Create a bare session cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            expires: None,
        }
    }

    /// True if the cookie carries an expiry in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }

    /// Parse a `Set-Cookie` header value. Returns `None` for garbage input.
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let mut parts = header.split(';');

        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim());

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr, None),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => cookie.domain = val.map(|v| v.trim_start_matches('.').to_string()),
                "path" => cookie.path = val.map(str::to_string),
                "secure" => cookie.secure = true,
                "expires" => {
                    if let Some(val) = val {
                        if let Ok(date) = DateTime::parse_from_rfc2822(&val.replace("GMT", "+0000"))
                        {
                            cookie.expires = Some(date.with_timezone(&Utc));
                        }
                    }
                }
                "max-age" => {
                    if let Some(secs) = val.and_then(|v| v.parse::<i64>().ok()) {
                        cookie.expires = Some(Utc::now() + chrono::Duration::seconds(secs));
                    }
                }
                _ => {}
            }
        }

        Some(cookie)
    }
}

/// In-memory cookie jar, private to one session.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie, matching on name.
    pub fn store(&mut self, cookie: Cookie) {
        if let Some(existing) = self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            self.cookies.push(cookie);
        }
    }

    /// Get a cookie by name.
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Remove a cookie by name.
    pub fn remove(&mut self, name: &str) {
        self.cookies.retain(|c| c.name != name);
    }

    /// Drop every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Number of cookies held.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// True if the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Absorb every `Set-Cookie` header of a response.
    pub fn update_from_response(&mut self, response: &reqwest::Response) {
        for header in response.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            match Cookie::parse_set_cookie(raw) {
                Some(cookie) => self.store(cookie),
                None => tracing::debug!(header = raw, "ignoring unparseable Set-Cookie"),
            }
        }
    }

    /// Build the `Cookie` request header, skipping expired cookies.
    /// Returns `None` when there is nothing to send.
    pub fn header_value(&self, now: DateTime<Utc>) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.is_expired(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Copy of the jar's contents, for the state dump.
    pub fn snapshot(&self) -> Vec<Cookie> {
        self.cookies.clone()
    }

    /// Replace the jar's contents from a state blob.
    pub fn restore(&mut self, cookies: Vec<Cookie>) {
        self.cookies = cookies;
    }
}
