//! HTTP session wrapper with a snapshotable cookie jar.
//!
//! One `Session` drives one login flow at a time. Cookies are kept in an
//! in-crate [`CookieJar`] rather than the client's own store so they can be
//! enumerated, filtered before a dump and restored from a blob. Every
//! response updates the jar before the next request is built.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;

use crate::config::{HttpConfig, RetryConfig};
use crate::cookies::CookieJar;
use crate::error::{Error, Result};

/// HTTP session private to a single login flow.
pub struct Session {
    client: reqwest::Client,
    jar: CookieJar,
    last_url: Option<String>,
    retry_backoff: Duration,
}

impl Session {
    /// Create a session from the HTTP and retry configuration.
    pub fn new(http: &HttpConfig, retry: &RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(http.timeout)
            .user_agent(http.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            jar: CookieJar::new(),
            last_url: None,
            retry_backoff: retry.backoff,
        })
    }

    /// Session with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(&HttpConfig::default(), &RetryConfig::default())
    }

    /// The cookie jar.
    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    /// Mutable access to the cookie jar.
    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }

    /// Last URL a request was sent to, if any.
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    /// Record the last visited URL (used when restoring from a state blob).
    pub fn set_last_url(&mut self, url: Option<String>) {
        self.last_url = url;
    }

    /// GET a URL.
    pub async fn get(&mut self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, None::<&()>).await
    }

    /// POST a JSON body to a URL.
    pub async fn post_json<B: Serialize + ?Sized>(
        &mut self,
        url: &str,
        body: &B,
    ) -> Result<Response> {
        self.request(Method::POST, url, Some(body)).await
    }

    /// Send a request, attaching the jar's cookies and absorbing the
    /// response's `Set-Cookie` headers.
    ///
    /// One bounded retry with a fixed backoff on a 429 answer; a 5xx answer
    /// maps to [`Error::SiteUnavailable`]. Everything else, including auth
    /// failures, is returned for the caller to classify.
    pub async fn request<B: Serialize + ?Sized>(
        &mut self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let mut response = self.send_once(method.clone(), url, body).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            tracing::debug!(url, backoff = ?self.retry_backoff, "throttled, retrying once");
            tokio::time::sleep(self.retry_backoff).await;
            response = self.send_once(method, url, body).await?;
        }

        if response.status().is_server_error() {
            return Err(Error::SiteUnavailable {
                message: format!("the website answered {}", response.status()),
            });
        }

        Ok(response)
    }

    async fn send_once<B: Serialize + ?Sized>(
        &mut self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let mut builder = self.client.request(method, url);
        if let Some(header) = self.jar.header_value(Utc::now()) {
            builder = builder.header(reqwest::header::COOKIE, header);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        self.jar.update_from_response(&response);
        self.last_url = Some(response.url().to_string());

        Ok(response)
    }

    /// Classify a probe response: 401/403 means the stored session is no
    /// longer accepted and a full login is required.
    pub fn check_logged_in(response: &Response) -> Result<()> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::SessionExpired),
            _ => Ok(()),
        }
    }

    /// Discard in-memory session artifacts: cookies and the last URL.
    /// The next login starts from a cold state.
    pub fn reset(&mut self) {
        tracing::debug!("discarding session cookies and last URL");
        self.jar.clear();
        self.last_url = None;
    }
}
