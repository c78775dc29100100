//! HTTP fetch client for uncooperative storefronts.
//!
//! Every disguised request picks a browser profile, sends that profile's
//! headers, waits a paced delay and runs under a short timeout. Failures come
//! back as [`FetchError`] values; nothing here retries.

use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fingerprint::{BrowserProfile, Pacing, ProfilePool};
use crate::models::LookupMode;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

const API_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Errors from a single fetch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`FetchError::Status`]
    pub fn into_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status(self.status))
        }
    }
}

/// Timeouts, pacing and identities used by [`FetchClient`]
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub isbn_timeout: Duration,
    pub keyword_timeout: Duration,
    pub connect_timeout: Duration,
    pub pacing: Pacing,
    pub profiles: ProfilePool,
}

impl FetchSettings {
    /// Fixed first profile, no pacing; for tests and reproducible runs
    pub fn deterministic() -> Self {
        Self {
            pacing: Pacing::none(),
            profiles: ProfilePool::new(
                super::fingerprint::default_profiles(),
                super::fingerprint::Rotation::Fixed,
                0,
            ),
            ..Self::default()
        }
    }

    /// Keyword fan-out gets the stricter budget
    pub fn timeout_for(&self, mode: LookupMode) -> Duration {
        match mode {
            LookupMode::Exact => self.isbn_timeout,
            LookupMode::Fuzzy => self.keyword_timeout,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            isbn_timeout: Duration::from_secs(15),
            keyword_timeout: Duration::from_secs(6),
            connect_timeout: Duration::from_secs(5),
            pacing: Pacing::new(Duration::from_millis(150), Duration::from_millis(900)),
            profiles: ProfilePool::default(),
        }
    }
}

/// Shared fetch client.
///
/// Cheap to clone; holds no per-request state.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Arc<Client>,
    api: Arc<Client>,
    settings: Arc<FetchSettings>,
}

impl FetchClient {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = base_builder(&settings)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let api = Client::builder()
            .user_agent(API_USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            api: Arc::new(api),
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Disguised GET; any HTTP status is returned as a response
    pub async fn get(
        &self,
        url: &str,
        mode: LookupMode,
        extra_headers: &[(&str, &str)],
    ) -> Result<RawResponse, FetchError> {
        let profile = self.settings.profiles.pick();
        send_disguised(&self.client, &self.settings, profile, url, mode, extra_headers).await
    }

    /// Disguised GET that treats any non-2xx status as a failure
    pub async fn get_page(
        &self,
        url: &str,
        mode: LookupMode,
        extra_headers: &[(&str, &str)],
    ) -> Result<RawResponse, FetchError> {
        self.get(url, mode, extra_headers).await?.into_success()
    }

    /// Plain GET against a public structured API: honest user agent, no pacing
    pub async fn api_get(&self, url: &str, mode: LookupMode) -> Result<RawResponse, FetchError> {
        let started = Instant::now();
        let response = self
            .api
            .get(url)
            .header("Accept", "application/json")
            .timeout(self.settings.timeout_for(mode))
            .send()
            .await?;
        let raw = read_response(response).await?;
        tracing::debug!(
            url,
            status = raw.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "api fetch"
        );
        raw.into_success()
    }

    /// Open a cookie-carrying session pinned to one identity.
    ///
    /// The session lives for one resolution call and is dropped with it.
    pub fn session(&self) -> Result<FetchSession, FetchError> {
        let client = base_builder(&self.settings)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(FetchSession {
            client,
            profile: self.settings.profiles.pick().clone(),
            settings: Arc::clone(&self.settings),
        })
    }
}

/// Short-lived session for sources that need a warm-up request.
///
/// Cookies set by one response are sent on later requests of the same session
/// and nowhere else.
#[derive(Debug)]
pub struct FetchSession {
    client: Client,
    profile: BrowserProfile,
    settings: Arc<FetchSettings>,
}

impl FetchSession {
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    pub async fn get(
        &self,
        url: &str,
        mode: LookupMode,
        extra_headers: &[(&str, &str)],
    ) -> Result<RawResponse, FetchError> {
        send_disguised(&self.client, &self.settings, &self.profile, url, mode, extra_headers)
            .await
    }

    pub async fn get_page(
        &self,
        url: &str,
        mode: LookupMode,
        extra_headers: &[(&str, &str)],
    ) -> Result<RawResponse, FetchError> {
        self.get(url, mode, extra_headers).await?.into_success()
    }
}

fn base_builder(settings: &FetchSettings) -> reqwest::ClientBuilder {
    Client::builder()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .connect_timeout(settings.connect_timeout)
        .pool_idle_timeout(Duration::from_secs(90))
}

async fn send_disguised(
    client: &Client,
    settings: &FetchSettings,
    profile: &BrowserProfile,
    url: &str,
    mode: LookupMode,
    extra_headers: &[(&str, &str)],
) -> Result<RawResponse, FetchError> {
    if !settings.pacing.is_none() {
        tokio::time::sleep(settings.pacing.sample()).await;
    }

    let mut request = client
        .get(url)
        .header("Accept", ACCEPT_HTML)
        .timeout(settings.timeout_for(mode));
    for (name, value) in profile.headers() {
        request = request.header(name, value);
    }
    for (name, value) in extra_headers {
        request = request.header(*name, *value);
    }

    let started = Instant::now();
    let result = match request.send().await {
        Ok(response) => read_response(response).await,
        Err(e) => Err(FetchError::from(e)),
    };

    match &result {
        Ok(raw) => tracing::debug!(
            url,
            profile = %profile.name,
            status = raw.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched"
        ),
        Err(e) => tracing::debug!(url, profile = %profile.name, error = %e, "fetch failed"),
    }
    result
}

async fn read_response(response: reqwest::Response) -> Result<RawResponse, FetchError> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Body(e.to_string())
        }
    })?;
    Ok(RawResponse { status, url, body })
}
