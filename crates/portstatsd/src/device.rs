//! HTTP client for the switch status page
//!
//! The firmware authenticates every request statelessly: an `admin` cookie
//! holding the session digest plus an urlencoded login form. The form is sent
//! as the body of a GET, which the device requires; do not turn it into a POST.

use crate::auth::session_digest;
use crate::config::PortstatsConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::COOKIE;
use std::time::Duration;
use tracing::debug;

/// Status page path and query
pub const STATS_PATH: &str = "/port.cgi?page=stats";

/// Name of the session cookie expected by the device
pub const SESSION_COOKIE: &str = "admin";

/// Source of raw status page documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortStatsSource: Send + Sync {
    /// Fetch the status page once
    async fn fetch(&self) -> Result<String>;
}

/// Device client for one switch, reused across scrapes
pub struct DeviceClient {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
    digest: String,
}

impl DeviceClient {
    /// Create a client for `address` with an overall request timeout
    pub fn new(
        address: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("http://{}{}", address, STATS_PATH),
            username: username.to_string(),
            password: password.to_string(),
            digest: session_digest(username, password),
        })
    }

    /// Create a client from validated configuration
    pub fn from_config(config: &PortstatsConfig) -> Result<Self> {
        Self::new(
            &config.address,
            &config.username,
            &config.password,
            config.timeout(),
        )
    }

    /// Full status page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Login form fields in the order the device firmware emits them
    fn form_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("Response", self.digest.as_str()),
            ("language", "EN"),
            ("password", self.password.as_str()),
            ("username", self.username.as_str()),
        ]
    }
}

#[async_trait]
impl PortStatsSource for DeviceClient {
    async fn fetch(&self) -> Result<String> {
        debug!(url = %self.url, "portstatsd: Fetching port statistics");

        // form() also sets Content-Type: application/x-www-form-urlencoded
        let response = self
            .client
            .get(&self.url)
            .header(COOKIE, format!("{}={}", SESSION_COOKIE, self.digest))
            .form(&self.form_fields())
            .send()
            .await?;

        debug!(status = %response.status(), "portstatsd: Device responded");

        Ok(response.text().await?)
    }
}
