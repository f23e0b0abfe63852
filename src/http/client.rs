// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP client implementation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use super::fetcher::Fetcher;
use super::response::Response;
use crate::error::Result;
use crate::policy::{CspConfig, DEFAULT_USER_AGENT};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Default timeout
    pub timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Default headers
    pub default_headers: HeaderMap,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "accept",
            HeaderValue::from_static(
                "text/html,application/javascript,text/javascript;q=0.9,*/*;q=0.8",
            ),
        );
        default_headers.insert(
            "accept-encoding",
            HeaderValue::from_static("gzip, br"),
        );

        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(5),
            max_redirects: 5,
            default_headers,
        }
    }
}

impl HttpClientConfig {
    /// Derive client settings from the injector configuration
    pub fn from_csp_config(config: &CspConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.fetch_timeout_duration(),
            ..Default::default()
        }
    }
}

/// HTTP client used to fetch pages and scripts
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .default_headers(config.default_headers.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// Execute a GET request
    ///
    /// Non-2xx responses are returned as `Ok`; only transport failures are
    /// errors.
    pub async fn get(&self, url: &Url) -> Result<Response> {
        let start = Instant::now();

        let response = self.client.get(url.clone()).send().await?;
        let final_url = response.url().clone();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched resource"
        );

        Ok(Response::new(status, final_url, content_type, body))
    }

    /// Get client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &Url) -> Result<Response> {
        self.get(url).await?.into_success()
    }
}
