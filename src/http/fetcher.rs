// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Fetch abstraction used by the script scanner

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use reqwest::StatusCode;
use url::Url;

use super::response::Response;
use crate::error::{Error, Result};

/// Fetches resources for the scanner
///
/// Implementations return `Err` for transport failures and for non-2xx
/// statuses; the scanner treats both the same way and skips the resource.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL
    async fn fetch(&self, url: &Url) -> Result<Response>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, url: &Url) -> Result<Response> {
        (**self).fetch(url).await
    }
}

/// Serves canned responses from memory
///
/// Useful for pre-built asset bundles and for tests. Unknown URLs answer
/// 404. Fragments are ignored when matching.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    responses: Arc<DashMap<String, (u16, String)>>,
    hits: Arc<DashMap<String, usize>>,
    total: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    /// Create an empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`
    pub fn with(self, url: &str, body: impl Into<String>) -> Self {
        self.with_status(url, 200, body)
    }

    /// Serve `body` with a given status at `url`
    pub fn with_status(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.responses.insert(normalize(url), (status, body.into()));
        self
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches seen for a URL
    pub fn hits(&self, url: &str) -> usize {
        self.hits.get(&normalize(url)).map(|h| *h).unwrap_or(0)
    }

    /// Number of fetches seen overall
    pub fn total_hits(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

fn normalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<Response> {
        let key = normalize(url.as_str());
        *self.hits.entry(key.clone()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let (status, body) = self
            .responses
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or((404, String::new()));

        let status = StatusCode::from_u16(status)
            .map_err(|e| Error::other(format!("invalid canned status: {}", e)))?;

        Response::new(status, url.clone(), None, Bytes::from(body)).into_success()
    }
}
