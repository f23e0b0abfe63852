// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Static script scanner
//!
//! Pulls resource references out of script bodies without executing them:
//! - absolute URLs inside string literals
//! - `data:image/...` URIs
//! - `blob:` URIs
//! - service worker and web worker registrations
//!
//! Discovered scripts are fetched and scanned in turn. Recursion is bounded
//! by a visited set, a depth cap and a per-page fetch budget; fetches in
//! flight are limited by a semaphore.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use futures::future::{join_all, BoxFuture, FutureExt};
use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Semaphore;
use url::{Origin, Url};

use super::classify::{directive_for_url, origin_source, visit_key, ResourceKind, ResourceRef};
use crate::http::Fetcher;
use crate::policy::{directives, CspConfig, SharedStore};

lazy_static! {
    // `$` ends a match so template interpolations are not captured
    static ref ABSOLUTE_URL_LITERAL: Regex =
        Regex::new(r#"["'`]((?:[a-zA-Z][a-zA-Z0-9+.\-]*:)?//[^\s"'`<>\\$]+)"#).unwrap();
    static ref DATA_URI: Regex =
        Regex::new(r"(?i)\bdata:(?P<mime>[a-z0-9][\w/\-.+]*)[;,]").unwrap();
    static ref BLOB_URI: Regex = Regex::new(r#"["'`]blob:"#).unwrap();
    static ref SERVICE_WORKER: Regex =
        Regex::new(r#"navigator\.serviceWorker\.register\(\s*["'`]([^"'`]+)["'`]"#).unwrap();
    static ref WEB_WORKER: Regex =
        Regex::new(r#"\bnew\s+(?:Shared)?Worker\(\s*["'`]([^"'`]+)["'`]"#).unwrap();
}

/// Check if a captured URL was cut short by `${` before its host ended
///
/// `https://${host}/x` never matches; `https://api.${tld}/x` captures
/// `https://api.` and is rejected here. `https://api.example/${id}` keeps
/// its origin.
fn interpolated_host(captured: &str, rest: &str) -> bool {
    if !rest.starts_with("${") {
        return false;
    }
    let authority = captured.split_once("//").map(|(_, a)| a).unwrap_or(captured);
    !authority.contains(|c: char| matches!(c, '/' | '?' | '#'))
}

/// References found in one script body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsFindings {
    /// Absolute URLs in string literals, in source order
    pub urls: Vec<String>,
    /// An image `data:` URI appears
    pub image_data_uri: bool,
    /// A `blob:` URI appears
    pub blob_uri: bool,
    /// `navigator.serviceWorker.register(...)` arguments
    pub service_workers: Vec<String>,
    /// `new Worker(...)` / `new SharedWorker(...)` arguments
    pub workers: Vec<String>,
}

impl JsFindings {
    /// Extract references from script source
    pub fn extract(source: &str) -> Self {
        let urls = ABSOLUTE_URL_LITERAL
            .captures_iter(source)
            .filter_map(|c| c.get(1))
            .filter(|m| !interpolated_host(m.as_str(), &source[m.end()..]))
            .map(|m| m.as_str().to_string())
            .collect();

        let image_data_uri = DATA_URI.captures_iter(source).any(|c| {
            c.name("mime")
                .map(|m| m.as_str().to_ascii_lowercase().starts_with("image/"))
                .unwrap_or(false)
        });

        let service_workers = SERVICE_WORKER
            .captures_iter(source)
            .map(|c| c[1].to_string())
            .collect();
        let workers = WEB_WORKER
            .captures_iter(source)
            .map(|c| c[1].to_string())
            .collect();

        Self {
            urls,
            image_data_uri,
            blob_uri: BLOB_URI.is_match(source),
            service_workers,
            workers,
        }
    }

    /// Check if nothing was found
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
            && !self.image_data_uri
            && !self.blob_uri
            && self.service_workers.is_empty()
            && self.workers.is_empty()
    }
}

struct ScannerInner {
    page_url: Url,
    page_origin: Origin,
    store: SharedStore,
    fetcher: Arc<dyn Fetcher>,
    scan_external: bool,
    max_depth: usize,
    max_fetches: usize,
    fetches: AtomicUsize,
    visited: DashSet<String>,
    permits: Semaphore,
}

/// Per-page recursive script scanner
#[derive(Clone)]
pub struct ScriptScanner {
    inner: Arc<ScannerInner>,
}

impl ScriptScanner {
    /// Create a scanner for one page
    pub fn new(page_url: Url, store: SharedStore, fetcher: Arc<dyn Fetcher>, config: &CspConfig) -> Self {
        let page_origin = page_url.origin();
        Self {
            inner: Arc::new(ScannerInner {
                page_url,
                page_origin,
                store,
                fetcher,
                scan_external: config.scan_external_origins,
                max_depth: config.max_scan_depth,
                max_fetches: config.max_fetches,
                fetches: AtomicUsize::new(0),
                visited: DashSet::new(),
                permits: Semaphore::new(config.max_concurrent_fetches),
            }),
        }
    }

    /// Page the scanner resolves against
    pub fn page_url(&self) -> &Url {
        &self.inner.page_url
    }

    /// Whether a script URL may be fetched at all under the origin policy
    pub fn may_fetch(&self, url: &Url) -> bool {
        self.inner.scan_external || url.origin() == self.inner.page_origin
    }

    /// Number of fetches started so far
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst).min(self.inner.max_fetches)
    }

    /// Number of distinct URLs claimed for scanning
    pub fn visited_count(&self) -> usize {
        self.inner.visited.len()
    }

    /// Fetch a script and scan it, following what it references
    ///
    /// Never fails: unreachable or non-2xx scripts are skipped.
    pub fn scan_url(&self, url: Url, depth: usize) -> BoxFuture<'static, ()> {
        let scanner = self.clone();
        async move {
            if !scanner.claim(&url, depth) {
                return;
            }

            let text = {
                let _permit = match scanner.inner.permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                match scanner.inner.fetcher.fetch(&url).await {
                    Ok(response) => response.script_source(),
                    Err(e) => {
                        tracing::debug!(url = %url, error = %e, "Skipping script");
                        return;
                    }
                }
            };

            let children = scanner.register_findings(&text, &url, depth);
            join_all(children).await;
        }
        .boxed()
    }

    /// Register everything `source` references and return the follow-up scans
    ///
    /// `base` is the URL the script was loaded from, or the page URL for
    /// inline scripts. Worker registrations resolve against it.
    pub fn register_findings(
        &self,
        source: &str,
        base: &Url,
        depth: usize,
    ) -> Vec<BoxFuture<'static, ()>> {
        let findings = JsFindings::extract(source);
        if findings.is_empty() {
            return Vec::new();
        }
        let inner = &self.inner;
        let mut children = Vec::new();

        for raw in &findings.urls {
            if ResourceKind::classify(raw) != ResourceKind::Absolute {
                continue;
            }
            let Ok(url) = base.join(raw) else {
                continue;
            };
            let directive = directive_for_url(&url);
            if let Some(expr) = origin_source(&url, &inner.page_origin) {
                tracing::debug!(url = %url, directive, "Script references resource");
                inner.store.add(directive, &expr);
            }
            if directive == directives::SCRIPT_SRC || directive == directives::CONNECT_SRC {
                children.push(self.scan_url(url, depth + 1));
            }
        }

        if findings.image_data_uri {
            inner.store.add(directives::IMG_SRC, "data:");
        }

        if findings.blob_uri {
            inner.store.add(directives::SCRIPT_SRC, "blob:");
            inner.store.add(directives::IMG_SRC, "blob:");
        }

        for raw in findings.service_workers.iter().chain(findings.workers.iter()) {
            let reference = ResourceRef::resolve(raw, base, directives::WORKER_SRC);
            if let Some(expr) = reference.source_expression(&inner.page_origin) {
                tracing::debug!(worker = %raw, source = %expr, "Script registers worker");
                inner.store.add(directives::WORKER_SRC, &expr);
            }
            if let Some(url) = reference.url {
                children.push(self.scan_url(url, depth + 1));
            }
        }

        children
    }

    /// Decide whether `url` gets fetched; marks it visited when it does
    fn claim(&self, url: &Url, depth: usize) -> bool {
        let inner = &self.inner;

        if depth >= inner.max_depth {
            tracing::debug!(url = %url, depth, "Scan depth cap reached");
            return false;
        }
        if !self.may_fetch(url) {
            return false;
        }
        if !inner.visited.insert(visit_key(url)) {
            return false;
        }
        if inner.fetches.fetch_add(1, Ordering::SeqCst) >= inner.max_fetches {
            tracing::warn!(url = %url, max_fetches = inner.max_fetches, "Fetch budget exhausted");
            return false;
        }
        true
    }
}
