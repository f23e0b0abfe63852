// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Two-pass policy injection
//!
//! Pass 1 runs the markup scan and spawns script scans. The drain waits for
//! every scan (bounded by the scan timeout) and seals the policy. Pass 2
//! emits the sealed policy as a header or a meta element.

use std::sync::Arc;
use std::time::Instant;

use url::Url;

use super::emit::emit;
use crate::error::Result;
use crate::http::{Fetcher, HttpClient, HttpClientConfig};
use crate::policy::{CspConfig, Policy};
use crate::scan::{run_scan_pass, DrainReport, InlineRecord, ScanContext, ScanOutcome};

/// A page ready to serve
#[derive(Debug, Clone)]
pub struct InjectedPage {
    /// Document to serve
    pub body: String,
    /// `Content-Security-Policy` header value, when one must be set
    pub header: Option<String>,
    /// Policy that was emitted
    pub policy: Policy,
    /// Inline elements that were hashed or nonced
    pub inline: Vec<InlineRecord>,
    /// Scan statistics
    pub report: DrainReport,
    /// The engine failed and the minimal policy was served
    pub fallback: bool,
}

impl InjectedPage {
    /// Serve `body` unchanged under `default-src 'self'`
    pub fn fallback(body: String) -> Self {
        let policy = Policy::fallback();
        Self {
            body,
            header: Some(policy.header_value()),
            policy,
            inline: Vec::new(),
            report: DrainReport::default(),
            fallback: true,
        }
    }
}

/// Computes and injects a policy per page
#[derive(Clone)]
pub struct CspInjector {
    config: CspConfig,
    fetcher: Arc<dyn Fetcher>,
}

impl CspInjector {
    /// Create an injector that fetches scripts over HTTP
    pub fn new(config: CspConfig) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::with_config(HttpClientConfig::from_csp_config(&config))?;
        Ok(Self {
            config,
            fetcher: Arc::new(client),
        })
    }

    /// Create an injector with a custom fetcher
    pub fn with_fetcher(config: CspConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, fetcher })
    }

    /// Get the configuration
    pub fn config(&self) -> &CspConfig {
        &self.config
    }

    /// Inject a policy into `html`, served at `page_url`
    ///
    /// Never fails. If the engine errors the page is served with
    /// `default-src 'self'` as a header, and the pass-1 body when there is
    /// one.
    pub async fn inject(&self, page_url: &Url, html: &str) -> InjectedPage {
        let outcome = match self.collect(page_url, html).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(url = %page_url, error = %e, "Scan failed; serving fallback policy");
                return InjectedPage::fallback(html.to_string());
            }
        };

        match self.emit(&outcome) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url = %page_url, error = %e, "Emit failed; serving fallback policy");
                InjectedPage::fallback(outcome.body)
            }
        }
    }

    /// Fallible variant of [`inject`](Self::inject)
    pub async fn try_inject(&self, page_url: &Url, html: &str) -> Result<InjectedPage> {
        let outcome = self.collect(page_url, html).await?;
        self.emit(&outcome)
    }

    /// Pass 1 plus the drain barrier
    pub async fn collect(&self, page_url: &Url, html: &str) -> Result<ScanOutcome> {
        let started = Instant::now();
        let context = ScanContext::new(page_url.clone(), &self.config, self.fetcher.clone())?;
        let pass = run_scan_pass(html, context)?;
        let outcome = pass.drain(self.config.scan_timeout_duration()).await;

        tracing::info!(
            url = %page_url,
            directives = outcome.policy.directives().len(),
            inline = outcome.inline.len(),
            fetches = outcome.report.fetches,
            timed_out = outcome.report.timed_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Policy computed"
        );
        Ok(outcome)
    }

    fn emit(&self, outcome: &ScanOutcome) -> Result<InjectedPage> {
        let emitted = emit(self.config.injection_method, &outcome.body, &outcome.policy)?;
        Ok(InjectedPage {
            body: emitted.body,
            header: emitted.header,
            policy: outcome.policy.clone(),
            inline: outcome.inline.clone(),
            report: outcome.report.clone(),
            fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use sha2::{Digest, Sha256};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::StaticFetcher;
    use crate::policy::{InjectionMethod, InlineMethod};

    const PAGE: &str = "https://example.com/index.html";

    fn injector(config: CspConfig, fetcher: &StaticFetcher) -> CspInjector {
        CspInjector::with_fetcher(config, Arc::new(fetcher.clone())).unwrap()
    }

    fn page_url() -> Url {
        Url::parse(PAGE).unwrap()
    }

    #[tokio::test]
    async fn test_inline_script_hash() {
        let html = "<html><head></head><body><script>console.log(1)</script></body></html>";
        let page = injector(CspConfig::default(), &StaticFetcher::new())
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        let expected = format!("'sha256-{}'", STANDARD.encode(Sha256::digest(b"console.log(1)")));
        assert!(page.policy.directives().allows("script-src", &expected));
        assert!(page.header.unwrap().contains(&expected));
        assert!(page.body.contains("<script>console.log(1)</script>"));
        assert!(!page.fallback);
    }

    #[tokio::test]
    async fn test_two_nonces_are_distinct() {
        let html = "<html><head><script>a()</script></head><body><script>b()</script></body></html>";
        let page = injector(CspConfig::strict_nonce(), &StaticFetcher::new())
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        let nonces: Vec<&str> = page
            .inline
            .iter()
            .filter_map(|r| r.token.nonce_attribute())
            .collect();
        assert_eq!(nonces.len(), 2);
        assert_ne!(nonces[0], nonces[1]);
        for nonce in nonces {
            assert!(page.body.contains(&format!("nonce=\"{}\"", nonce)));
            assert!(page
                .policy
                .directives()
                .allows("script-src", &format!("'nonce-{}'", nonce)));
        }
    }

    #[tokio::test]
    async fn test_cross_origin_image() {
        let html = r#"<html><body><img src="https://cdn.example.com/a.png"></body></html>"#;
        let page = injector(CspConfig::default(), &StaticFetcher::new())
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        assert_eq!(
            page.header.as_deref(),
            Some("default-src 'self'; img-src 'self' https://cdn.example.com; ")
        );
    }

    #[tokio::test]
    async fn test_meta_tag_mode() {
        let html = r#"<!DOCTYPE html><html><head><title>t</title></head><body><img src="https://cdn.example.com/a.png"></body></html>"#;
        let config = CspConfig::default().injection_method(InjectionMethod::MetaTags);
        let page = injector(config, &StaticFetcher::new())
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        assert!(page.header.is_none());
        assert_eq!(page.body.matches("http-equiv=\"Content-Security-Policy\"").count(), 1);
        assert!(page.body.contains(
            "<head><meta http-equiv=\"Content-Security-Policy\" content=\"default-src 'self'; img-src 'self' https://cdn.example.com; \">"
        ));
    }

    #[tokio::test]
    async fn test_mutually_referencing_scripts_terminate() {
        let fetcher = StaticFetcher::new()
            .with("https://example.com/a.js", r#"load("https://example.com/b.js")"#)
            .with("https://example.com/b.js", r#"load("https://example.com/a.js")"#);
        let html = r#"<html><head><script src="/a.js"></script><script src="/b.js"></script></head></html>"#;
        let page = injector(CspConfig::default(), &fetcher)
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        assert_eq!(fetcher.hits("https://example.com/a.js"), 1);
        assert_eq!(fetcher.hits("https://example.com/b.js"), 1);
        assert_eq!(page.header.as_deref(), Some("default-src 'self'; script-src 'self'; "));
    }

    #[tokio::test]
    async fn test_existing_meta_merged() {
        let html = r#"<html><head><meta http-equiv="Content-Security-Policy" content="object-src 'none'; img-src https://img.example.net"></head><body><img src="https://cdn.example.com/a.png"></body></html>"#;
        let page = injector(CspConfig::default(), &StaticFetcher::new())
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        assert_eq!(
            page.header.as_deref(),
            Some("default-src 'self'; object-src 'none'; img-src 'self' https://img.example.net https://cdn.example.com; ")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let fetcher = StaticFetcher::new()
            .with_status("https://example.com/broken.js", 404, "")
            .with("https://example.com/ok.js", r#"fetch("https://api.example.net/v1")"#);
        let html = r#"<html><head><script src="/broken.js"></script><script src="/ok.js"></script></head></html>"#;
        let page = injector(CspConfig::default(), &fetcher)
            .try_inject(&page_url(), html)
            .await
            .unwrap();

        assert!(page.policy.directives().allows("connect-src", "https://api.example.net"));
        assert_eq!(fetcher.hits("https://example.com/broken.js"), 1);
        assert!(!page.fallback);
    }

    #[tokio::test]
    async fn test_cross_origin_scripts_not_fetched_by_default() {
        let fetcher = StaticFetcher::new().with(
            "https://cdn.example.org/lib.js",
            r#"fetch("https://api.example.net/v1")"#,
        );
        let html = r#"<script src="https://cdn.example.org/lib.js"></script>"#;

        let page = injector(CspConfig::default(), &fetcher)
            .try_inject(&page_url(), html)
            .await
            .unwrap();
        assert_eq!(fetcher.total_hits(), 0);
        assert!(page.policy.directives().allows("script-src", "https://cdn.example.org"));
        assert!(!page.policy.directives().contains("connect-src"));

        let config = CspConfig::default().scan_external_origins(true);
        let page = injector(config, &fetcher)
            .try_inject(&page_url(), html)
            .await
            .unwrap();
        assert_eq!(fetcher.hits("https://cdn.example.org/lib.js"), 1);
        assert!(page.policy.directives().allows("connect-src", "https://api.example.net"));
    }

    #[tokio::test]
    async fn test_scan_timeout_serves_partial_policy() {
        let fetcher = StaticFetcher::new()
            .with("https://example.com/slow.js", r#"fetch("https://late.example.net/")"#)
            .with_delay(Duration::from_secs(5));
        let html = r#"<html><body><script src="/slow.js"></script><script>go()</script></body></html>"#;
        let config = CspConfig::default().scan_timeout(Duration::from_millis(50));
        let page = injector(config, &fetcher).inject(&page_url(), html).await;

        assert!(page.report.timed_out);
        assert!(!page.fallback);
        assert_eq!(page.inline.len(), 1);
        assert!(!page.header.unwrap().contains("late.example.net"));
    }

    #[test]
    fn test_inject_falls_back_outside_runtime() {
        let html = "<p>hello</p>";
        let injector = injector(CspConfig::default(), &StaticFetcher::new());
        let page = futures::executor::block_on(injector.inject(&page_url(), html));

        assert!(page.fallback);
        assert_eq!(page.body, html);
        assert_eq!(page.header.as_deref(), Some("default-src 'self'; "));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CspConfig::default().max_fetches(0);
        assert!(CspInjector::with_fetcher(config, Arc::new(StaticFetcher::new())).is_err());

        let config = CspConfig::default().inline_method(InlineMethod::Nonce);
        assert!(CspInjector::new(config).is_ok());
    }

    #[tokio::test]
    async fn test_http_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/app.js"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/javascript")
                    .set_body_string(r#"fetch("https://api.example.net/items"); new Worker("/worker.js");"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/worker.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("self.onmessage = () => {}"))
            .mount(&server)
            .await;

        let page_url = Url::parse(&format!("{}/index.html", server.uri())).unwrap();
        let html = r#"<html><head><script src="/static/app.js"></script></head><body></body></html>"#;
        let injector = CspInjector::new(CspConfig::default()).unwrap();
        let page = injector.try_inject(&page_url, html).await.unwrap();

        let directives = page.policy.directives();
        assert!(directives.allows("script-src", "'self'"));
        assert!(directives.allows("connect-src", "https://api.example.net"));
        assert!(directives.allows("worker-src", "'self'"));
        assert_eq!(page.report.fetches, 2);
    }
}
