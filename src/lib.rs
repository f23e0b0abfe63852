// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # cspinject - Content-Security-Policy generator
//!
//! Computes a Content-Security-Policy for a server-rendered HTML page from
//! its markup and the scripts it loads, then emits it as a response header
//! or as a `<meta>` element.
//!
//! ## How it works
//!
//! - Pass 1 walks the document in order. Each element feeds the directive
//!   store: resource attributes register origins, inline `<script>` and
//!   `<style>` get a nonce or a hash, and an existing policy meta tag is
//!   merged.
//! - External scripts are fetched and scanned for URLs, `data:`/`blob:`
//!   URIs and worker registrations, recursively and with bounded fan-out.
//! - A drain barrier waits for every scan before the policy is sealed.
//! - Pass 2 emits the sealed policy.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cspinject::{CspConfig, CspInjector, InjectionMethod};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CspConfig::new().injection_method(InjectionMethod::Headers);
//!     let injector = CspInjector::new(config)?;
//!
//!     let url = Url::parse("https://example.com/")?;
//!     let page = injector
//!         .inject(&url, r#"<img src="https://cdn.example.com/logo.png">"#)
//!         .await;
//!
//!     if let Some(header) = &page.header {
//!         println!("Content-Security-Policy: {}", header);
//!     }
//!     Ok(())
//! }
//! ```

pub mod dom;
pub mod error;
pub mod http;
pub mod inject;
pub mod policy;
pub mod scan;

// Re-exports for convenience

// Injection
pub use inject::{CspInjector, InjectedPage};

// Policy model and configuration
pub use policy::{
    CspConfig, DirectiveStore, HashAlgorithm, InjectionMethod, InlineMethod, Policy,
    SharedStore, SourceExpression,
};

// Scanning
pub use scan::{DrainReport, InlineRecord, JsFindings, ResourceKind, ScriptScanner};

// Rewriter
pub use dom::{ElementRef, Rewriter};

// Errors
pub use error::{Error, ErrorContext, Result};

// HTTP
pub use http::{Fetcher, HttpClient, Response, StaticFetcher};

/// cspinject version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
