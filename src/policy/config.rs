// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Injector configuration

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorContext, Result};

/// Default user agent used when fetching scripts
pub const DEFAULT_USER_AGENT: &str = concat!("cspinject/", env!("CARGO_PKG_VERSION"));

/// Where the finished policy goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InjectionMethod {
    /// `<meta http-equiv="Content-Security-Policy">` inside `head`
    #[serde(rename = "meta-tags")]
    MetaTags,
    /// `Content-Security-Policy` response header
    #[default]
    #[serde(rename = "headers")]
    Headers,
}

impl FromStr for InjectionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "meta-tags" => Ok(InjectionMethod::MetaTags),
            "headers" => Ok(InjectionMethod::Headers),
            other => Err(Error::config(format!("unknown injection method '{}'", other))),
        }
    }
}

impl fmt::Display for InjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InjectionMethod::MetaTags => "meta-tags",
            InjectionMethod::Headers => "headers",
        })
    }
}

/// Digest used for inline content hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Prefix used in the source expression (`'sha256-...'`)
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

/// How inline `<script>` / `<style>` content is authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineMethod {
    /// Random per-element nonce
    Nonce,
    /// Content digest
    Hash(HashAlgorithm),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl Default for InlineMethod {
    fn default() -> Self {
        InlineMethod::Hash(HashAlgorithm::Sha256)
    }
}

impl FromStr for InlineMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nonce" => Ok(InlineMethod::Nonce),
            "sha256" => Ok(InlineMethod::Hash(HashAlgorithm::Sha256)),
            "sha384" => Ok(InlineMethod::Hash(HashAlgorithm::Sha384)),
            "sha512" => Ok(InlineMethod::Hash(HashAlgorithm::Sha512)),
            other => Err(Error::UnsupportedDigestAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for InlineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlineMethod::Nonce => f.write_str("nonce"),
            InlineMethod::Hash(algo) => f.write_str(algo.name()),
        }
    }
}

impl Serialize for InlineMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InlineMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Injector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CspConfig {
    /// Header or meta tag output
    pub injection_method: InjectionMethod,
    /// Nonce or hash for inline content
    pub inline_method: InlineMethod,
    /// Fetch and scan scripts hosted on other origins
    pub scan_external_origins: bool,
    /// Maximum nesting of script -> script discoveries
    pub max_scan_depth: usize,
    /// Maximum number of script fetches per page
    pub max_fetches: usize,
    /// Maximum number of fetches in flight
    pub max_concurrent_fetches: usize,
    /// Upper bound on waiting for all scans of a page
    pub scan_timeout_ms: u64,
    /// Timeout for a single fetch
    pub fetch_timeout_ms: u64,
    /// User agent for script fetches
    pub user_agent: String,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            injection_method: InjectionMethod::Headers,
            inline_method: InlineMethod::default(),
            scan_external_origins: false,
            max_scan_depth: 8,
            max_fetches: 64,
            max_concurrent_fetches: 8,
            scan_timeout_ms: 10_000,
            fetch_timeout_ms: 5_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CspConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output method
    pub fn injection_method(mut self, method: InjectionMethod) -> Self {
        self.injection_method = method;
        self
    }

    /// Set inline method
    pub fn inline_method(mut self, method: InlineMethod) -> Self {
        self.inline_method = method;
        self
    }

    /// Enable/disable cross-origin script scanning
    pub fn scan_external_origins(mut self, enabled: bool) -> Self {
        self.scan_external_origins = enabled;
        self
    }

    /// Set recursion depth cap
    pub fn max_scan_depth(mut self, depth: usize) -> Self {
        self.max_scan_depth = depth;
        self
    }

    /// Set per-page fetch budget
    pub fn max_fetches(mut self, fetches: usize) -> Self {
        self.max_fetches = fetches;
        self
    }

    /// Set fetch concurrency
    pub fn max_concurrent_fetches(mut self, fetches: usize) -> Self {
        self.max_concurrent_fetches = fetches;
        self
    }

    /// Set overall scan timeout
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set single fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Overall scan timeout
    pub fn scan_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// Single fetch timeout
    pub fn fetch_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Per-element nonces in a meta tag
    pub fn strict_nonce() -> Self {
        Self {
            injection_method: InjectionMethod::MetaTags,
            inline_method: InlineMethod::Nonce,
            ..Default::default()
        }
    }

    /// Reject settings that would make scanning impossible
    pub fn validate(&self) -> Result<()> {
        if self.max_scan_depth == 0 {
            return Err(Error::config("max-scan-depth must be greater than 0"));
        }
        if self.max_fetches == 0 {
            return Err(Error::config("max-fetches must be greater than 0"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(Error::config("max-concurrent-fetches must be greater than 0"));
        }
        if self.scan_timeout_ms == 0 {
            return Err(Error::config("scan-timeout-ms must be greater than 0"));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::config("fetch-timeout-ms must be greater than 0"));
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        // Check the digest name first so it fails as its own error kind
        if let Some(method) = value.get("inline-method").and_then(|v| v.as_str()) {
            method.parse::<InlineMethod>()?;
        }

        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).context("reading config file")?;
        Self::from_json_str(&json)
    }
}
