// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Source expressions and well-known directive names

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `'self'` keyword
pub const SELF: &str = "'self'";

/// The `'none'` keyword
pub const NONE: &str = "'none'";

/// Name of the policy header, also used as the meta `http-equiv` value
pub const CSP_HEADER: &str = "Content-Security-Policy";

/// Directive names emitted by the scanner
pub mod directives {
    pub const DEFAULT_SRC: &str = "default-src";
    pub const SCRIPT_SRC: &str = "script-src";
    pub const STYLE_SRC: &str = "style-src";
    pub const IMG_SRC: &str = "img-src";
    pub const FONT_SRC: &str = "font-src";
    pub const CONNECT_SRC: &str = "connect-src";
    pub const MEDIA_SRC: &str = "media-src";
    pub const OBJECT_SRC: &str = "object-src";
    pub const FRAME_SRC: &str = "frame-src";
    pub const WORKER_SRC: &str = "worker-src";
    pub const MANIFEST_SRC: &str = "manifest-src";
    pub const FORM_ACTION: &str = "form-action";
    pub const BASE_URI: &str = "base-uri";
    pub const NAVIGATE_TO: &str = "navigate-to";
}

/// A single token permitted by a directive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceExpression {
    /// Quoted keyword such as `'self'`, `'none'` or `'unsafe-inline'`
    Keyword(String),
    /// `'nonce-<value>'`
    Nonce(String),
    /// `'<algo>-<base64>'`
    Hash { algorithm: String, digest: String },
    /// Scheme source such as `data:` or `blob:`
    Scheme(String),
    /// Host or origin such as `https://cdn.example.com`
    Host(String),
}

impl SourceExpression {
    /// Classify a raw token
    ///
    /// Quoted keywords and hash algorithm names are matched case-insensitively;
    /// nonce and digest values keep their case.
    pub fn classify(raw: &str) -> Self {
        if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            let lower = inner.to_ascii_lowercase();
            if lower.starts_with("nonce-") {
                return SourceExpression::Nonce(inner["nonce-".len()..].to_string());
            }
            for algorithm in ["sha256", "sha384", "sha512"] {
                let prefix_len = algorithm.len() + 1;
                if lower.starts_with(algorithm) && lower[algorithm.len()..].starts_with('-') {
                    return SourceExpression::Hash {
                        algorithm: algorithm.to_string(),
                        digest: inner[prefix_len..].to_string(),
                    };
                }
            }
            return SourceExpression::Keyword(lower);
        }

        // `https:` and `data:` are schemes, `https://x` is a host
        if raw.ends_with(':') && !raw.contains('/') {
            return SourceExpression::Scheme(raw.trim_end_matches(':').to_string());
        }

        SourceExpression::Host(raw.to_string())
    }

    /// Build a nonce expression
    pub fn nonce(value: impl Into<String>) -> Self {
        SourceExpression::Nonce(value.into())
    }

    /// Build a hash expression
    pub fn hash(algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        SourceExpression::Hash {
            algorithm: algorithm.into(),
            digest: digest.into(),
        }
    }

    /// Whether this expression is `'none'`
    pub fn is_none(&self) -> bool {
        matches!(self, SourceExpression::Keyword(k) if k == "none")
    }

    /// Whether this expression is `'self'`
    pub fn is_self(&self) -> bool {
        matches!(self, SourceExpression::Keyword(k) if k == "self")
    }
}

impl fmt::Display for SourceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceExpression::Keyword(k) => write!(f, "'{}'", k),
            SourceExpression::Nonce(n) => write!(f, "'nonce-{}'", n),
            SourceExpression::Hash { algorithm, digest } => write!(f, "'{}-{}'", algorithm, digest),
            SourceExpression::Scheme(s) => write!(f, "{}:", s),
            SourceExpression::Host(h) => f.write_str(h),
        }
    }
}
