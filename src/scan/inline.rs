// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Inline script/style tokens

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::policy::{directives, HashAlgorithm, InlineMethod, SourceExpression};

/// Random bytes per nonce; base64 gives 24 characters
const NONCE_BYTES: usize = 16;

/// Category of inline content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKind {
    Script,
    Style,
}

impl InlineKind {
    /// Directive the token is registered under
    pub fn directive(&self) -> &'static str {
        match self {
            InlineKind::Script => directives::SCRIPT_SRC,
            InlineKind::Style => directives::STYLE_SRC,
        }
    }
}

/// Token computed for one inline element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineToken {
    /// Script or style
    pub kind: InlineKind,
    /// Method used
    pub method: InlineMethod,
    /// Source expression for the directive
    pub expression: SourceExpression,
}

impl InlineToken {
    /// Compute the token for `text`, the exact served content
    pub fn compute(kind: InlineKind, text: &str, method: InlineMethod) -> Self {
        let expression = match method {
            InlineMethod::Nonce => SourceExpression::nonce(generate_nonce()),
            InlineMethod::Hash(algorithm) => {
                SourceExpression::hash(algorithm.name(), hash_content(text.as_bytes(), algorithm))
            }
        };

        Self {
            kind,
            method,
            expression,
        }
    }

    /// Value for the element's `nonce` attribute, if any
    pub fn nonce_attribute(&self) -> Option<&str> {
        match self.expression {
            SourceExpression::Nonce(ref value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Directive value, e.g. `'sha256-...'`
    pub fn source(&self) -> String {
        self.expression.to_string()
    }
}

/// What was measured and what was registered for one inline element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRecord {
    /// Token registered in the policy
    pub token: InlineToken,
    /// Text that was hashed; identical to what is served
    pub content: String,
}

/// Fresh nonce from the thread-local CSPRNG
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Base64 digest of `content`
pub fn hash_content(content: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => STANDARD.encode(Sha256::digest(content)),
        HashAlgorithm::Sha384 => STANDARD.encode(Sha384::digest(content)),
        HashAlgorithm::Sha512 => STANDARD.encode(Sha512::digest(content)),
    }
}
