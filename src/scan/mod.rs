// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Resource discovery
//!
//! The markup pass in [`markup`] classifies each element and feeds the
//! directive store; [`js`] follows script references; [`inline`] computes
//! nonces and hashes for inline content.

pub mod classify;
pub mod inline;
pub mod js;
pub mod markup;

pub use classify::{directive_for_url, origin_source, ResourceKind, ResourceRef};
pub use inline::{generate_nonce, hash_content, InlineKind, InlineRecord, InlineToken};
pub use js::{JsFindings, ScriptScanner};
pub use markup::{run_scan_pass, DrainReport, ElementKind, ScanContext, ScanOutcome, ScanPass};
