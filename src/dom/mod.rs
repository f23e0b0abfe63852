// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Markup transformation layer
//!
//! An element-callback rewriter built on top of html5ever.

mod parser;
mod rewriter;

pub use parser::{parse_html, serialize_document};
pub use rewriter::{ElementRef, Handler, Rewriter, Selector};
