// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Policy model
//!
//! - Directive store and merge rules
//! - Source expressions and directive names
//! - Injector configuration

mod config;
mod source;
mod store;

pub use config::{CspConfig, HashAlgorithm, InjectionMethod, InlineMethod, DEFAULT_USER_AGENT};
pub use source::{directives, SourceExpression, CSP_HEADER, NONE, SELF};
pub use store::{DirectiveStore, Policy, SharedStore};
