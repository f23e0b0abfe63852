// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Policy injection

pub mod emit;
pub mod injector;

pub use emit::{emit, insert_meta_tag, Emitted};
pub use injector::{CspInjector, InjectedPage};
