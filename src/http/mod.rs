// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for cspinject
//!
//! Provides the fetch abstraction the script scanner depends on, plus a
//! reqwest-backed client and an in-memory implementation.

mod client;
mod fetcher;
mod response;

pub use client::{HttpClient, HttpClientConfig};
pub use fetcher::{Fetcher, StaticFetcher};
pub use response::Response;
