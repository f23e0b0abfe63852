// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Fetched resource

use bytes::Bytes;
use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};

/// A resource as returned by a [`Fetcher`](super::Fetcher)
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Final URL, after redirects
    pub url: Url,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Raw body
    pub body: Bytes,
}

impl Response {
    /// Create a response
    pub fn new(status: StatusCode, url: Url, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            url,
            content_type,
            body,
        }
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Status code as u16
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Apply the fetch contract: anything but 2xx becomes a fetch error
    pub fn into_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::fetch(self.url.as_str(), Some(self.status_code())))
        }
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::other(format!("{} is not UTF-8: {}", self.url, e)))
    }

    /// Body as script source; invalid UTF-8 is replaced rather than rejected
    pub fn script_source(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Check if the content type is HTML
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode, body: &'static [u8]) -> Response {
        Response::new(
            status,
            Url::parse("https://example.com/app.js").unwrap(),
            Some("text/html; charset=utf-8".to_string()),
            Bytes::from_static(body),
        )
    }

    #[test]
    fn test_into_success() {
        let ok = response(StatusCode::OK, b"x()").into_success().unwrap();
        assert_eq!(ok.text().unwrap(), "x()");

        let err = response(StatusCode::NOT_FOUND, b"").into_success().unwrap_err();
        assert!(err.is_fetch_failure());
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.url(), Some("https://example.com/app.js"));
    }

    #[test]
    fn test_script_source_is_lossy() {
        let resp = response(StatusCode::OK, b"a(\xff)");
        assert!(resp.text().is_err());
        assert_eq!(resp.script_source(), "a(\u{fffd})");
    }

    #[test]
    fn test_is_html() {
        assert!(response(StatusCode::OK, b"").is_html());

        let mut js = response(StatusCode::OK, b"");
        js.content_type = Some("application/javascript".to_string());
        assert!(!js.is_html());

        js.content_type = None;
        assert!(!js.is_html());
    }
}
