// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Resource URL classification

use lazy_static::lazy_static;
use regex::Regex;
use url::{Origin, Url};

use crate::policy::{directives, SELF};

lazy_static! {
    /// `scheme://...` or protocol-relative `//...`
    static ref ABSOLUTE_URL: Regex = Regex::new(r"(?i)^(?:[a-z][a-z0-9+.\-]*:)?//").unwrap();
    /// Any other `scheme:` prefix (`javascript:`, `mailto:`, ...)
    static ref OTHER_SCHEME: Regex = Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*:").unwrap();
}

/// How a raw reference string is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `https://host/path` or `//host/path`
    Absolute,
    /// `path/file.js`, `/file.js`, `../file.js`
    Relative,
    /// `data:` URI
    Data,
    /// `blob:` URI
    Blob,
    /// Empty, fragment-only or non-fetchable scheme
    Ignored,
}

impl ResourceKind {
    /// Classify a raw reference
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return ResourceKind::Ignored;
        }

        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("data:") {
            ResourceKind::Data
        } else if lower.starts_with("blob:") {
            ResourceKind::Blob
        } else if ABSOLUTE_URL.is_match(raw) {
            ResourceKind::Absolute
        } else if OTHER_SCHEME.is_match(raw) {
            ResourceKind::Ignored
        } else {
            ResourceKind::Relative
        }
    }
}

/// A reference found in markup or script, resolved against a base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Text as it appeared in the source
    pub raw: String,
    /// Classification of `raw`
    pub kind: ResourceKind,
    /// Resolved URL for absolute and relative references
    pub url: Option<Url>,
    /// Directive this reference feeds
    pub directive: &'static str,
}

impl ResourceRef {
    /// Classify and resolve `raw` against `base`
    pub fn resolve(raw: &str, base: &Url, directive: &'static str) -> Self {
        let kind = ResourceKind::classify(raw);
        let url = match kind {
            ResourceKind::Absolute | ResourceKind::Relative => base.join(raw.trim()).ok(),
            _ => None,
        };

        Self {
            raw: raw.to_string(),
            kind,
            url,
            directive,
        }
    }

    /// Source expression to register for this reference
    ///
    /// Same-origin URLs map to `'self'`; other URLs to their origin.
    pub fn source_expression(&self, page_origin: &Origin) -> Option<String> {
        match self.kind {
            ResourceKind::Data => Some("data:".to_string()),
            ResourceKind::Blob => Some("blob:".to_string()),
            ResourceKind::Ignored => None,
            ResourceKind::Absolute | ResourceKind::Relative => {
                let url = self.url.as_ref()?;
                origin_source(url, page_origin)
            }
        }
    }

    /// Check if the resolved URL shares the page origin
    pub fn is_same_origin(&self, page_origin: &Origin) -> bool {
        self.url
            .as_ref()
            .map(|u| u.origin() == *page_origin)
            .unwrap_or(false)
    }
}

/// `'self'` for same-origin URLs, the serialized origin otherwise
pub fn origin_source(url: &Url, page_origin: &Origin) -> Option<String> {
    let origin = url.origin();
    if origin == *page_origin {
        return Some(SELF.to_string());
    }
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

/// Guess the directive for a URL found inside a script, by file extension
pub fn directive_for_url(url: &Url) -> &'static str {
    let path = url.path().to_ascii_lowercase();
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match ext {
        "js" | "mjs" | "cjs" | "jsx" | "ts" => directives::SCRIPT_SRC,
        "css" => directives::STYLE_SRC,
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" | "bmp" => {
            directives::IMG_SRC
        }
        "woff" | "woff2" | "ttf" | "otf" | "eot" => directives::FONT_SRC,
        "mp4" | "webm" | "ogg" | "mp3" | "wav" | "m4a" | "mov" | "m3u8" => directives::MEDIA_SRC,
        _ => directives::CONNECT_SRC,
    }
}

/// Normalized key for the visited set
pub fn visit_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/blog/post.html").unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(ResourceKind::classify("https://cdn.example.com/a.js"), ResourceKind::Absolute);
        assert_eq!(ResourceKind::classify("//cdn.example.com/a.js"), ResourceKind::Absolute);
        assert_eq!(ResourceKind::classify("HTTP://CDN.example.com"), ResourceKind::Absolute);
        assert_eq!(ResourceKind::classify("/static/a.js"), ResourceKind::Relative);
        assert_eq!(ResourceKind::classify("a.js"), ResourceKind::Relative);
        assert_eq!(ResourceKind::classify("data:image/png;base64,AAAA"), ResourceKind::Data);
        assert_eq!(ResourceKind::classify("blob:https://example.com/uuid"), ResourceKind::Blob);
        assert_eq!(ResourceKind::classify("javascript:void(0)"), ResourceKind::Ignored);
        assert_eq!(ResourceKind::classify("mailto:a@b.c"), ResourceKind::Ignored);
        assert_eq!(ResourceKind::classify("#top"), ResourceKind::Ignored);
        assert_eq!(ResourceKind::classify("  "), ResourceKind::Ignored);
    }

    #[test]
    fn test_resolve_relative() {
        let r = ResourceRef::resolve("../img/a.png", &page(), directives::IMG_SRC);
        assert_eq!(r.url.as_ref().unwrap().as_str(), "https://example.com/img/a.png");
        assert!(r.is_same_origin(&page().origin()));
        assert_eq!(r.source_expression(&page().origin()).unwrap(), "'self'");
    }

    #[test]
    fn test_resolve_cross_origin() {
        let r = ResourceRef::resolve("https://cdn.example.com:8443/a.png?v=1", &page(), directives::IMG_SRC);
        assert!(!r.is_same_origin(&page().origin()));
        assert_eq!(
            r.source_expression(&page().origin()).unwrap(),
            "https://cdn.example.com:8443"
        );
    }

    #[test]
    fn test_protocol_relative_takes_page_scheme() {
        let r = ResourceRef::resolve("//fonts.example.net/f.woff2", &page(), directives::FONT_SRC);
        assert_eq!(
            r.source_expression(&page().origin()).unwrap(),
            "https://fonts.example.net"
        );
    }

    #[test]
    fn test_scheme_sources() {
        let origin = page().origin();
        let data = ResourceRef::resolve("data:image/gif;base64,R0lG", &page(), directives::IMG_SRC);
        assert_eq!(data.source_expression(&origin).unwrap(), "data:");
        assert!(data.url.is_none());

        let ignored = ResourceRef::resolve("javascript:alert(1)", &page(), directives::IMG_SRC);
        assert!(ignored.source_expression(&origin).is_none());
    }

    #[test]
    fn test_directive_for_url() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(directive_for_url(&url("https://a.example/x/app.min.js")), "script-src");
        assert_eq!(directive_for_url(&url("https://a.example/site.css")), "style-src");
        assert_eq!(directive_for_url(&url("https://a.example/logo.SVG")), "img-src");
        assert_eq!(directive_for_url(&url("https://a.example/f.woff2")), "font-src");
        assert_eq!(directive_for_url(&url("https://a.example/clip.mp4")), "media-src");
        assert_eq!(directive_for_url(&url("https://api.example/v1/users")), "connect-src");
    }

    #[test]
    fn test_visit_key_drops_fragment() {
        let a = Url::parse("https://example.com/a.js#one").unwrap();
        let b = Url::parse("https://example.com/a.js#two").unwrap();
        assert_eq!(visit_key(&a), visit_key(&b));
    }
}
