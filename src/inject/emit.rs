// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Policy emission (pass 2)

use crate::dom::Rewriter;
use crate::error::{Error, Result};
use crate::policy::{InjectionMethod, Policy, CSP_HEADER};

/// Body and header produced for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    /// Document to serve
    pub body: String,
    /// `Content-Security-Policy` header value, in header mode
    pub header: Option<String>,
}

/// Emit `policy` for a pass-1 body
pub fn emit(method: InjectionMethod, body: &str, policy: &Policy) -> Result<Emitted> {
    match method {
        InjectionMethod::Headers => Ok(Emitted {
            body: body.to_string(),
            header: Some(policy.header_value()),
        }),
        InjectionMethod::MetaTags => Ok(Emitted {
            body: insert_meta_tag(body, policy)?,
            header: None,
        }),
    }
}

/// Insert `<meta http-equiv="Content-Security-Policy">` as the first child
/// of `head`
///
/// Exactly one element is inserted even if the document has several `head`
/// elements.
pub fn insert_meta_tag(html: &str, policy: &Policy) -> Result<String> {
    let content = policy.header_value();
    let mut inserted = 0usize;

    let body = {
        let mut rewriter = Rewriter::new().on("head", |head| {
            if inserted == 0 {
                head.prepend_element(
                    "meta",
                    &[("http-equiv", CSP_HEADER), ("content", content.as_str())],
                );
            }
            inserted += 1;
            Ok(())
        })?;
        rewriter.transform(html)?
    };

    if inserted == 0 {
        return Err(Error::html("document has no head element"));
    }
    tracing::debug!(policy = %content, "Inserted policy meta element");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DirectiveStore;

    fn policy() -> Policy {
        let mut store = DirectiveStore::for_page();
        store.add_directive("img-src", "https://cdn.example.com");
        Policy::from(store)
    }

    #[test]
    fn test_header_mode() {
        let emitted = emit(InjectionMethod::Headers, "<p>x</p>", &policy()).unwrap();
        assert_eq!(emitted.body, "<p>x</p>");
        assert_eq!(
            emitted.header.as_deref(),
            Some("default-src 'self'; img-src 'self' https://cdn.example.com; ")
        );
    }

    #[test]
    fn test_meta_is_first_child_of_head() {
        let html = "<!DOCTYPE html><html><head><title>t</title></head><body></body></html>";
        let emitted = emit(InjectionMethod::MetaTags, html, &policy()).unwrap();

        assert!(emitted.header.is_none());
        assert!(emitted.body.contains(
            "<head><meta http-equiv=\"Content-Security-Policy\" content=\"default-src 'self'; img-src 'self' https://cdn.example.com; \"><title>"
        ));
    }

    #[test]
    fn test_meta_inserted_once() {
        // The parser synthesizes a head; stray head tags in body are dropped
        let html = "<p>no head</p><head></head>";
        let out = insert_meta_tag(html, &policy()).unwrap();
        assert_eq!(out.matches("Content-Security-Policy").count(), 1);
    }
}
