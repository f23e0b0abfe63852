// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Element-callback rewriter
//!
//! Register handlers against simple selectors, then run a document through
//! them. Every matched element gets one callback per handler, in document
//! order. Handlers can read and change attributes, read text content and
//! insert child elements. The output is the serialized, rewritten document,
//! which can be fed into another `Rewriter` for a second pass.

use std::fmt;

use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData};

use super::parser::{content_children, parse_html, serialize_document};
use crate::error::{Error, Result};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Element selector: a tag name or `*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Matches every element
    Any,
    /// Matches elements with this (lowercase) tag name
    Tag(String),
}

impl Selector {
    /// Parse a selector
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector == "*" {
            return Ok(Selector::Any);
        }
        if selector.is_empty() {
            return Err(Error::selector(selector, "empty selector"));
        }
        if !selector
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(Error::selector(selector, "only tag names and '*' are supported"));
        }
        Ok(Selector::Tag(selector.to_ascii_lowercase()))
    }

    /// Check if an element tag matches
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            Selector::Any => true,
            Selector::Tag(name) => name == tag,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str("*"),
            Selector::Tag(name) => f.write_str(name),
        }
    }
}

/// Handle to the element a callback is visiting
pub struct ElementRef<'a> {
    handle: &'a Handle,
}

impl<'a> ElementRef<'a> {
    fn new(handle: &'a Handle) -> Option<Self> {
        match handle.data {
            NodeData::Element { .. } => Some(Self { handle }),
            _ => None,
        }
    }

    /// Lowercase tag name
    pub fn tag_name(&self) -> &str {
        match self.handle.data {
            NodeData::Element { ref name, .. } => &name.local,
            _ => "",
        }
    }

    /// Get an attribute value
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match self.handle.data {
            NodeData::Element { ref attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|a| &*a.name.local == name)
                .map(|a| a.value.to_string()),
            _ => None,
        }
    }

    /// Check if an attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Set an attribute, replacing any existing value
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if let NodeData::Element { ref attrs, .. } = self.handle.data {
            let mut attrs = attrs.borrow_mut();
            match attrs.iter_mut().find(|a| &*a.name.local == name) {
                Some(attr) => attr.value = StrTendril::from_slice(value),
                None => attrs.push(attribute(name, value)),
            }
        }
    }

    /// Concatenated text of the direct text children
    ///
    /// For `script` and `style` this is exactly what the serializer writes.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for child in self.handle.children.borrow().iter() {
            if let NodeData::Text { ref contents } = child.data {
                text.push_str(&contents.borrow());
            }
        }
        text
    }

    /// Insert a new element as the first child
    pub fn prepend_element(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        let child = new_element(tag, attrs);
        child.parent.set(Some(std::rc::Rc::downgrade(self.handle)));
        self.handle.children.borrow_mut().insert(0, child);
    }
}

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from_slice(value),
    }
}

fn new_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attrs: std::cell::RefCell::new(
            attrs.iter().map(|(name, value)| attribute(name, value)).collect(),
        ),
        template_contents: std::cell::RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Element callback
pub type Handler<'h> = Box<dyn FnMut(&mut ElementRef<'_>) -> Result<()> + 'h>;

/// Selector-dispatching document rewriter
#[derive(Default)]
pub struct Rewriter<'h> {
    handlers: Vec<(Selector, Handler<'h>)>,
}

impl<'h> Rewriter<'h> {
    /// Create a rewriter with no handlers
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler for a selector
    pub fn on<F>(mut self, selector: &str, handler: F) -> Result<Self>
    where
        F: FnMut(&mut ElementRef<'_>) -> Result<()> + 'h,
    {
        let selector = Selector::parse(selector)?;
        self.handlers.push((selector, Box::new(handler)));
        Ok(self)
    }

    /// Run the document through every handler and serialize the result
    pub fn transform(&mut self, html: &str) -> Result<String> {
        let dom = parse_html(html)?;

        // Pre-order walk; children are pushed in reverse so they pop in order.
        // Template contents are walked in place of the template's children.
        let mut stack: Vec<Handle> = vec![dom.document.clone()];
        while let Some(handle) = stack.pop() {
            if let Some(mut element) = ElementRef::new(&handle) {
                for (selector, handler) in self.handlers.iter_mut() {
                    if selector.matches(element.tag_name()) {
                        handler(&mut element)?;
                    }
                }
            }

            stack.extend(content_children(&handle).into_iter().rev());
        }

        serialize_document(&dom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parse() {
        assert_eq!(Selector::parse("*").unwrap(), Selector::Any);
        assert_eq!(Selector::parse("HEAD").unwrap(), Selector::Tag("head".to_string()));
        assert!(Selector::parse("div > p").is_err());
        assert!(Selector::parse("").is_err());
    }

    #[test]
    fn test_document_order() {
        let mut seen = Vec::new();
        {
            let mut rewriter = Rewriter::new()
                .on("*", |el| {
                    seen.push(el.tag_name().to_string());
                    Ok(())
                })
                .unwrap();
            rewriter
                .transform("<html><head><title>t</title></head><body><p><a>x</a></p><img></body></html>")
                .unwrap();
        }
        assert_eq!(seen, ["html", "head", "title", "body", "p", "a", "img"]);
    }

    #[test]
    fn test_template_contents_visited() {
        let mut seen = Vec::new();
        let out = {
            let mut rewriter = Rewriter::new()
                .on("*", |el| {
                    seen.push(el.tag_name().to_string());
                    Ok(())
                })
                .unwrap();
            rewriter
                .transform("<body><template><p>card</p><script>x()</script></template><img></body>")
                .unwrap()
        };
        assert_eq!(seen, ["html", "head", "body", "template", "p", "script", "img"]);
        assert!(out.contains("<template><p>card</p><script>x()</script></template>"));
    }

    #[test]
    fn test_set_attribute() {
        let mut rewriter = Rewriter::new()
            .on("script", |el| {
                el.set_attribute("nonce", "abc");
                Ok(())
            })
            .unwrap();
        let out = rewriter
            .transform("<html><head><script nonce=\"old\">x()</script></head></html>")
            .unwrap();
        assert!(out.contains("<script nonce=\"abc\">x()</script>"));
    }

    #[test]
    fn test_text_content() {
        let mut text = String::new();
        {
            let mut rewriter = Rewriter::new()
                .on("style", |el| {
                    text = el.text_content();
                    Ok(())
                })
                .unwrap();
            rewriter
                .transform("<style>body { margin: 0 }</style>")
                .unwrap();
        }
        assert_eq!(text, "body { margin: 0 }");
    }

    #[test]
    fn test_prepend_element() {
        let mut rewriter = Rewriter::new()
            .on("head", |el| {
                el.prepend_element("meta", &[("name", "x"), ("content", "a \"b\"")]);
                Ok(())
            })
            .unwrap();
        let out = rewriter
            .transform("<html><head><title>t</title></head><body></body></html>")
            .unwrap();
        assert!(out.contains("<head><meta name=\"x\" content=\"a &quot;b&quot;\"><title>"));
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut rewriter = Rewriter::new()
            .on("p", |_| Err(Error::other("boom")))
            .unwrap();
        assert!(rewriter.transform("<p>x</p>").is_err());
    }
}
