// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Markup scan pass
//!
//! Walks the document once, in order. Each element is classified into one
//! [`ElementKind`] and handed to the matching handler, which merges what it
//! finds into the page's directive store. Script fetches are spawned as
//! tasks; [`ScanPass::drain`] is the barrier that waits for them before the
//! policy is sealed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::{Origin, Url};

use super::classify::{ResourceKind, ResourceRef};
use super::inline::{InlineKind, InlineRecord, InlineToken};
use super::js::ScriptScanner;
use crate::dom::{ElementRef, Rewriter};
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::policy::{
    directives, CspConfig, DirectiveStore, InlineMethod, Policy, SharedStore, CSP_HEADER,
};

/// Tags with a dedicated handler; the generic handler skips them
const DEDICATED_TAGS: &[&str] = &["meta", "style", "script", "a"];

/// Category an element is dispatched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `<meta http-equiv="Content-Security-Policy">`
    Meta,
    /// `<style>` with a body
    InlineStyle,
    /// `<script>` without `src`
    InlineScript,
    /// `<script src>`
    ExternalScript,
    /// `<a href>`
    Anchor,
    /// Any other element carrying a resource attribute
    Generic,
}

impl ElementKind {
    /// Every kind, in registration order
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Meta,
        ElementKind::InlineStyle,
        ElementKind::InlineScript,
        ElementKind::ExternalScript,
        ElementKind::Anchor,
        ElementKind::Generic,
    ];

    /// Rewriter selector for this kind
    pub fn selector(&self) -> &'static str {
        match self {
            ElementKind::Meta => "meta",
            ElementKind::InlineStyle => "style",
            ElementKind::InlineScript | ElementKind::ExternalScript => "script",
            ElementKind::Anchor => "a",
            ElementKind::Generic => "*",
        }
    }

    /// Check whether a selected element really belongs to this kind
    pub fn accepts(&self, element: &ElementRef<'_>) -> bool {
        match self {
            ElementKind::InlineScript => !element.has_attribute("src"),
            ElementKind::ExternalScript => element.has_attribute("src"),
            ElementKind::Generic => !DEDICATED_TAGS.contains(&element.tag_name()),
            _ => true,
        }
    }
}

/// Per-request state shared by the handlers of one scan pass
pub struct ScanContext {
    page_url: Url,
    page_origin: Origin,
    inline_method: InlineMethod,
    store: SharedStore,
    scanner: ScriptScanner,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    inline: Mutex<Vec<InlineRecord>>,
}

impl ScanContext {
    /// Create the context for one page
    ///
    /// Must be called from inside a tokio runtime; script scans are spawned
    /// onto it.
    pub fn new(page_url: Url, config: &CspConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::other(format!("scan pass needs a tokio runtime: {}", e)))?;
        let store = SharedStore::new(DirectiveStore::for_page());
        let scanner = ScriptScanner::new(page_url.clone(), store.clone(), fetcher, config);

        Ok(Self {
            page_origin: page_url.origin(),
            page_url,
            inline_method: config.inline_method,
            store,
            scanner,
            runtime,
            tasks: Mutex::new(Vec::new()),
            inline: Mutex::new(Vec::new()),
        })
    }

    /// Page being processed
    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Store the handlers merge into
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Number of scan tasks spawned so far
    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Dispatch one element to its handler
    pub fn handle(&self, kind: ElementKind, element: &mut ElementRef<'_>) -> Result<()> {
        match kind {
            ElementKind::Meta => self.handle_meta(element),
            ElementKind::InlineStyle => self.handle_inline(InlineKind::Style, element),
            ElementKind::InlineScript => self.handle_inline(InlineKind::Script, element),
            ElementKind::ExternalScript => self.handle_external_script(element),
            ElementKind::Anchor => self.handle_anchor(element),
            ElementKind::Generic => self.handle_generic(element),
        }
    }

    /// Merge an existing CSP meta tag
    fn handle_meta(&self, element: &mut ElementRef<'_>) -> Result<()> {
        let is_csp = element
            .get_attribute("http-equiv")
            .map(|v| v.trim().eq_ignore_ascii_case(CSP_HEADER))
            .unwrap_or(false);
        if !is_csp {
            return Ok(());
        }

        let content = element.get_attribute("content").unwrap_or_default();
        let merged = self.store.parse_policy(&content);
        if merged == 0 && !content.trim().is_empty() {
            return Err(Error::MalformedPolicy(content));
        }
        tracing::debug!(directives = merged, "Merged existing policy meta tag");
        Ok(())
    }

    fn handle_inline(&self, kind: InlineKind, element: &mut ElementRef<'_>) -> Result<()> {
        let content = element.text_content();
        if content.is_empty() {
            return Ok(());
        }

        let token = InlineToken::compute(kind, &content, self.inline_method);
        if let Some(nonce) = token.nonce_attribute() {
            element.set_attribute("nonce", nonce);
        }
        self.store.add(kind.directive(), &token.source());

        if kind == InlineKind::Script {
            let children = self.scanner.register_findings(&content, &self.page_url, 0);
            if !children.is_empty() {
                self.spawn(join_all(children).map(|_| ()).boxed());
            }
        }

        self.inline.lock().push(InlineRecord { token, content });
        Ok(())
    }

    fn handle_external_script(&self, element: &mut ElementRef<'_>) -> Result<()> {
        let Some(src) = element.get_attribute("src") else {
            return Ok(());
        };
        let reference = ResourceRef::resolve(&src, &self.page_url, directives::SCRIPT_SRC);
        self.register(&reference);

        if let Some(url) = reference.url {
            if self.scanner.may_fetch(&url) {
                tracing::debug!(url = %url, "Queueing script scan");
                self.spawn(self.scanner.scan_url(url, 0));
            }
        }
        Ok(())
    }

    /// Cross-origin navigation targets
    fn handle_anchor(&self, element: &mut ElementRef<'_>) -> Result<()> {
        let Some(href) = element.get_attribute("href") else {
            return Ok(());
        };
        if ResourceKind::classify(&href) != ResourceKind::Absolute {
            return Ok(());
        }

        let reference = ResourceRef::resolve(&href, &self.page_url, directives::NAVIGATE_TO);
        let navigable = reference
            .url
            .as_ref()
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if navigable && !reference.is_same_origin(&self.page_origin) {
            self.register(&reference);
        }
        Ok(())
    }

    fn handle_generic(&self, element: &mut ElementRef<'_>) -> Result<()> {
        let tag = element.tag_name().to_string();
        match tag.as_str() {
            "img" => {
                self.register_attr(element, "src", directives::IMG_SRC);
                self.register_srcset(element, directives::IMG_SRC);
            }
            "source" => {
                self.register_attr(element, "src", directives::MEDIA_SRC);
                self.register_srcset(element, directives::IMG_SRC);
            }
            "video" => {
                self.register_attr(element, "src", directives::MEDIA_SRC);
                self.register_attr(element, "poster", directives::IMG_SRC);
            }
            "audio" | "track" => self.register_attr(element, "src", directives::MEDIA_SRC),
            "iframe" | "frame" => self.register_attr(element, "src", directives::FRAME_SRC),
            "object" => self.register_attr(element, "data", directives::OBJECT_SRC),
            "embed" => self.register_attr(element, "src", directives::OBJECT_SRC),
            "form" => self.register_attr(element, "action", directives::FORM_ACTION),
            "base" => self.register_attr(element, "href", directives::BASE_URI),
            "input" => {
                let is_image = element
                    .get_attribute("type")
                    .map(|t| t.eq_ignore_ascii_case("image"))
                    .unwrap_or(false);
                if is_image {
                    self.register_attr(element, "src", directives::IMG_SRC);
                }
            }
            "link" => {
                if let Some(directive) = link_directive(element) {
                    self.register_attr(element, "href", directive);
                }
            }
            "noscript" => self.handle_noscript(element)?,
            _ => {}
        }
        Ok(())
    }

    /// `noscript` bodies are raw text while scripting is on, so their
    /// fallback markup is parsed in a detached pass and left untouched
    fn handle_noscript(&self, element: &ElementRef<'_>) -> Result<()> {
        let markup = element.text_content();
        if markup.trim().is_empty() {
            return Ok(());
        }
        let mut rewriter = Rewriter::new().on("*", |inner| {
            if ElementKind::Generic.accepts(inner) {
                self.handle_generic(inner)?;
            }
            Ok(())
        })?;
        rewriter.transform(&markup)?;
        Ok(())
    }

    fn register_attr(&self, element: &ElementRef<'_>, attr: &str, directive: &'static str) {
        if let Some(raw) = element.get_attribute(attr) {
            self.register(&ResourceRef::resolve(&raw, &self.page_url, directive));
        }
    }

    fn register_srcset(&self, element: &ElementRef<'_>, directive: &'static str) {
        let Some(srcset) = element.get_attribute("srcset") else {
            return;
        };
        for candidate in srcset.split(',') {
            if let Some(raw) = candidate.split_whitespace().next() {
                self.register(&ResourceRef::resolve(raw, &self.page_url, directive));
            }
        }
    }

    fn register(&self, reference: &ResourceRef) {
        if let Some(expr) = reference.source_expression(&self.page_origin) {
            self.store.add(reference.directive, &expr);
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        let handle = self.runtime.spawn(task);
        self.tasks.lock().push(handle);
    }
}

/// Directive a `<link>` feeds, from its `rel` (and `as` for preloads)
fn link_directive(element: &ElementRef<'_>) -> Option<&'static str> {
    let rel = element.get_attribute("rel")?.to_ascii_lowercase();
    let rels: Vec<&str> = rel.split_whitespace().collect();

    if rels.contains(&"stylesheet") {
        return Some(directives::STYLE_SRC);
    }
    if rels.contains(&"icon") || rels.contains(&"apple-touch-icon") {
        return Some(directives::IMG_SRC);
    }
    if rels.contains(&"manifest") {
        return Some(directives::MANIFEST_SRC);
    }
    if rels.contains(&"modulepreload") {
        return Some(directives::SCRIPT_SRC);
    }
    if rels.contains(&"preload") {
        let kind = element.get_attribute("as")?.to_ascii_lowercase();
        return match kind.as_str() {
            "script" | "worker" => Some(directives::SCRIPT_SRC),
            "style" => Some(directives::STYLE_SRC),
            "image" => Some(directives::IMG_SRC),
            "font" => Some(directives::FONT_SRC),
            "audio" | "video" | "track" => Some(directives::MEDIA_SRC),
            "fetch" => Some(directives::CONNECT_SRC),
            _ => None,
        };
    }
    None
}

/// Run the markup pass over `html`
///
/// Handler failures are logged and the element is left as it was; only a
/// document that cannot be parsed or serialized fails the pass.
pub fn run_scan_pass(html: &str, context: ScanContext) -> Result<ScanPass> {
    let started = Instant::now();
    let body = {
        let ctx = &context;
        let mut rewriter = Rewriter::new();
        for kind in ElementKind::ALL {
            rewriter = rewriter.on(kind.selector(), move |element| {
                if kind.accepts(element) {
                    if let Err(e) = ctx.handle(kind, element) {
                        tracing::warn!(
                            tag = element.tag_name(),
                            kind = ?kind,
                            error = %e,
                            "Element handler failed"
                        );
                    }
                }
                Ok(())
            })?;
        }
        rewriter.transform(html)?
    };

    tracing::debug!(
        url = %context.page_url,
        tasks = context.pending_tasks(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Markup pass finished"
    );

    Ok(ScanPass { body, context })
}

/// Statistics from draining one page's scan tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks spawned by the markup pass
    pub tasks: usize,
    /// Script fetches started
    pub fetches: usize,
    /// The scan timeout fired and outstanding tasks were cancelled
    pub timed_out: bool,
    /// Time spent waiting
    pub elapsed_ms: u64,
}

/// Result of the markup pass, before its scans are drained
pub struct ScanPass {
    body: String,
    context: ScanContext,
}

/// Everything pass 2 needs
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Rewritten document (nonces applied)
    pub body: String,
    /// Sealed policy
    pub policy: Policy,
    /// Inline elements that were hashed or nonced
    pub inline: Vec<InlineRecord>,
    /// Drain statistics
    pub report: DrainReport,
}

impl ScanPass {
    /// Rewritten document
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Wait for every spawned scan, then seal the policy
    ///
    /// Tasks still running when `timeout` expires are aborted; whatever they
    /// merged before that stays in the policy.
    pub async fn drain(self, timeout: Duration) -> ScanOutcome {
        let ScanPass { body, context } = self;
        let handles = std::mem::take(&mut *context.tasks.lock());
        let tasks = handles.len();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let started = Instant::now();

        let timed_out = match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Scan task failed");
                    }
                }
                false
            }
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                let err = Error::timeout("script scan drain", timeout.as_millis() as u64);
                tracing::warn!(
                    url = %context.page_url,
                    tasks,
                    error = %err,
                    "Sealing partial policy"
                );
                true
            }
        };

        let report = DrainReport {
            tasks,
            fetches: context.scanner.fetch_count(),
            timed_out,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        let policy = context.store.seal();
        let inline = std::mem::take(&mut *context.inline.lock());

        tracing::debug!(
            url = %context.page_url,
            tasks = report.tasks,
            fetches = report.fetches,
            policy = %policy,
            "Scan drained"
        );

        ScanOutcome {
            body,
            policy,
            inline,
            report,
        }
    }
}
