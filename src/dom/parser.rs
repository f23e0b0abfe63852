// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTML parsing and serialization using html5ever

use std::io;

use html5ever::parse_document;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::{Error, Result};

/// Parse HTML string into an html5ever DOM
pub fn parse_html(html: &str) -> Result<RcDom> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: false,
            ..Default::default()
        },
        ..Default::default()
    };

    let dom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())?;

    Ok(dom)
}

/// Children of a node as the document presents them
///
/// A `template` keeps its parsed contents in a separate fragment rather than
/// as children.
pub(crate) fn content_children(handle: &Handle) -> Vec<Handle> {
    if let NodeData::Element {
        ref template_contents,
        ..
    } = handle.data
    {
        if let Some(fragment) = template_contents.borrow().as_ref() {
            return fragment.children.borrow().clone();
        }
    }
    handle.children.borrow().clone()
}

enum WriteOp {
    Open(Handle),
    Close(QualName),
}

/// Writes the children of a document node, template contents included
struct DocumentWriter<'a>(&'a Handle);

impl Serialize for DocumentWriter<'_> {
    fn serialize<S: Serializer>(&self, serializer: &mut S, _: TraversalScope) -> io::Result<()> {
        let mut ops: Vec<WriteOp> = content_children(self.0)
            .into_iter()
            .rev()
            .map(WriteOp::Open)
            .collect();

        while let Some(op) = ops.pop() {
            let handle = match op {
                WriteOp::Close(name) => {
                    serializer.end_elem(name)?;
                    continue;
                }
                WriteOp::Open(handle) => handle,
            };
            match handle.data {
                NodeData::Element {
                    ref name,
                    ref attrs,
                    ..
                } => {
                    serializer.start_elem(
                        name.clone(),
                        attrs.borrow().iter().map(|a| (&a.name, &a.value[..])),
                    )?;
                    ops.push(WriteOp::Close(name.clone()));
                    ops.extend(content_children(&handle).into_iter().rev().map(WriteOp::Open));
                }
                NodeData::Doctype { ref name, .. } => serializer.write_doctype(name)?,
                NodeData::Text { ref contents } => serializer.write_text(&contents.borrow())?,
                NodeData::Comment { ref contents } => serializer.write_comment(contents)?,
                NodeData::ProcessingInstruction {
                    ref target,
                    ref contents,
                } => serializer.write_processing_instruction(target, contents)?,
                NodeData::Document => {
                    ops.extend(content_children(&handle).into_iter().rev().map(WriteOp::Open))
                }
            }
        }
        Ok(())
    }
}

/// Serialize a parsed document back to HTML
///
/// Text inside raw-text elements (`script`, `style`) is written verbatim,
/// which is what keeps inline hashes valid after a rewrite.
pub fn serialize_document(dom: &RcDom) -> Result<String> {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut out, &DocumentWriter(&dom.document), opts)?;

    String::from_utf8(out).map_err(|e| Error::html(format!("serialized output is not UTF-8: {}", e)))
}
