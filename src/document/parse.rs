//! HTML tree for one render.
//!
//! The tree is `Rc`-based and lives only inside a single render call.

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, LocalName, QualName, local_name, namespace_url, ns};
use html5ever::{ParseOpts, parse_document, parse_fragment};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};

/// Whether the source is a whole document rather than a body fragment.
pub fn is_document(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.contains("<!doctype") || lower.contains("<html")
}

/// A parsed HTML document or body fragment, handed to document hooks.
pub struct Page {
    dom: RcDom,
    fragment: bool,
}

impl Page {
    /// Parse as a document when the source has a doctype or `<html>`, else
    /// as a `<body>` fragment.
    pub fn parse(source: &str) -> Self {
        if is_document(source) {
            let dom = parse_document(RcDom::default(), ParseOpts::default()).one(source);
            Self {
                dom,
                fragment: false,
            }
        } else {
            let context = QualName::new(None, ns!(html), local_name!("body"));
            let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, vec![])
                .one(source);
            Self {
                dom,
                fragment: true,
            }
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    /// Node whose children make up the output.
    ///
    /// The document node for documents; the synthetic `<html>` context
    /// element for fragments.
    pub fn root(&self) -> Handle {
        if self.fragment
            && let Some(context) = self.dom.document.children.borrow().first()
        {
            return Rc::clone(context);
        }
        Rc::clone(&self.dom.document)
    }

    pub fn head(&self) -> Option<Handle> {
        self.first_element("head")
    }

    pub fn body(&self) -> Option<Handle> {
        self.first_element("body")
    }

    /// Where injected elements go: `<head>`, or the fragment root.
    pub fn injection_point(&self) -> Handle {
        if self.fragment {
            return self.root();
        }
        self.head().unwrap_or_else(|| self.root())
    }

    fn first_element(&self, tag: &str) -> Option<Handle> {
        if self.fragment {
            return None;
        }
        self.elements(tag).into_iter().next()
    }

    /// Elements with the given tag name, in document order.
    pub fn elements(&self, tag: &str) -> Vec<Handle> {
        let mut found = Vec::new();
        walk(&self.root(), &mut |node| {
            if is_element(node, tag) {
                found.push(Rc::clone(node));
            }
        });
        found
    }

    /// Every element, in document order.
    pub fn all_elements(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        walk(&self.root(), &mut |node| {
            if matches!(node.data, NodeData::Element { .. }) {
                found.push(Rc::clone(node));
            }
        });
        found
    }

    /// Parse `html` as a fragment and append its nodes to `parent`.
    pub fn append_html(&self, parent: &Handle, html: &str) {
        let context = QualName::new(None, ns!(html), local_name!("body"));
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, vec![]).one(html);
        let Some(container) = dom.document.children.borrow().first().cloned() else {
            return;
        };
        let children = std::mem::take(&mut *container.children.borrow_mut());
        for child in children {
            append(parent, child);
        }
    }

    /// Serialize the output nodes.
    pub fn serialize(&self) -> String {
        let mut out = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..SerializeOpts::default()
        };
        let handle = SerializableHandle::from(self.root());
        if serialize(&mut out, &handle, opts).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Depth-first, pre-order traversal.
pub fn walk(node: &Handle, visit: &mut impl FnMut(&Handle)) {
    visit(node);
    for child in node.children.borrow().iter() {
        walk(child, visit);
    }
}

pub fn is_element(node: &Handle, tag: &str) -> bool {
    match &node.data {
        NodeData::Element { name, .. } => name.local.eq_str_ignore_ascii_case(tag),
        _ => false,
    }
}

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn attr(node: &Handle, key: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == key)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn set_attr(node: &Handle, key: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    if let Some(existing) = attrs.iter_mut().find(|a| &*a.name.local == key) {
        existing.value = value.into();
    } else {
        attrs.push(Attribute {
            name: QualName::new(None, ns!(), LocalName::from(key)),
            value: value.into(),
        });
    }
}

/// Create a detached element.
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let attrs = attrs
        .iter()
        .map(|(k, v)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*k)),
            value: (*v).into(),
        })
        .collect();
    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(text.into()),
    })
}

pub fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Concatenated text of a node's descendants.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    walk(node, &mut |n| {
        if let NodeData::Text { contents } = &n.data {
            text.push_str(&contents.borrow());
        }
    });
    text
}
