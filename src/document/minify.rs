//! HTML minification on the parsed tree.
//!
//! Comments are removed and whitespace runs collapse to a single space,
//! except inside `pre`, `textarea`, `script` and `style`. Whitespace-only
//! text directly under `html` or `head` is removed.

use markup5ever_rcdom::{Handle, NodeData};

use super::parse::tag_name;

const PRESERVE: &[&str] = &["pre", "textarea", "script", "style"];
const STRIP_BLANK: &[&str] = &["html", "head"];

fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Minify the subtree under `node` in place.
pub fn minify_tree(node: &Handle) {
    let parent_tag = tag_name(node).map(|t| t.to_ascii_lowercase());
    if parent_tag.as_deref().is_some_and(|t| PRESERVE.contains(&t)) {
        return;
    }
    let strip_blank = parent_tag
        .as_deref()
        .is_some_and(|t| STRIP_BLANK.contains(&t));

    node.children.borrow_mut().retain(|child| match &child.data {
        NodeData::Comment { .. } => false,
        NodeData::Text { contents } => {
            let mut contents = contents.borrow_mut();
            if strip_blank && contents.trim_matches(|c: char| c.is_ascii_whitespace()).is_empty() {
                return false;
            }
            let collapsed = collapse(&contents);
            *contents = collapsed.as_str().into();
            true
        }
        _ => true,
    });

    let children = node.children.borrow().clone();
    for child in &children {
        minify_tree(child);
    }
}
