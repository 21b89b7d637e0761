//! Critical CSS extraction.
//!
//! Keeps the style rules whose selectors can match the document: every
//! `.class` and `#id` a selector names must occur in the markup. Selectors
//! without classes or ids (element, universal, `:root`) are always kept.
//! At-rules other than `@media` pass through untouched.

use std::sync::LazyLock;

use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::traits::ToCss;
use regex::Regex;
use rustc_hash::FxHashSet;

use super::parse::{Page, attr};

static NAME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.#])(-?[_a-zA-Z][_a-zA-Z0-9-]*)").expect("valid regex"));

/// Classes and ids present in a document.
#[derive(Debug, Default)]
pub struct UsedNames {
    classes: FxHashSet<String>,
    ids: FxHashSet<String>,
}

impl UsedNames {
    pub fn collect(page: &Page) -> Self {
        let mut used = Self::default();
        for node in page.all_elements() {
            if let Some(class) = attr(&node, "class") {
                used.classes
                    .extend(class.split_ascii_whitespace().map(str::to_string));
            }
            if let Some(id) = attr(&node, "id") {
                used.ids.insert(id);
            }
        }
        used
    }

    fn matches(&self, selector: &str) -> bool {
        NAME_TOKEN.captures_iter(selector).all(|caps| match &caps[1] {
            "." => self.classes.contains(&caps[2]),
            _ => self.ids.contains(&caps[2]),
        })
    }
}

fn retain_used(rules: &mut CssRuleList<'_>, used: &UsedNames) {
    rules.0.retain_mut(|rule| match rule {
        CssRule::Style(style) => style
            .selectors
            .to_css_string(PrinterOptions::default())
            .map(|text| text.split(',').any(|s| used.matches(s)))
            .unwrap_or(true),
        CssRule::Media(media) => {
            retain_used(&mut media.rules, used);
            !media.rules.0.is_empty()
        }
        _ => true,
    });
}

/// Minified subset of `css` used by the document, or `None` when nothing
/// applies or the stylesheet does not parse.
pub fn critical_css(css: &str, used: &UsedNames) -> Option<String> {
    let mut sheet = StyleSheet::parse(css, ParserOptions::default()).ok()?;
    retain_used(&mut sheet.rules, used);
    if sheet.rules.0.is_empty() {
        return None;
    }
    let code = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?
        .code;
    (!code.trim().is_empty()).then_some(code)
}
