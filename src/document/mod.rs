//! Document builder.
//!
//! One [`Document`] per HTML entry. Every render re-parses the source
//! wholesale; the parsed tree never outlives the call.
//!
//! ```text
//! read ─> parse ─> discover scripts/styles ─> build styles ─> hooks
//!                                                              │
//!        write <─ serialize <─ inject client | critical + minify
//! ```

mod critical;
mod discover;
mod minify;
mod parse;
mod style;

pub use critical::{UsedNames, critical_css};
pub use discover::ScriptRef;
pub use parse::{Page, attr, create_element, create_text, set_attr};
pub use style::{BuiltStyle, build_style, bundle_style};

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use crate::bundle::Entry;
use crate::bundle::engine::BuildError;
use crate::core::{BuildMode, Resolver};
use crate::embed::serve::{CLIENT_PATH, MODULES_STUB};
use crate::plugin::{DocumentInfo, Plugins};

/// A stylesheet linked from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRef {
    pub id: String,
    pub url: String,
    /// Every file the last bundle read, the stylesheet itself included.
    pub inputs: BTreeSet<String>,
}

/// What a render needs besides the document itself.
pub struct RenderContext<'a> {
    pub resolver: &'a Resolver,
    pub mode: BuildMode,
    pub plugins: &'a Plugins,
}

#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path of the HTML entry.
    pub file: PathBuf,
    pub id: String,
    pub bundle: String,
    pub hmr: bool,
    /// Parsed as a body fragment on the last render.
    pub fragment: bool,
    pub scripts: Vec<ScriptRef>,
    pub styles: Vec<StyleRef>,
}

impl Document {
    pub fn new(entry: &Entry, resolver: &Resolver) -> Self {
        Self {
            id: resolver.path_to_id(&entry.file),
            file: entry.file.clone(),
            bundle: entry.bundle_id().to_string(),
            hmr: entry.hmr,
            fragment: false,
            scripts: Vec::new(),
            styles: Vec::new(),
        }
    }

    /// Ids of the scripts discovered on the last render.
    pub fn script_ids(&self) -> BTreeSet<String> {
        self.scripts.iter().map(|s| s.id.clone()).collect()
    }

    /// Every file read by this document's stylesheets.
    pub fn style_inputs(&self) -> impl Iterator<Item = &String> {
        self.styles.iter().flat_map(|s| s.inputs.iter())
    }

    /// Render the document and write it to its output path.
    ///
    /// Failures of single stylesheets or hooks are collected; the document
    /// is still written.
    pub fn render(&mut self, ctx: &RenderContext<'_>) -> Vec<BuildError> {
        let source = match fs::read_to_string(&self.file) {
            Ok(source) => source,
            Err(e) => {
                return vec![BuildError::new(&self.id, format!("failed to read: {e}"))];
            }
        };

        let page = Page::parse(&source);
        self.fragment = page.is_fragment();
        let found = discover::discover(&page, ctx.resolver, &self.file);
        self.scripts = found.scripts;

        let mut errors = Vec::new();
        let mut css = Vec::new();
        self.styles = found
            .styles
            .into_iter()
            .map(|id| {
                let url = ctx.resolver.output_url(&id);
                match build_style(ctx.resolver, &id, ctx.mode.minify) {
                    Ok(built) => {
                        css.push(built.code);
                        StyleRef { id, url, inputs: built.inputs }
                    }
                    Err(e) => {
                        errors.push(e);
                        let inputs = BTreeSet::from([id.clone()]);
                        StyleRef { id, url, inputs }
                    }
                }
            })
            .collect();

        let info = DocumentInfo {
            id: &self.id,
            bundle: &self.bundle,
            mode: ctx.mode,
            scripts: &self.scripts,
        };
        for hook in ctx.plugins.documents() {
            if let Err(e) = hook.transform(&page, &info) {
                errors.push(BuildError::new(&self.id, format!("{e:#}")));
            }
        }

        if ctx.mode.watch {
            self.inject_client(&page);
        } else {
            if ctx.mode.critical {
                inline_critical(&page, &css);
            }
            if ctx.mode.minify {
                minify::minify_tree(&page.root());
            }
        }

        let out = ctx.resolver.output_path(&self.id);
        if let Err(e) = style::write_output(&out, page.serialize().as_bytes()) {
            errors.push(BuildError::new(&self.id, format!("failed to write: {e}")));
        }
        errors
    }

    /// Rebuild every stylesheet without re-rendering the HTML.
    pub fn rebuild_styles(&mut self, resolver: &Resolver, minify: bool) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for style in &mut self.styles {
            match build_style(resolver, &style.id, minify) {
                Ok(built) => style.inputs = built.inputs,
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    fn inject_client(&self, page: &Page) {
        let target = page.injection_point();
        let script = if self.hmr {
            create_element("script", &[("type", "module"), ("src", CLIENT_PATH)])
        } else {
            let script = create_element("script", &[("type", "module")]);
            parse::append(&script, create_text(MODULES_STUB));
            script
        };
        parse::append(&target, script);
    }
}

fn inline_critical(page: &Page, css: &[String]) {
    if css.is_empty() {
        return;
    }
    let used = UsedNames::collect(page);
    let Some(critical) = critical_css(&css.join("\n"), &used) else {
        return;
    };
    let style = create_element("style", &[]);
    parse::append(&style, create_text(&critical));
    parse::append(&page.injection_point(), style);
}

#[cfg(test)]
mod tests;
