//! Embedded text with `__NAME__` placeholders filled at render time.

use std::marker::PhantomData;

/// Values substituted into a [`Template`].
pub trait TemplateVars {
    /// `(placeholder, value)` pairs, placeholders spelled as in the source.
    fn pairs(&self) -> Vec<(&'static str, String)>;
}

/// Static source typed by the variables it expects.
pub struct Template<V> {
    source: &'static str,
    vars: PhantomData<fn(&V)>,
}

impl<V> Template<V> {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            vars: PhantomData,
        }
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.pairs()
            .into_iter()
            .fold(self.source.to_string(), |text, (placeholder, value)| {
                text.replace(placeholder, &value)
            })
    }
}
