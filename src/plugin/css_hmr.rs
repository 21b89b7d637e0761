//! Stylesheet hot swap.
//!
//! Accepts `.css` modules and bumps a `?v=` query on the page's matching
//! `<link rel="stylesheet">` tags. When no link matches (a changed partial),
//! every same-origin stylesheet is refreshed.

use std::sync::OnceLock;

use serde_json::Value;

use super::{HmrHook, HookFuture, Plugin, SetupContext};
use crate::core::Resolver;
use crate::hmr::Hmr;

const SWAP_LINKS: &str = r#"(() => {
  const links = [...document.querySelectorAll('link[rel~="stylesheet"]')]
    .filter((link) => new URL(link.href).origin === location.origin);
  const matching = links.filter((link) => args.includes(new URL(link.href).pathname));
  const stamp = Date.now();
  for (const link of matching.length ? matching : links) {
    const url = new URL(link.href);
    url.searchParams.set("v", stamp);
    link.href = url.href;
  }
  return matching.length || links.length;
})()"#;

#[derive(Default)]
pub struct CssHmr {
    resolver: OnceLock<Resolver>,
}

impl Plugin for CssHmr {
    fn name(&self) -> &str {
        "css-hmr"
    }

    fn setup(&self, ctx: &SetupContext<'_>) -> anyhow::Result<()> {
        let _ = self.resolver.set(ctx.resolver.clone());
        Ok(())
    }

    fn hmr(&self) -> Option<&dyn HmrHook> {
        Some(self)
    }
}

impl CssHmr {
    fn urls(&self, ids: &[String]) -> Vec<Value> {
        let Some(resolver) = self.resolver.get() else {
            return Vec::new();
        };
        ids.iter()
            .map(|id| Value::String(resolver.output_url(id)))
            .collect()
    }
}

impl HmrHook for CssHmr {
    fn accept(&self, id: &str) -> bool {
        id.rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("css"))
    }

    fn update<'a>(&'a self, hmr: &'a Hmr, ids: &'a [String]) -> HookFuture<'a> {
        Box::pin(async move {
            let urls = self.urls(ids);
            crate::debug!("hmr"; "css swap: {}", ids.join(", "));
            hmr.evaluate_all(SWAP_LINKS, urls).await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_accepts_only_stylesheets() {
        let plugin = CssHmr::default();
        assert!(plugin.accept("src/style.css"));
        assert!(plugin.accept("src/THEME.CSS"));
        assert!(!plugin.accept("src/main.js"));
        assert!(!plugin.accept("src/css"));
    }

    #[test]
    fn test_urls_use_output_locations() {
        let plugin = CssHmr::default();
        plugin
            .resolver
            .set(Resolver::new(Path::new("/p"), Path::new("src"), Path::new("dist")))
            .unwrap();
        assert_eq!(
            plugin.urls(&["src/css/a.css".to_string()]),
            vec![Value::String("/css/a.css".into())]
        );
    }
}
