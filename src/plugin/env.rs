//! Environment variables for client code.
//!
//! `env:public` is a virtual module exporting every `PUBLIC_` key of `.env`
//! and `.env.<mode>` (the latter wins). Both files are registered as related
//! watch files, so editing them invalidates the module. `import.meta.env.MODE`,
//! `.DEV` and `.PROD` are replaced in scripts.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, OnceLock};

use anyhow::Context;
use regex::Regex;

use super::{Plugin, SetupContext};
use crate::bundle::engine::TransformHook;
use crate::vfs::{Loader, VirtualData, VirtualFile};

/// Id of the public env module.
pub const PUBLIC_ID: &str = "env:public";

const PUBLIC_PREFIX: &str = "PUBLIC_";

#[derive(Default)]
pub struct Env {
    meta: OnceLock<Arc<MetaEnv>>,
}

impl Plugin for Env {
    fn name(&self) -> &str {
        "env"
    }

    fn setup(&self, ctx: &SetupContext<'_>) -> anyhow::Result<()> {
        let files = vec![
            ctx.resolver.root().join(".env"),
            ctx.resolver.root().join(format!(".env.{}", ctx.env_mode)),
        ];
        ctx.vfs.set(
            PUBLIC_ID,
            VirtualFile::lazy(move || {
                let vars = load_env_files(&files)?;
                Ok(VirtualData::js(public_module(&vars)).with_watch_files(files.clone()))
            }),
        );
        let _ = self.meta.set(Arc::new(MetaEnv::new(ctx.env_mode, ctx.mode.is_dev())));
        Ok(())
    }

    fn transforms(&self) -> Vec<Arc<dyn TransformHook>> {
        self.meta
            .get()
            .map(|meta| vec![Arc::clone(meta) as Arc<dyn TransformHook>])
            .unwrap_or_default()
    }
}

/// Parse dotenv lines: `KEY=value`, optional `export ` prefix, `#` comments
/// and single or double quotes.
fn parse_env(source: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = match value.chars().next() {
            Some(q @ ('"' | '\'')) if value.len() >= 2 && value.ends_with(q) => {
                value[1..value.len() - 1].to_string()
            }
            _ => value
                .split_once(" #")
                .map_or(value, |(v, _)| v)
                .trim_end()
                .to_string(),
        };
        vars.insert(key.to_string(), value);
    }
    vars
}

/// Merge env files in order; missing files are skipped.
fn load_env_files(files: &[PathBuf]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for file in files {
        if !file.is_file() {
            continue;
        }
        let source = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        vars.extend(parse_env(&source));
    }
    Ok(vars)
}

fn public_module(vars: &BTreeMap<String, String>) -> String {
    let public: BTreeMap<_, _> = vars
        .iter()
        .filter(|(key, _)| key.starts_with(PUBLIC_PREFIX))
        .collect();
    let mut code = String::new();
    for (key, value) in &public {
        if is_identifier(key) {
            code.push_str(&format!(
                "export const {key} = {};\n",
                serde_json::Value::String((*value).clone())
            ));
        }
    }
    code.push_str(&format!(
        "export default {};\n",
        serde_json::to_string(&public).unwrap_or_else(|_| "{}".into())
    ));
    code
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// ASCII word boundaries; the regex build carries no Unicode tables.
static META_ENV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)import\.meta\.env\.(MODE|DEV|PROD)(?-u:\b)").expect("valid regex")
});

/// Replaces `import.meta.env.{MODE,DEV,PROD}` in scripts.
struct MetaEnv {
    mode: String,
    dev: bool,
}

impl MetaEnv {
    fn new(mode: &str, dev: bool) -> Self {
        Self {
            mode: mode.to_string(),
            dev,
        }
    }
}

impl TransformHook for MetaEnv {
    fn loader(&self) -> Loader {
        Loader::Js
    }

    fn transform(&self, _id: &str, code: &str) -> anyhow::Result<Option<String>> {
        if !META_ENV.is_match(code) {
            return Ok(None);
        }
        let replaced = META_ENV.replace_all(code, |caps: &regex::Captures<'_>| {
            match &caps[1] {
                "MODE" => serde_json::Value::String(self.mode.clone()).to_string(),
                "DEV" => self.dev.to_string(),
                _ => (!self.dev).to_string(),
            }
        });
        Ok(Some(replaced.into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildMode, Resolver};
    use crate::related::{ChangeKind, RelatedWatcher};
    use crate::vfs::VirtualFileStore;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_parse_env() {
        let vars = parse_env(
            "# comment\nPUBLIC_A=1\nexport PUBLIC_B=\"two words\"\nSECRET='x'\nPUBLIC_C=3 # note\nbroken\n",
        );
        assert_eq!(vars["PUBLIC_A"], "1");
        assert_eq!(vars["PUBLIC_B"], "two words");
        assert_eq!(vars["SECRET"], "x");
        assert_eq!(vars["PUBLIC_C"], "3");
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_public_module_exports_only_public_keys() {
        let vars = parse_env("PUBLIC_URL=https://x.dev\nSECRET=s\n");
        let code = public_module(&vars);
        assert!(code.contains(r#"export const PUBLIC_URL = "https://x.dev";"#));
        assert!(code.contains(r#"export default {"PUBLIC_URL":"https://x.dev"};"#));
        assert!(!code.contains("SECRET"));
    }

    #[test]
    fn test_virtual_module_follows_env_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "PUBLIC_A=base\n").unwrap();
        fs::write(dir.path().join(".env.development"), "PUBLIC_A=dev\n").unwrap();

        let related = Arc::new(RelatedWatcher::detached());
        let vfs = VirtualFileStore::new(Arc::clone(&related));
        let resolver = Resolver::new(dir.path(), Path::new("src"), Path::new("dist"));
        let plugin = Env::default();
        plugin
            .setup(&SetupContext {
                resolver: &resolver,
                vfs: &vfs,
                mode: BuildMode::DEVELOPMENT,
                env_mode: "development",
            })
            .unwrap();

        let data = vfs.resolve(PUBLIC_ID, None).unwrap();
        assert!(data.code.contains(r#"PUBLIC_A = "dev""#));

        fs::write(dir.path().join(".env.development"), "PUBLIC_A=changed\n").unwrap();
        let related_ids = related.notify_change(
            &dir.path().join(".env.development"),
            ChangeKind::Modified,
        );
        assert_eq!(related_ids, vec![PUBLIC_ID.to_string()]);
        let data = vfs.resolve(PUBLIC_ID, None).unwrap();
        assert!(data.code.contains(r#"PUBLIC_A = "changed""#));
    }

    #[test]
    fn test_meta_env_transform() {
        let hook = MetaEnv::new("production", false);
        let out = hook
            .transform("src/a.js", "if (import.meta.env.DEV) log(import.meta.env.MODE, import.meta.env.PROD)")
            .unwrap()
            .unwrap();
        assert_eq!(out, r#"if (false) log("production", true)"#);
        assert!(hook.transform("src/a.js", "let x = 1").unwrap().is_none());
    }

    #[test]
    fn test_meta_env_needs_word_boundaries() {
        let hook = MetaEnv::new("development", true);
        let code = "reimport.meta.env.DEV; import.meta.env.DEVICE";
        assert!(hook.transform("src/a.js", code).unwrap().is_none());
    }
}
