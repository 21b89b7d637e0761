//! Dev module registry.
//!
//! Maps every module id built in watch mode to its served URL. Keys are
//! case-insensitive. Re-exports (`export { key as name } from "./owner"`)
//! are kept as an explicit table and followed when looked up.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;

use crate::bundle::engine::Metafile;
use crate::core::Resolver;

/// A module id compared without regard to ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleKey(String);

impl ModuleKey {
    pub fn new(id: &str) -> Self {
        Self(id.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReexportError {
    #[error("re-export cycle through `{export}` of `{module}`")]
    Cycle { module: String, export: String },
}

/// `module → export → (owner, key in owner)`.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct ReexportTable {
    entries: BTreeMap<ModuleKey, BTreeMap<String, (ModuleKey, String)>>,
}

impl ReexportTable {
    pub fn insert(&mut self, module: &str, export: &str, owner: &str, key: &str) {
        self.entries
            .entry(ModuleKey::new(module))
            .or_default()
            .insert(export.to_string(), (ModuleKey::new(owner), key.to_string()));
    }

    pub fn remove_module(&mut self, module: &str) {
        self.entries.remove(&ModuleKey::new(module));
    }

    /// Follow re-exports from `(module, export)` to the module that defines
    /// the binding. A name that is not re-exported resolves to itself.
    pub fn resolve(&self, module: &str, export: &str) -> Result<(ModuleKey, String), ReexportError> {
        let mut current = (ModuleKey::new(module), export.to_string());
        let mut seen = BTreeSet::new();
        while let Some(next) = self
            .entries
            .get(&current.0)
            .and_then(|exports| exports.get(&current.1))
        {
            if !seen.insert(current.clone()) {
                return Err(ReexportError::Cycle {
                    module: current.0.0,
                    export: current.1,
                });
            }
            current = next.clone();
        }
        Ok(current)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ModuleEntry {
    id: String,
    url: String,
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<ModuleKey, ModuleEntry>>,
    reexports: RwLock<ReexportTable>,
    /// Modules each bundle contributed on its last build.
    owners: Mutex<BTreeMap<String, BTreeSet<ModuleKey>>>,
}

impl ModuleRegistry {
    /// Replace the modules `owner` contributed with those of `metafile`.
    /// A module dropped by its last owner leaves the registry.
    pub fn update(&self, owner: &str, metafile: &Metafile, resolver: &Resolver) {
        let mut owners = self.owners.lock();
        let mut modules = self.modules.write();
        let mut reexports = self.reexports.write();

        let current: BTreeSet<ModuleKey> =
            metafile.inputs.keys().map(|id| ModuleKey::new(id)).collect();
        let previous = owners
            .insert(owner.to_string(), current.clone())
            .unwrap_or_default();
        for key in previous.difference(&current) {
            if !owners.values().any(|keys| keys.contains(key)) {
                modules.remove(key);
                reexports.remove_module(key.as_str());
            }
        }

        for (id, input) in &metafile.inputs {
            modules.insert(
                ModuleKey::new(id),
                ModuleEntry {
                    id: id.clone(),
                    url: resolver.script_output_url(id),
                },
            );
            reexports.remove_module(id);
            for (export, (source, key)) in &input.reexports {
                reexports.insert(id, export, source, key);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.read().contains_key(&ModuleKey::new(id))
    }

    /// Forget a removed module.
    pub fn remove(&self, id: &str) {
        let key = ModuleKey::new(id);
        for keys in self.owners.lock().values_mut() {
            keys.remove(&key);
        }
        self.modules.write().remove(&key);
        self.reexports.write().remove_module(id);
    }

    /// The defining module id and binding of `export` in `module`.
    pub fn resolve_export(&self, module: &str, export: &str) -> Result<(String, String), ReexportError> {
        let (owner, key) = self.reexports.read().resolve(module, export)?;
        let id = self
            .modules
            .read()
            .get(&owner)
            .map_or_else(|| owner.as_str().to_string(), |m| m.id.clone());
        Ok((id, key))
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `{"modules": {...}, "reexports": {...}}`
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            modules: &'a BTreeMap<ModuleKey, ModuleEntry>,
            reexports: &'a ReexportTable,
        }
        let modules = self.modules.read();
        let reexports = self.reexports.read();
        serde_json::to_string(&Snapshot {
            modules: &modules,
            reexports: &reexports,
        })
        .unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::engine::InputMeta;
    use std::path::Path;

    fn metafile() -> Metafile {
        let mut metafile = Metafile::default();
        let mut main = InputMeta::default();
        main.reexports
            .insert("Button".into(), ("src/ui/index.js".into(), "Button".into()));
        let mut index = InputMeta::default();
        index
            .reexports
            .insert("Button".into(), ("src/ui/Button.js".into(), "default".into()));
        metafile.inputs.insert("src/Main.js".into(), main);
        metafile.inputs.insert("src/ui/index.js".into(), index);
        metafile
            .inputs
            .insert("src/ui/Button.js".into(), InputMeta::default());
        metafile
    }

    fn resolver() -> Resolver {
        Resolver::new(Path::new("/p"), Path::new("src"), Path::new("dist"))
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let registry = ModuleRegistry::default();
        registry.update("bundle default", &metafile(), &resolver());
        assert!(registry.contains("src/main.js"));
        assert!(registry.contains("SRC/MAIN.JS"));
        assert!(!registry.contains("src/other.js"));
        registry.remove("src/MAIN.js");
        assert!(!registry.contains("src/Main.js"));
    }

    #[test]
    fn test_reexport_chain_followed() {
        let registry = ModuleRegistry::default();
        registry.update("bundle default", &metafile(), &resolver());
        assert_eq!(
            registry.resolve_export("src/main.js", "Button").unwrap(),
            ("src/ui/Button.js".to_string(), "default".to_string())
        );
        assert_eq!(
            registry.resolve_export("src/ui/Button.js", "default").unwrap(),
            ("src/ui/Button.js".to_string(), "default".to_string())
        );
    }

    #[test]
    fn test_update_replaces_an_owners_modules() {
        let registry = ModuleRegistry::default();
        registry.update("bundle default", &metafile(), &resolver());
        let mut shared = Metafile::default();
        shared.inputs.insert("src/ui/Button.js".into(), InputMeta::default());
        registry.update("bundle admin", &shared, &resolver());

        let mut trimmed = Metafile::default();
        trimmed.inputs.insert("src/Main.js".into(), InputMeta::default());
        registry.update("bundle default", &trimmed, &resolver());

        assert!(registry.contains("src/main.js"));
        assert!(!registry.contains("src/ui/index.js"));
        // Still imported by the admin bundle.
        assert!(registry.contains("src/ui/Button.js"));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.resolve_export("src/main.js", "Button").unwrap(),
            ("src/Main.js".to_string(), "Button".to_string())
        );
    }

    #[test]
    fn test_reexport_cycle_rejected() {
        let mut table = ReexportTable::default();
        table.insert("a.js", "x", "b.js", "y");
        table.insert("b.js", "y", "a.js", "x");
        assert!(matches!(
            table.resolve("a.js", "x"),
            Err(ReexportError::Cycle { .. })
        ));
    }

    #[test]
    fn test_json_snapshot() {
        let registry = ModuleRegistry::default();
        registry.update("bundle default", &metafile(), &resolver());
        let json: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(json["modules"]["src/main.js"]["id"], "src/Main.js");
        assert_eq!(json["modules"]["src/main.js"]["url"], "/Main.js");
        assert_eq!(json["reexports"]["src/main.js"]["Button"][0], "src/ui/index.js");
    }
}
