//! The full-reload decision.

use std::collections::BTreeSet;

use super::classify::ChangeSet;
use crate::plugin::HmrHook;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reload {
    /// Every client reloads.
    Full,
    /// `(hook index, ids)` per claiming hook, in registration order.
    Partial(Vec<(usize, Vec<String>)>),
}

impl Reload {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Decide between a full reload and per-hook updates.
///
/// 1. a changed page or standalone script reloads;
/// 2. a module read by an HMR-disabled bundle reloads;
/// 3. every other module goes to the first hook that accepts it, and one
///    unclaimed module reloads and drops every claim of the batch.
pub fn decide_reload(changes: &ChangeSet, disabled: &BTreeSet<String>, hooks: &[&dyn HmrHook]) -> Reload {
    if !changes.pages.is_empty() || !changes.scripts.is_empty() {
        return Reload::Full;
    }
    if changes.modules.iter().any(|id| disabled.contains(id)) {
        return Reload::Full;
    }

    let mut claims: Vec<(usize, Vec<String>)> = Vec::new();
    for id in &changes.modules {
        let Some(index) = hooks.iter().position(|hook| hook.accept(id)) else {
            crate::debug!("hmr"; "no hook accepts {}", id);
            return Reload::Full;
        };
        match claims.iter_mut().find(|(i, _)| *i == index) {
            Some((_, ids)) => ids.push(id.clone()),
            None => claims.push((index, vec![id.clone()])),
        }
    }
    claims.sort_by_key(|(index, _)| *index);
    Reload::Partial(claims)
}
