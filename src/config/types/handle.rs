//! The loaded config, readable from any thread.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

use crate::config::WeftConfig;

static CURRENT: LazyLock<ArcSwap<WeftConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(WeftConfig::default()));

/// Snapshot of the current config; defaults until [`init_config`] runs.
pub fn cfg() -> Arc<WeftConfig> {
    CURRENT.load_full()
}

pub fn init_config(config: WeftConfig) -> Arc<WeftConfig> {
    let config = Arc::new(config);
    CURRENT.store(Arc::clone(&config));
    config
}
