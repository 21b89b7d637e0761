//! One-shot production build.
//!
//! Build phases:
//! - **Collect** - configured entries plus plugin entries
//! - **Render** - documents in parallel, then every bundle
//! - **Assets** - copy the assets dir into the output dir
//! - **Finalize** - summary line and `BuildEndHook`s

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use jwalk::WalkDir;
use rayon::prelude::*;

use crate::bundle::collect_entries;
use crate::config::WeftConfig;
use crate::logger::{ProgressLine, distinct_errors};
use crate::plugin::{BuildSummary, Plugins};
use crate::related::RelatedWatcher;
use crate::session::{BuildContext, BuildSession};
use crate::utils::plural_count;
use crate::{debug, log};

/// Build the project once and write everything to the output dir.
///
/// Fails when any document, style or bundle failed; the outputs that did
/// build are still written.
pub fn build_project(config: &WeftConfig, plugins: Plugins) -> Result<BuildSummary> {
    let started = Instant::now();
    let resolver = config.resolver();

    let mut entries = collect_entries(config)?;
    entries.extend(plugins.extra_entries(&resolver, config.webext()));
    if entries.is_empty() {
        log!("build"; "no entries matched {}", config.build.entries.join(", "));
    }

    let ctx = BuildContext::new(
        resolver.clone(),
        config.mode(),
        config.env_mode(),
        Arc::new(RelatedWatcher::detached()),
        plugins,
    )?;

    let mut session = BuildSession::new(&entries, &resolver);
    let errors = session.build_all(&ctx);
    session.dispose();

    let assets = copy_assets(&config.assets_dir(), resolver.out_dir())?;
    if assets > 0 {
        debug!("build"; "copied {}", plural_count(assets, "asset"));
    }

    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        for message in distinct_errors(messages.iter().map(String::as_str)) {
            log!("error"; "{}", message);
        }
        bail!("build failed with {}", plural_count(errors.len(), "error"));
    }

    let summary = BuildSummary {
        documents: session.documents.len(),
        bundles: session.bundle_count(),
        styles: session.style_count(),
        elapsed: started.elapsed(),
        out_dir: resolver.out_dir().to_path_buf(),
    };
    log!(
        "build";
        "{}, {}, {} in {:.2?}",
        plural_count(summary.documents, "document"),
        plural_count(summary.bundles, "bundle"),
        plural_count(summary.styles, "style"),
        summary.elapsed
    );

    ctx.plugins.build_end(&summary)?;
    Ok(summary)
}

/// Copy every file under `assets` into `out`, keeping relative paths.
///
/// Returns the number of files copied. Nothing inside `out` is copied, so
/// an assets dir that contains the output dir is safe.
fn copy_assets(assets: &Path, out: &Path) -> Result<usize> {
    if !assets.is_dir() || assets.starts_with(out) {
        return Ok(0);
    }

    let files: Vec<PathBuf> = WalkDir::new(assets)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| !path.starts_with(out))
        .collect();
    if files.is_empty() {
        return Ok(0);
    }

    let progress = ProgressLine::new(&[("assets", files.len())]);
    files.par_iter().try_for_each(|file| -> Result<()> {
        let dest = out.join(file.strip_prefix(assets)?);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(file, &dest).with_context(|| format!("failed to copy {}", file.display()))?;
        progress.inc("assets");
        Ok(())
    })?;
    progress.finish();

    Ok(files.len())
}
