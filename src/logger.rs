//! Terminal output: module-tagged log lines, the watch-mode status block and
//! the production progress line.
//!
//! ```ignore
//! log!("watch"; "{} changed", plural_count(n, "file"));
//! debug!("hmr"; "ws://localhost:{}", port);  // only with --verbose
//!
//! status_success("hmr update: src/app.css");
//! status_errors("build failed", messages.iter().map(String::as_str));
//! ```

use std::io::{StdoutLock, Write, stdout};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::SystemTime;

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// A progress line currently owns the bottom terminal row.
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// ============================================================================
// macros
// ============================================================================

/// Print `[module] message`.
///
/// ```ignore
/// log!("build"; "{} documents", count);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like [`log!`], but only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// log lines
// ============================================================================

/// Print one tagged line, keeping an active progress line at the bottom.
pub fn log(module: &str, message: &str) {
    let mut out = stdout().lock();
    // The progress line repaints itself on the next `inc`.
    if PROGRESS_ACTIVE.load(Ordering::Acquire) {
        clear_row(&mut out);
    }
    writeln!(out, "{} {message}", prefix(module)).ok();
    out.flush().ok();
}

fn prefix(module: &str) -> String {
    let tag = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" => tag.bright_blue().bold().to_string(),
        "watch" => tag.bright_green().bold().to_string(),
        "hmr" => tag.bright_magenta().bold().to_string(),
        "build" => tag.bright_cyan().bold().to_string(),
        "error" => tag.bright_red().bold().to_string(),
        _ => tag.bright_yellow().bold().to_string(),
    }
}

fn clear_row(out: &mut StdoutLock<'_>) {
    execute!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
}

/// Wall-clock time of day (UTC) as `HH:MM:SS`.
fn clock() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

// ============================================================================
// watch status
// ============================================================================

/// Overwritable status block for watch mode.
///
/// Each report replaces the previous block. Reporting the same error block
/// twice in a row prints nothing, so a file saved repeatedly with the same
/// mistake does not scroll the terminal.
pub struct WatchStatus {
    /// Rows occupied by the previous block.
    rows: usize,
    last_error: Option<String>,
}

static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> =
    LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    pub const fn new() -> Self {
        Self {
            rows: 0,
            last_error: None,
        }
    }

    pub fn success(&mut self, message: &str) {
        self.last_error = None;
        self.replace(&format!("{}", "✓".green()), message);
    }

    /// Show `summary` followed by `detail` lines; skipped when identical to
    /// the error already on screen.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let block = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        if self.last_error.as_deref() == Some(block.as_str()) {
            return;
        }
        self.replace(&format!("{}", "✗".red()), &block);
        self.last_error = Some(block);
    }

    fn replace(&mut self, symbol: &str, block: &str) {
        let mut out = stdout().lock();
        if self.rows > 0 {
            let rows = u16::try_from(self.rows).unwrap_or(u16::MAX);
            execute!(out, cursor::MoveUp(rows), Clear(ClearType::FromCursorDown)).ok();
        }
        let time = format!("[{}]", clock()).dimmed().to_string();
        writeln!(out, "{time} {symbol} {block}").ok();
        out.flush().ok();
        self.rows = block.lines().count().max(1);
    }
}

pub fn status_success(message: &str) {
    WATCH_STATUS.lock().success(message);
}

/// Deduplicate error messages, preserving first-seen order.
pub fn distinct_errors<'a>(messages: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = FxHashSet::default();
    messages
        .into_iter()
        .filter(|message| seen.insert(*message))
        .collect()
}

/// Report every distinct error once under `summary`.
pub fn status_errors<'a>(summary: &str, messages: impl IntoIterator<Item = &'a str>) {
    let detail = distinct_errors(messages).join("\n");
    WATCH_STATUS.lock().error(summary, &detail);
}

// ============================================================================
// progress line
// ============================================================================

/// Single-row counters for production builds: `[build] assets(3/8)`.
///
/// Workers call [`ProgressLine::inc`] concurrently; a repaint is skipped
/// while another thread is painting.
pub struct ProgressLine {
    counters: Vec<Counter>,
    paint: Mutex<()>,
    finished: bool,
}

struct Counter {
    name: &'static str,
    total: usize,
    done: AtomicUsize,
}

impl ProgressLine {
    /// Counters with a zero total are left out.
    pub fn new(items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .filter(|&&(_, total)| total > 0)
            .map(|&(name, total)| Counter {
                name,
                total,
                done: AtomicUsize::new(0),
            })
            .collect();

        PROGRESS_ACTIVE.store(true, Ordering::Release);
        let progress = Self {
            counters,
            paint: Mutex::new(()),
            finished: false,
        };
        progress.paint(false);
        progress
    }

    pub fn inc(&self, name: &str) {
        let Some(counter) = self.counters.iter().find(|c| c.name == name) else {
            return;
        };
        counter.done.fetch_add(1, Ordering::Relaxed);
        if let Some(_guard) = self.paint.try_lock() {
            self.paint(false);
        }
    }

    /// Paint the final counts and leave them on screen.
    pub fn finish(mut self) {
        {
            let _guard = self.paint.lock();
            self.paint(true);
        }
        self.finished = true;
    }

    fn line(&self) -> String {
        self.counters
            .iter()
            .map(|c| format!("{}({}/{})", c.name, c.done.load(Ordering::Relaxed), c.total))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn paint(&self, newline: bool) {
        let mut out = stdout().lock();
        clear_row(&mut out);
        write!(out, "{} {}", prefix("build"), self.line()).ok();
        if newline {
            writeln!(out).ok();
        }
        out.flush().ok();
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        PROGRESS_ACTIVE.store(false, Ordering::Release);
        if !self.finished {
            let mut out = stdout().lock();
            clear_row(&mut out);
            out.flush().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_error_is_not_repainted() {
        let mut status = WatchStatus::new();
        status.error("build failed", "src/a.js: cannot resolve `./b.js`");
        assert_eq!(status.rows, 2);

        status.rows = 0;
        status.error("build failed", "src/a.js: cannot resolve `./b.js`");
        assert_eq!(status.rows, 0);

        status.success("rebuilt");
        assert!(status.last_error.is_none());
        assert_eq!(status.rows, 1);
    }

    #[test]
    fn test_distinct_errors_keeps_first_occurrence() {
        let errors = ["b failed", "a failed", "b failed", "c failed", "a failed"];
        assert_eq!(
            distinct_errors(errors),
            vec!["b failed", "a failed", "c failed"]
        );
    }

    #[test]
    fn test_progress_line_counts() {
        let progress = ProgressLine::new(&[("assets", 2), ("empty", 0)]);
        assert_eq!(progress.counters.len(), 1);
        progress.inc("assets");
        progress.inc("unknown");
        assert_eq!(progress.line(), "assets(1/2)");
        progress.finish();
    }

    #[test]
    fn test_clock_format() {
        let time = clock();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
    }
}
