//! Virtual file payloads and sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use percent_encoding::percent_decode_str;

/// How the engine treats a module's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Loader {
    Js,
    Css,
    File,
}

impl Loader {
    /// Infer the loader from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs") => Self::Js,
            Some("css") => Self::Css,
            _ => Self::File,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Js => "js",
            Self::Css => "css",
            Self::File => "file",
        }
    }
}

/// Contents of a virtual file plus the real paths it was derived from.
#[derive(Debug, Clone)]
pub struct VirtualData {
    pub code: String,
    pub loader: Loader,
    pub watch_files: Vec<PathBuf>,
    pub watch_dirs: Vec<PathBuf>,
}

impl VirtualData {
    pub fn new(code: impl Into<String>, loader: Loader) -> Self {
        Self {
            code: code.into(),
            loader,
            watch_files: Vec::new(),
            watch_dirs: Vec::new(),
        }
    }

    pub fn js(code: impl Into<String>) -> Self {
        Self::new(code, Loader::Js)
    }

    pub fn with_watch_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.watch_files.extend(files);
        self
    }

    pub fn with_watch_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.watch_dirs.extend(dirs);
        self
    }
}

/// A dev-server request as seen by a request handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub uri: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl Request {
    pub fn parse(uri: &str) -> Self {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        let path = path.split('#').next().unwrap_or(path);
        let query = query.split('#').next().unwrap_or(query);

        let decode = |s: &str| percent_decode_str(&s.replace('+', " ")).decode_utf8_lossy().into_owned();
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect();

        Self {
            uri: uri.to_string(),
            path: decode(path),
            query,
        }
    }
}

pub type Producer = Box<dyn Fn() -> anyhow::Result<VirtualData> + Send + Sync>;
pub type Handler = Box<dyn Fn(&Request) -> anyhow::Result<Option<VirtualData>> + Send + Sync>;

pub(super) type LazyCell = Arc<OnceLock<Option<Arc<VirtualData>>>>;

/// Where a virtual file's contents come from. Exactly one drives resolution.
pub(super) enum Source {
    Static(Arc<VirtualData>),
    Lazy {
        producer: Producer,
        cell: Mutex<LazyCell>,
    },
    Request(Handler),
}

/// A plugin-authored in-memory file.
pub struct VirtualFile {
    pub(super) source: Source,
}

impl VirtualFile {
    /// Contents known up front.
    pub fn fixed(data: VirtualData) -> Self {
        Self {
            source: Source::Static(Arc::new(data)),
        }
    }

    /// Contents computed on first resolve and shared until invalidated.
    pub fn lazy(producer: impl Fn() -> anyhow::Result<VirtualData> + Send + Sync + 'static) -> Self {
        Self {
            source: Source::Lazy {
                producer: Box::new(producer),
                cell: Mutex::new(LazyCell::default()),
            },
        }
    }

    /// Contents computed per request.
    pub fn request(
        handler: impl Fn(&Request) -> anyhow::Result<Option<VirtualData>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Source::Request(Box::new(handler)),
        }
    }

    /// Drop a computed Lazy result. Returns true if there was one.
    pub(super) fn reset(&self) -> bool {
        match &self.source {
            Source::Lazy { cell, .. } => {
                let mut cell = cell.lock();
                let had_value = cell.get().is_some();
                *cell = LazyCell::default();
                had_value
            }
            _ => false,
        }
    }
}
