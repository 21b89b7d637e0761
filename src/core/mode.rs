//! Build mode for development and production runs.

/// Build mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    /// Watch mode: dev server, incremental handles and HMR client injection.
    pub watch: bool,

    /// Minify scripts, styles and HTML (production only).
    pub minify: bool,

    /// Inline critical CSS into documents (production only).
    pub critical: bool,
}

impl BuildMode {
    /// Production mode: one-shot build, handles disposed afterwards.
    pub const PRODUCTION: Self = Self {
        watch: false,
        minify: true,
        critical: false,
    };

    /// Development mode: includes hot reload support.
    pub const DEVELOPMENT: Self = Self {
        watch: true,
        minify: false,
        critical: false,
    };

    /// Derive the mode from the watch flag and the output options.
    ///
    /// Output optimizations never apply in watch mode.
    pub const fn new(watch: bool, minify: bool, critical: bool) -> Self {
        Self {
            watch,
            minify: minify && !watch,
            critical: critical && !watch,
        }
    }

    /// Check if this is development mode.
    #[inline]
    pub const fn is_dev(&self) -> bool {
        self.watch
    }
}
