//! Deprecation warning codes and the sink they are reported through.

/// Folder mappings: a trailing-`/` key in `exports` or `imports`.
pub const DEP0148: &str = "DEP0148";

/// Extension or index fallback while resolving a package `main` for an ES
/// module.
pub const DEP0151: &str = "DEP0151";

/// Subpaths ending in `/` matched against an `exports` pattern.
pub const DEP0155: &str = "DEP0155";

/// Empty path segments in `exports`/`imports` targets or pattern captures.
pub const DEP0166: &str = "DEP0166";

/// Receives deprecation warnings raised during resolution.
///
/// The resolver deduplicates per `(code, package.json path, match)` before
/// calling the sink; an installed sink never sees the same tuple twice.
/// Without a configured sink, warnings go to `tracing::warn!`.
pub trait DeprecationSink: Send + Sync {
    fn emit(&self, code: &'static str, message: &str);
}
