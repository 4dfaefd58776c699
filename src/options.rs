use std::{env, fmt, sync::Arc};

use rustc_hash::FxHashSet;
use url::Url;

use crate::{deprecations::DeprecationSink, package_json::ModuleType};

/// Verdict of a [PolicyManifest] for one dependency edge.
#[derive(Debug, Clone)]
pub enum PolicyMapping {
    /// Resolution continues normally.
    Allowed,
    /// Resolution short-circuits to this URL.
    Redirect(Url),
    /// The manifest has no mapping for this edge; resolution fails with
    /// [crate::ResolveError::ManifestDependencyMissing].
    Missing,
}

/// Policy hook consulted before resolution proper.
pub trait PolicyManifest: Send + Sync {
    fn map_dependency(
        &self,
        specifier: &str,
        parent_url: Option<&Url>,
        conditions: &[String],
    ) -> PolicyMapping;
}

/// Resolver configuration.
#[derive(Clone)]
pub struct ResolveOptions {
    /// Condition names active while matching conditional `exports` and
    /// `imports` maps. The literal key `default` always applies, regardless
    /// of this list.
    ///
    /// Default `["node", "import"]`
    pub condition_names: Vec<String>,

    /// Keep symbolic links in resolved URLs instead of canonicalizing to
    /// their targets.
    ///
    /// Default `false`
    pub preserve_symlinks: bool,

    /// Same as [ResolveOptions::preserve_symlinks], but only for the main
    /// entry point (a resolution without a parent URL).
    ///
    /// Default `false`
    pub preserve_symlinks_main: bool,

    /// Allow `http:` and `https:` URLs as module specifiers and parents.
    ///
    /// Default `false`
    pub experimental_network_imports: bool,

    /// Forced module type for string input. When set, resolving a main entry
    /// point through the file namespace fails with
    /// [crate::ResolveError::InputTypeNotAllowed].
    ///
    /// Default `None`
    pub input_type: Option<ModuleType>,

    /// Resolve builtin module names such as `fs` to `node:fs` URLs.
    ///
    /// Default `true`
    pub builtin_modules: bool,

    /// Report paths that failed to resolve through a `watch:require` tracing
    /// event, so a watcher can re-run when they appear.
    ///
    /// Default: set when the `WATCH_REPORT_DEPENDENCIES` environment variable
    /// is present.
    pub watch_report_dependencies: bool,

    /// Policy manifest consulted for every dependency edge.
    ///
    /// Default `None`
    pub policy: Option<Arc<dyn PolicyManifest>>,

    /// Sink for deprecation warnings. `None` logs through `tracing::warn!`.
    ///
    /// Default `None`
    pub deprecations: Option<Arc<dyn DeprecationSink>>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            condition_names: vec!["node".into(), "import".into()],
            preserve_symlinks: false,
            preserve_symlinks_main: false,
            experimental_network_imports: false,
            input_type: None,
            builtin_modules: true,
            watch_report_dependencies: env::var_os("WATCH_REPORT_DEPENDENCIES").is_some(),
            policy: None,
            deprecations: None,
        }
    }
}

impl ResolveOptions {
    /// Removes duplicate condition names, keeping first occurrences.
    pub(crate) fn sanitize(mut self) -> Self {
        let mut seen = FxHashSet::default();
        self.condition_names.retain(|condition| seen.insert(condition.clone()));
        self
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("condition_names", &self.condition_names)
            .field("preserve_symlinks", &self.preserve_symlinks)
            .field("preserve_symlinks_main", &self.preserve_symlinks_main)
            .field("experimental_network_imports", &self.experimental_network_imports)
            .field("input_type", &self.input_type)
            .field("builtin_modules", &self.builtin_modules)
            .field("watch_report_dependencies", &self.watch_report_dependencies)
            .field("policy", &self.policy.is_some())
            .field("deprecations", &self.deprecations.is_some())
            .finish()
    }
}
