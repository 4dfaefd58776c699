//! # ESM Resolver
//!
//! Node.js [ECMAScript module][esm] resolution over a file-URL namespace.
//!
//! A module resolution is the process of finding the module referenced by a
//! specifier in `import "specifier"`: the string after the `from` keyword of
//! an `import` statement, or the argument of an `import()` expression. Given
//! a specifier and the URL of the importing module, the resolver returns the
//! absolute URL of the module to load.
//!
//! Supported specifier forms:
//!
//! * relative and absolute paths, resolved against the parent URL
//! * bare package names, located by the `node_modules` walk and mapped
//!   through the `exports` field of their `package.json`
//! * private `#…` names, mapped through the `imports` field of the enclosing
//!   package
//! * absolute URLs: `file:`, `node:`, `data:`, and (behind
//!   [ResolveOptions::experimental_network_imports]) `http:`/`https:`
//!
//! ## References:
//!
//! * Algorithm adapted from the [ECMAScript Module Resolution Algorithm].
//! * `exports`/`imports` semantics follow the [Node.js packages documentation].
//!
//! [esm]: https://nodejs.org/api/esm.html
//! [ECMAScript Module Resolution Algorithm]: https://nodejs.org/api/esm.html#resolution-algorithm-specification
//! [Node.js packages documentation]: https://nodejs.org/api/packages.html
//!
//! ## Feature flags
#![cfg_attr(feature = "document-features", doc = document_features::document_features!())]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//!
//! ## Example
//!
//! ```rust,ignore
//! let resolver = Resolver::new(ResolveOptions::default());
//! let resolution = resolver.resolve("lodash/fp", Some("file:///app/src/main.mjs")).await?;
//! println!("{}", resolution.url());
//! ```

mod builtins;
mod cache;
mod context;
mod deprecations;
mod error;
mod file_system;
mod format;
mod options;
mod package_json;
mod resolution;
mod specifier;

#[cfg(test)]
mod tests;

use std::{
    cmp::Ordering,
    env, fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashSet;
use futures::future::BoxFuture;
use percent_encoding::percent_decode_str;
use rustc_hash::FxHashSet;
use serde_json::Value as JSONValue;
use url::Url;

pub use crate::{
    builtins::{is_builtin, NODEJS_BUILTINS},
    deprecations::{DeprecationSink, DEP0148, DEP0151, DEP0155, DEP0166},
    error::{IOError, JSONError, ResolveError, SpecifierError},
    file_system::{FileMetadata, FileSystem, FileSystemOs},
    format::ModuleFormat,
    options::{PolicyManifest, PolicyMapping, ResolveOptions},
    package_json::{JSONMap, ModuleType, PackageJson},
    resolution::Resolution,
    specifier::SpecifierKind,
};
use crate::{
    cache::Cache,
    context::ResolveContext as Ctx,
    specifier::{classify, parse_package_name},
};

/// Context returned from the [ResolverGeneric::resolve_with_context] API
#[derive(Debug, Default, Clone)]
pub struct ResolveContext {
    /// Files that were found on the file system
    pub file_dependencies: FxHashSet<PathBuf>,

    /// Dependencies that were not found on the file system
    pub missing_dependencies: FxHashSet<PathBuf>,
}

/// Resolver with the current operating system as the file system
pub type Resolver = ResolverGeneric<FileSystemOs>;

/// Generic implementation of the resolver, can be configured by the [FileSystem] trait
pub struct ResolverGeneric<Fs> {
    options: ResolveOptions,
    cache: Arc<Cache<Fs>>,
    emitted_warnings: DashSet<(&'static str, PathBuf, String)>,
}

impl<Fs> fmt::Debug for ResolverGeneric<Fs> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.options.fmt(f)
    }
}

impl<Fs: Send + Sync + FileSystem + Default> Default for ResolverGeneric<Fs> {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

/// Outcome of resolving a single `exports`/`imports` target value.
///
/// `Blocked` is an explicit `null` mapping; `Unmatched` means no branch
/// applied and the caller keeps scanning. The two propagate differently
/// through ordered alternatives, so they cannot share a variant.
#[derive(Debug)]
enum TargetOutcome {
    Resolved(Url),
    Blocked,
    Unmatched,
}

/// Path segments of a target string or pattern capture, scanned for
/// forbidden segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentCheck {
    Ok,
    /// Only empty segments, e.g. a double or trailing slash. A deprecated
    /// form that still resolves.
    EmptyOnly,
    /// A `.`, `..` or `node_modules` segment, in plain or percent-encoded
    /// spelling.
    Invalid,
}

impl<Fs: Send + Sync + FileSystem + Default> ResolverGeneric<Fs> {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options: options.sanitize(),
            cache: Arc::new(Cache::new(Fs::default())),
            emitted_warnings: DashSet::default(),
        }
    }
}

impl<Fs: FileSystem + Send + Sync> ResolverGeneric<Fs> {
    pub fn new_with_file_system(file_system: Fs, options: ResolveOptions) -> Self {
        Self {
            options: options.sanitize(),
            cache: Arc::new(Cache::new(file_system)),
            emitted_warnings: DashSet::default(),
        }
    }

    /// Clone the resolver using the same underlying cache.
    #[must_use]
    pub fn clone_with_options(&self, options: ResolveOptions) -> Self {
        Self {
            options: options.sanitize(),
            cache: Arc::clone(&self.cache),
            emitted_warnings: DashSet::default(),
        }
    }

    /// Returns the options.
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Clear the underlying cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolve `specifier` from the module at `parent_url`.
    ///
    /// `parent_url` must be an absolute URL string, typically the `file:` URL
    /// of the importing module. `None` resolves a main entry point against
    /// the current working directory.
    ///
    /// # Errors
    ///
    /// * See [ResolveError]
    pub async fn resolve(
        &self,
        specifier: &str,
        parent_url: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let mut ctx = Ctx::default();
        self.resolve_tracing(specifier, parent_url, &mut ctx).await
    }

    /// Resolve `specifier` from `parent_url` with [ResolveContext]
    ///
    /// # Errors
    ///
    /// * See [ResolveError]
    pub async fn resolve_with_context(
        &self,
        specifier: &str,
        parent_url: Option<&str>,
        resolve_context: &mut ResolveContext,
    ) -> Result<Resolution, ResolveError> {
        let mut ctx = Ctx::default();
        ctx.init_file_dependencies();
        let result = self.resolve_tracing(specifier, parent_url, &mut ctx).await;
        if let Some(deps) = &mut ctx.file_dependencies {
            resolve_context.file_dependencies.extend(deps.drain(..));
        }
        if let Some(deps) = &mut ctx.missing_dependencies {
            resolve_context.missing_dependencies.extend(deps.drain(..));
        }
        result
    }

    /// Wrap `resolve_impl` with `tracing` information
    async fn resolve_tracing(
        &self,
        specifier: &str,
        parent_url: Option<&str>,
        ctx: &mut Ctx,
    ) -> Result<Resolution, ResolveError> {
        let span = tracing::debug_span!("resolve", specifier = specifier, parent = ?parent_url);
        let _enter = span.enter();
        let r = self.resolve_impl(specifier, parent_url, ctx).await;
        match &r {
            Ok(r) => {
                tracing::debug!(options = ?self.options, url = %r.url());
            }
            Err(err) => {
                tracing::debug!(options = ?self.options, err = ?err);
            }
        }
        r
    }

    /// defaultResolve(specifier, context)
    async fn resolve_impl(
        &self,
        specifier: &str,
        parent_url: Option<&str>,
        ctx: &mut Ctx,
    ) -> Result<Resolution, ResolveError> {
        let conditions = &self.options.condition_names;

        if let Some(policy) = &self.options.policy {
            let parsed_parent = parent_url.and_then(|parent| Url::parse(parent).ok());
            match policy.map_dependency(specifier, parsed_parent.as_ref(), conditions) {
                PolicyMapping::Allowed => {}
                PolicyMapping::Redirect(url) => {
                    let format = self.module_format(&url, ctx).await?;
                    return Ok(Resolution { url, format, package_json: None });
                }
                PolicyMapping::Missing => {
                    return Err(ResolveError::ManifestDependencyMissing {
                        specifier: specifier.to_string(),
                        parent: parent_url.unwrap_or_default().to_string(),
                    });
                }
            }
        }

        let parsed_parent = match parent_url {
            Some(parent) => Some(
                Url::parse(parent)
                    .map_err(|_| ResolveError::InvalidArgType(parent.to_string()))?,
            ),
            None => None,
        };

        let kind = classify(specifier);
        if kind == SpecifierKind::Empty {
            return Err(ResolveError::Specifier(SpecifierError::Empty));
        }

        let parsed = match kind {
            SpecifierKind::Relative | SpecifierKind::Absolute => {
                parsed_parent.as_ref().and_then(|base| base.join(specifier).ok())
            }
            SpecifierKind::Url => Url::parse(specifier).ok(),
            _ => None,
        };

        // A module loaded over the network may only reach relative, absolute
        // and remote specifiers. Neither the file namespace nor builtins.
        if let Some(parent) = &parsed_parent {
            if matches!(parent.scheme(), "http" | "https") {
                if matches!(kind, SpecifierKind::Relative | SpecifierKind::Absolute) {
                    match &parsed {
                        Some(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                            let format = self.module_format(parsed, ctx).await?;
                            return Ok(Resolution {
                                url: parsed.clone(),
                                format,
                                package_json: None,
                            });
                        }
                        _ => {
                            return Err(ResolveError::NetworkImportDisallowed {
                                specifier: specifier.to_string(),
                                parent: parent.to_string(),
                                reason: "remote imports cannot import from a local location",
                            })
                        }
                    }
                }
                if self.options.builtin_modules && is_builtin(specifier) {
                    return Err(ResolveError::NetworkImportDisallowed {
                        specifier: specifier.to_string(),
                        parent: parent.to_string(),
                        reason: "remote imports cannot import from a local location",
                    });
                }
                return Err(ResolveError::NetworkImportDisallowed {
                    specifier: specifier.to_string(),
                    parent: parent.to_string(),
                    reason: "only relative and absolute specifiers are supported",
                });
            }
        }

        if let Some(parsed) = &parsed {
            match parsed.scheme() {
                "data" => {
                    let format = self.module_format(parsed, ctx).await?;
                    return Ok(Resolution { url: parsed.clone(), format, package_json: None });
                }
                "http" | "https" if self.options.experimental_network_imports => {
                    let format = self.module_format(parsed, ctx).await?;
                    return Ok(Resolution { url: parsed.clone(), format, package_json: None });
                }
                "node" => {
                    return Ok(Resolution {
                        url: parsed.clone(),
                        format: Some(ModuleFormat::Builtin),
                        package_json: None,
                    });
                }
                "file" => {}
                scheme => return Err(ResolveError::UnsupportedUrlScheme(scheme.to_string())),
            }
        }

        let is_main = parsed_parent.is_none();
        let base = match parsed_parent {
            Some(url) => url,
            None => {
                // The main entry point resolves through the file namespace,
                // which forced string input cannot do.
                if self.options.input_type.is_some() {
                    return Err(ResolveError::InputTypeNotAllowed);
                }
                let cwd = env::current_dir()?;
                Url::from_directory_path(&cwd)
                    .map_err(|()| ResolveError::InvalidArgType(cwd.display().to_string()))?
            }
        };
        let preserve_symlinks = if is_main {
            self.options.preserve_symlinks_main
        } else {
            self.options.preserve_symlinks
        };

        let url = match self
            .module_resolve(specifier, &base, conditions, preserve_symlinks, ctx)
            .await
        {
            Ok(url) => url,
            Err(err) => return Err(self.attach_suggestion(err, specifier, &base, ctx).await),
        };

        let format = self.module_format(&url, ctx).await?;
        let package_json = if url.scheme() == "file" {
            self.get_package_scope_config(&url, ctx).await?
        } else {
            None
        };
        Ok(Resolution { url, format, package_json })
    }

    /// moduleResolve(specifier, base, conditions, preserveSymlinks)
    async fn module_resolve(
        &self,
        specifier: &str,
        base: &Url,
        conditions: &[String],
        preserve_symlinks: bool,
        ctx: &mut Ctx,
    ) -> Result<Url, ResolveError> {
        // `data:` and remote bases cannot reach `imports` or the package walk.
        let is_remote = matches!(base.scheme(), "data" | "http" | "https");
        let kind = classify(specifier);
        let resolved = if matches!(kind, SpecifierKind::Relative | SpecifierKind::Absolute) {
            base.join(specifier).map_err(|_| ResolveError::InvalidModuleSpecifier {
                specifier: specifier.to_string(),
                reason: format!("cannot be resolved against {base}"),
            })?
        } else if kind == SpecifierKind::Private && !is_remote {
            self.package_imports_resolve(specifier, base, conditions, ctx).await?
        } else if let Ok(url) = Url::parse(specifier) {
            url
        } else if is_remote {
            return Err(ResolveError::InvalidModuleSpecifier {
                specifier: specifier.to_string(),
                reason: format!("only URLs are supported from {base}"),
            });
        } else {
            self.package_resolve(specifier, base, conditions, ctx).await?
        };
        if resolved.scheme() == "file" {
            self.finalize_resolution(resolved, base, preserve_symlinks, ctx).await
        } else {
            Ok(resolved)
        }
    }

    /// PACKAGE_IMPORTS_RESOLVE(specifier, parentURL, conditions)
    async fn package_imports_resolve(
        &self,
        name: &str,
        base: &Url,
        conditions: &[String],
        ctx: &mut Ctx,
    ) -> Result<Url, ResolveError> {
        debug_assert!(name.starts_with('#'), "{name}");
        if name == "#" || name.starts_with("#/") || name.ends_with('/') {
            return Err(ResolveError::InvalidModuleSpecifier {
                specifier: name.to_string(),
                reason: format!("is not a valid internal imports specifier name (imported from {base})"),
            });
        }
        let mut scope_path = None;
        if let Some(config) = self.get_package_scope_config(base, ctx).await? {
            scope_path = Some(config.path.clone());
            if let Some(imports) = config.imports() {
                let pjson_url = file_url(&config.path)?;
                match self
                    .package_imports_exports_resolve(
                        name,
                        imports,
                        &pjson_url,
                        /* is_imports */ true,
                        conditions,
                        ctx,
                    )
                    .await?
                {
                    TargetOutcome::Resolved(url) => return Ok(url),
                    TargetOutcome::Blocked | TargetOutcome::Unmatched => {}
                }
            }
        }
        Err(ResolveError::PackageImportNotDefined {
            specifier: name.to_string(),
            path: scope_path,
        })
    }

    /// PACKAGE_RESOLVE(packageSpecifier, parentURL)
    fn package_resolve<'a>(
        &'a self,
        specifier: &'a str,
        base: &'a Url,
        conditions: &'a [String],
        ctx: &'a mut Ctx,
    ) -> BoxFuture<'a, Result<Url, ResolveError>> {
        let fut = async move {
            ctx.test_for_infinite_recursion()?;

            if self.options.builtin_modules && is_builtin(specifier) {
                return Url::parse(&format!("node:{specifier}")).map_err(|_| {
                    ResolveError::InvalidModuleSpecifier {
                        specifier: specifier.to_string(),
                        reason: "is not a valid builtin module name".to_string(),
                    }
                });
            }

            let (package_name, package_subpath, is_scoped) = parse_package_name(specifier, base)?;

            // ResolveSelf: the enclosing scope may export under its own name.
            if let Some(config) = self.get_package_scope_config(base, ctx).await? {
                if config.name.as_deref() == Some(package_name) {
                    if let Some(exports) = config.exports().filter(|exports| !exports.is_null()) {
                        let pjson_url = file_url(&config.path)?;
                        return self
                            .package_exports_resolve(
                                &pjson_url,
                                &package_subpath,
                                exports,
                                conditions,
                                ctx,
                            )
                            .await;
                    }
                }
            }

            let mut pjson_url = base
                .join(&format!("./node_modules/{package_name}/package.json"))
                .map_err(|_| ResolveError::InvalidModuleSpecifier {
                    specifier: specifier.to_string(),
                    reason: format!("cannot be resolved against {base}"),
                })?;
            let mut pjson_path = file_path(&pjson_url)?;
            let mut last_path = PathBuf::new();
            while pjson_path != last_path {
                let Some(package_dir) = pjson_path.parent() else { break };
                let cached_dir = self.cache.value(package_dir);
                if !cached_dir.is_dir(&self.cache.fs, ctx).await {
                    // Step up: three directories for unscoped names, four for
                    // scoped ones, and retry. Terminates at the root, where
                    // the path no longer changes.
                    last_path = pjson_path;
                    let prefix = if is_scoped {
                        "../../../../node_modules/"
                    } else {
                        "../../../node_modules/"
                    };
                    pjson_url = pjson_url
                        .join(&format!("{prefix}{package_name}/package.json"))
                        .map_err(|_| ResolveError::ModuleNotFound {
                            specifier: specifier.to_string(),
                            suggestion: None,
                        })?;
                    pjson_path = file_path(&pjson_url)?;
                    continue;
                }

                // Package match.
                let config = cached_dir.package_json(&self.cache.fs, &self.options, ctx).await?;
                if let Some(config) = &config {
                    if let Some(exports) = config.exports().filter(|exports| !exports.is_null()) {
                        return self
                            .package_exports_resolve(
                                &pjson_url,
                                &package_subpath,
                                exports,
                                conditions,
                                ctx,
                            )
                            .await;
                    }
                }
                if package_subpath == "." {
                    return self
                        .legacy_main_resolve(&pjson_url, config.as_deref(), base, ctx)
                        .await;
                }
                return pjson_url.join(&package_subpath).map_err(|_| {
                    ResolveError::InvalidModuleSpecifier {
                        specifier: specifier.to_string(),
                        reason: format!("cannot be resolved against {pjson_url}"),
                    }
                });
            }
            Err(ResolveError::ModuleNotFound {
                specifier: specifier.to_string(),
                suggestion: None,
            })
        };
        Box::pin(fut)
    }

    /// LOOKUP_PACKAGE_SCOPE(url): the nearest enclosing `package.json`,
    /// stopping at `node_modules` boundaries.
    async fn get_package_scope_config(
        &self,
        url: &Url,
        ctx: &mut Ctx,
    ) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        let Ok(dir_url) = url.join(".") else { return Ok(None) };
        let Ok(dir) = dir_url.to_file_path() else { return Ok(None) };
        let mut cached = Some(self.cache.value(&dir));
        while let Some(cached_path) = cached {
            if cached_path.path().file_name().is_some_and(|name| name == "node_modules") {
                break;
            }
            if let Some(package_json) =
                cached_path.package_json(&self.cache.fs, &self.options, ctx).await?
            {
                return Ok(Some(package_json));
            }
            cached = cached_path.parent().cloned();
        }
        Ok(None)
    }

    /// PACKAGE_EXPORTS_RESOLVE(packageURL, subpath, exports, conditions)
    async fn package_exports_resolve(
        &self,
        pjson_url: &Url,
        package_subpath: &str,
        exports: &JSONValue,
        conditions: &[String],
        ctx: &mut Ctx,
    ) -> Result<Url, ResolveError> {
        // Conditional main sugar: a bare target or an all-condition-keys map
        // stands for `{ ".": exports }`.
        let sugar_storage;
        let empty = JSONMap::new();
        let exports_map: &JSONMap = if is_conditional_exports_main_sugar(exports, pjson_url)? {
            let mut map = JSONMap::new();
            map.insert(".".to_string(), exports.clone());
            sugar_storage = map;
            &sugar_storage
        } else {
            exports.as_object().unwrap_or(&empty)
        };

        match self
            .package_imports_exports_resolve(
                package_subpath,
                exports_map,
                pjson_url,
                /* is_imports */ false,
                conditions,
                ctx,
            )
            .await?
        {
            TargetOutcome::Resolved(url) => Ok(url),
            TargetOutcome::Blocked | TargetOutcome::Unmatched => {
                Err(ResolveError::PackageSubpathNotExported {
                    subpath: package_subpath.to_string(),
                    path: package_json_path(pjson_url),
                })
            }
        }
    }

    /// PACKAGE_IMPORTS_EXPORTS_RESOLVE(matchKey, matchObj, packageURL, isImports, conditions)
    async fn package_imports_exports_resolve(
        &self,
        match_key: &str,
        match_obj: &JSONMap,
        pjson_url: &Url,
        is_imports: bool,
        conditions: &[String],
        ctx: &mut Ctx,
    ) -> Result<TargetOutcome, ResolveError> {
        // Literal keys take priority over any pattern.
        if !match_key.contains('*') && !match_key.ends_with('/') {
            if let Some(target) = match_obj.get(match_key) {
                return self
                    .resolve_package_target(
                        pjson_url, target, "", match_key, /* pattern */ false, is_imports,
                        /* is_path_map */ false, conditions, ctx,
                    )
                    .await;
            }
        }

        let mut best_key = "";
        let mut best_capture = "";
        let mut best_target = None;
        for (key, target) in match_obj {
            if let Some(star) = key.find('*') {
                // Keys with a second `*` are not patterns and never match.
                if key[star + 1..].contains('*') {
                    continue;
                }
                let prefix = &key[..star];
                let trailer = &key[star + 1..];
                if match_key.starts_with(prefix) {
                    if !is_imports && match_key.ends_with('/') {
                        self.emit_trailing_slash_pattern_deprecation(pjson_url, match_key);
                    }
                    if match_key.len() >= key.len()
                        && match_key.ends_with(trailer)
                        && Self::pattern_key_compare(best_key, key).is_gt()
                    {
                        best_key = key;
                        best_capture = &match_key[prefix.len()..match_key.len() - trailer.len()];
                        best_target = Some(target);
                    }
                }
            } else if key.ends_with('/')
                && match_key.starts_with(key.as_str())
                && Self::pattern_key_compare(best_key, key).is_gt()
            {
                // Legacy folder mapping, kept working behind a deprecation.
                best_key = key;
                best_capture = &match_key[key.len()..];
                best_target = Some(target);
            }
        }

        if let Some(target) = best_target {
            if best_key.ends_with('/') {
                self.emit_folder_mapping_deprecation(pjson_url, best_key, is_imports);
            }
            let pattern = best_key.contains('*');
            return self
                .resolve_package_target(
                    pjson_url,
                    target,
                    best_capture,
                    best_key,
                    pattern,
                    is_imports,
                    match_key.ends_with('/'),
                    conditions,
                    ctx,
                )
                .await;
        }
        Ok(TargetOutcome::Unmatched)
    }

    /// PACKAGE_TARGET_RESOLVE(packageURL, target, patternMatch, isImports, conditions)
    #[allow(clippy::too_many_arguments)]
    fn resolve_package_target<'a>(
        &'a self,
        pjson_url: &'a Url,
        target: &'a JSONValue,
        capture: &'a str,
        match_key: &'a str,
        pattern: bool,
        is_imports: bool,
        is_path_map: bool,
        conditions: &'a [String],
        ctx: &'a mut Ctx,
    ) -> BoxFuture<'a, Result<TargetOutcome, ResolveError>> {
        let fut = async move {
            match target {
                JSONValue::String(target) => self
                    .resolve_package_target_string(
                        pjson_url, target, capture, match_key, pattern, is_imports, is_path_map,
                        conditions, ctx,
                    )
                    .await
                    .map(TargetOutcome::Resolved),
                // Ordered alternatives: the first that does not fail with an
                // invalid target wins. An explicit `null` en route downgrades
                // the whole list to "blocked" instead of an error.
                JSONValue::Array(targets) => {
                    if targets.is_empty() {
                        return Ok(TargetOutcome::Blocked);
                    }
                    let mut last_error = None;
                    let mut blocked = false;
                    for target in targets {
                        match self
                            .resolve_package_target(
                                pjson_url, target, capture, match_key, pattern, is_imports,
                                is_path_map, conditions, ctx,
                            )
                            .await
                        {
                            Ok(TargetOutcome::Unmatched) => {}
                            Ok(TargetOutcome::Blocked) => {
                                blocked = true;
                                last_error = None;
                            }
                            Ok(resolved) => return Ok(resolved),
                            Err(err @ ResolveError::InvalidPackageTarget { .. }) => {
                                blocked = false;
                                last_error = Some(err);
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    if blocked {
                        return Ok(TargetOutcome::Blocked);
                    }
                    last_error.map_or(Ok(TargetOutcome::Unmatched), Err)
                }
                // Conditional map: first applicable condition in source order
                // wins; `default` always applies.
                JSONValue::Object(map) => {
                    for key in map.keys() {
                        if is_array_index(key) {
                            return Err(ResolveError::InvalidPackageConfig {
                                path: package_json_path(pjson_url),
                                message: "\"exports\" cannot contain numeric property keys"
                                    .to_string(),
                            });
                        }
                    }
                    for (key, value) in map {
                        if key == "default" || conditions.iter().any(|condition| condition == key) {
                            match self
                                .resolve_package_target(
                                    pjson_url, value, capture, match_key, pattern, is_imports,
                                    is_path_map, conditions, ctx,
                                )
                                .await?
                            {
                                TargetOutcome::Unmatched => {}
                                outcome => return Ok(outcome),
                            }
                        }
                    }
                    Ok(TargetOutcome::Unmatched)
                }
                JSONValue::Null => Ok(TargetOutcome::Blocked),
                _ => Err(invalid_package_target(
                    pjson_url,
                    match_key,
                    &target.to_string(),
                    is_imports,
                )),
            }
        };
        Box::pin(fut)
    }

    /// PACKAGE_TARGET_RESOLVE, string target.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_package_target_string(
        &self,
        pjson_url: &Url,
        target: &str,
        capture: &str,
        match_key: &str,
        pattern: bool,
        is_imports: bool,
        is_path_map: bool,
        conditions: &[String],
        ctx: &mut Ctx,
    ) -> Result<Url, ResolveError> {
        // A capture without a pattern is only meaningful for folder mappings.
        if !capture.is_empty() && !pattern && !target.ends_with('/') {
            return Err(invalid_package_target(pjson_url, match_key, target, is_imports));
        }

        if !target.starts_with("./") {
            // `imports` may re-export a bare specifier, which resolves as a
            // dependency of this package.
            if is_imports
                && !target.starts_with("../")
                && !target.starts_with('/')
                && Url::parse(target).is_err()
            {
                let export_target = if pattern {
                    target.replacen('*', capture, 1)
                } else {
                    format!("{target}{capture}")
                };
                return self.package_resolve(&export_target, pjson_url, conditions, ctx).await;
            }
            return Err(invalid_package_target(pjson_url, match_key, target, is_imports));
        }

        match check_path_segments(&target[2..]) {
            SegmentCheck::Ok => {}
            SegmentCheck::EmptyOnly => {
                if !is_path_map {
                    let request = pattern_request(match_key, capture, pattern);
                    self.emit_invalid_segment_deprecation(
                        pjson_url, &request, match_key, target, is_imports, /* is_target */ true,
                    );
                }
            }
            SegmentCheck::Invalid => {
                return Err(invalid_package_target(pjson_url, match_key, target, is_imports));
            }
        }

        let resolved = pjson_url
            .join(target)
            .map_err(|_| invalid_package_target(pjson_url, match_key, target, is_imports))?;
        let package_path = package_dir_path(pjson_url)?;
        // The resolved target must stay within the package directory.
        if !resolved.path().starts_with(package_path.path()) {
            return Err(invalid_package_target(pjson_url, match_key, target, is_imports));
        }

        if capture.is_empty() {
            return Ok(resolved);
        }

        match check_path_segments(capture) {
            SegmentCheck::Ok => {}
            SegmentCheck::EmptyOnly => {
                if !is_path_map {
                    let request = pattern_request(match_key, capture, pattern);
                    self.emit_invalid_segment_deprecation(
                        pjson_url, &request, match_key, target, is_imports,
                        /* is_target */ false,
                    );
                }
            }
            SegmentCheck::Invalid => {
                let request = pattern_request(match_key, capture, pattern);
                return Err(ResolveError::InvalidModuleSpecifier {
                    specifier: request,
                    reason: format!(
                        "is not a valid subpath for the {:?} resolution of {}",
                        if is_imports { "imports" } else { "exports" },
                        package_json_path(pjson_url).display()
                    ),
                });
            }
        }

        if pattern {
            // Substitution applies to the whole href, so a query or fragment
            // in the target survives.
            let href = resolved.as_str().replacen('*', capture, 1);
            return Url::parse(&href).map_err(|_| ResolveError::InvalidModuleSpecifier {
                specifier: href,
                reason: "is not a valid URL after pattern substitution".to_string(),
            });
        }
        resolved.join(capture).map_err(|_| ResolveError::InvalidModuleSpecifier {
            specifier: capture.to_string(),
            reason: format!("cannot be resolved against {resolved}"),
        })
    }

    /// LEGACY_MAIN_RESOLVE: the extension/index ladder for packages without
    /// `exports`.
    async fn legacy_main_resolve(
        &self,
        pjson_url: &Url,
        config: Option<&PackageJson>,
        base: &Url,
        ctx: &mut Ctx,
    ) -> Result<Url, ResolveError> {
        let main = config.and_then(|config| config.main.as_deref());
        if let Some(main) = main {
            if let Ok(guess) = pjson_url.join(&format!("./{main}")) {
                if self.is_file_url(&guess, ctx).await {
                    return Ok(guess);
                }
            }
            for ext in [".js", ".json", ".node", "/index.js", "/index.json", "/index.node"] {
                let Ok(guess) = pjson_url.join(&format!("./{main}{ext}")) else { continue };
                if self.is_file_url(&guess, ctx).await {
                    self.emit_legacy_index_deprecation(&guess, pjson_url, base, Some(main), ctx)
                        .await;
                    return Ok(guess);
                }
            }
        }
        for candidate in ["./index.js", "./index.json", "./index.node"] {
            let Ok(guess) = pjson_url.join(candidate) else { continue };
            if self.is_file_url(&guess, ctx).await {
                self.emit_legacy_index_deprecation(&guess, pjson_url, base, main, ctx).await;
                return Ok(guess);
            }
        }
        Err(ResolveError::ModuleNotFound {
            specifier: package_json_path(pjson_url)
                .parent()
                .unwrap_or(Path::new(""))
                .display()
                .to_string(),
            suggestion: None,
        })
    }

    /// finalizeResolution(resolved, base, preserveSymlinks)
    async fn finalize_resolution(
        &self,
        resolved: Url,
        base: &Url,
        preserve_symlinks: bool,
        ctx: &mut Ctx,
    ) -> Result<Url, ResolveError> {
        let lower = resolved.path().to_ascii_lowercase();
        if lower.contains("%2f") || lower.contains("%5c") {
            return Err(ResolveError::InvalidModuleSpecifier {
                specifier: resolved.path().to_string(),
                reason: format!(
                    "must not include encoded \"/\" or \"\\\" characters (imported from {base})"
                ),
            });
        }

        let path = file_path(&resolved)?;
        // The probe ignores a trailing slash; the URL keeps it.
        let cached = {
            let probe = path.to_string_lossy();
            self.cache.value(Path::new(probe.trim_end_matches(['/', '\\'])))
        };
        if cached.is_dir(&self.cache.fs, ctx).await {
            return Err(ResolveError::UnsupportedDirectoryImport { path, suggestion: None });
        }
        if !cached.is_file(&self.cache.fs, ctx).await {
            if self.options.watch_report_dependencies {
                tracing::info!(target: "watch:require", dependency = %path.display());
            }
            return Err(ResolveError::ModuleNotFound {
                specifier: path.display().to_string(),
                suggestion: None,
            });
        }

        if preserve_symlinks {
            return Ok(resolved);
        }
        let real = cached.realpath(&self.cache.fs).await?;
        let mut url = file_url(&real)?;
        url.set_query(resolved.query());
        url.set_fragment(resolved.fragment());
        Ok(url)
    }

    /// Format verdict for a resolved URL. For ambiguous `.js` files, the
    /// `type` of the enclosing package scope decides; `.mjs` is always a
    /// module.
    async fn module_format(
        &self,
        url: &Url,
        ctx: &mut Ctx,
    ) -> Result<Option<ModuleFormat>, ResolveError> {
        match url.scheme() {
            "node" => Ok(Some(ModuleFormat::Builtin)),
            "data" => Ok(format::data_url_format(url)),
            "file" => {
                let Ok(path) = url.to_file_path() else { return Ok(None) };
                match path.extension().and_then(|ext| ext.to_str()) {
                    Some("mjs") => Ok(Some(ModuleFormat::Module)),
                    Some("cjs") => Ok(Some(ModuleFormat::CommonJs)),
                    Some("json") => Ok(Some(ModuleFormat::Json)),
                    Some("wasm") => Ok(Some(ModuleFormat::Wasm)),
                    Some("js") => {
                        let scope = self.get_package_scope_config(url, ctx).await?;
                        let module_type = scope.and_then(|config| config.r#type);
                        Ok(Some(if module_type == Some(ModuleType::Module) {
                            ModuleFormat::Module
                        } else {
                            ModuleFormat::CommonJs
                        }))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    async fn is_file_url(&self, url: &Url, ctx: &mut Ctx) -> bool {
        let Ok(path) = url.to_file_path() else { return false };
        self.cache.value(&path).is_file(&self.cache.fs, ctx).await
    }

    /// Attaches a best-effort "did you mean" hint crafted by the CommonJS
    /// probe. Failures of the probe are ignored.
    async fn attach_suggestion(
        &self,
        err: ResolveError,
        specifier: &str,
        base: &Url,
        ctx: &mut Ctx,
    ) -> ResolveError {
        match err {
            ResolveError::ModuleNotFound { specifier: not_found, suggestion: None } => {
                let suggestion = self.resolve_as_common_js(specifier, base, ctx).await;
                ResolveError::ModuleNotFound { specifier: not_found, suggestion }
            }
            ResolveError::UnsupportedDirectoryImport { path, suggestion: None } => {
                let suggestion = self.resolve_as_common_js(specifier, base, ctx).await;
                ResolveError::UnsupportedDirectoryImport { path, suggestion }
            }
            err => err,
        }
    }

    /// Approximates `require()` to find what the specifier would have
    /// resolved to as CommonJS.
    async fn resolve_as_common_js(
        &self,
        specifier: &str,
        base: &Url,
        ctx: &mut Ctx,
    ) -> Option<String> {
        let parent_dir = base.join(".").ok()?.to_file_path().ok()?;
        let found = match classify(specifier) {
            SpecifierKind::Relative | SpecifierKind::Absolute => {
                let target = base.join(specifier).ok()?.to_file_path().ok()?;
                self.load_cjs_candidate(&target, ctx).await?
            }
            SpecifierKind::Bare => {
                let (package_name, package_subpath, _) = parse_package_name(specifier, base).ok()?;
                let mut found = None;
                for dir in parent_dir.ancestors() {
                    let package_dir = dir.join("node_modules").join(package_name);
                    let target = if package_subpath == "." {
                        let cached = self.cache.value(&package_dir);
                        cached
                            .package_json(&self.cache.fs, &self.options, ctx)
                            .await
                            .ok()
                            .flatten()
                            .and_then(|config| config.main.clone())
                            .map_or_else(|| package_dir.clone(), |main| package_dir.join(main))
                    } else {
                        package_dir.join(&package_subpath[2..])
                    };
                    if let Some(hit) = self.load_cjs_candidate(&target, ctx).await {
                        found = Some(hit);
                        break;
                    }
                }
                found?
            }
            _ => return None,
        };
        Some(prettify_suggestion(specifier, &parent_dir, &found))
    }

    /// The `require()` ladder: the exact path, known extensions, then index
    /// files.
    async fn load_cjs_candidate(&self, path: &Path, ctx: &mut Ctx) -> Option<PathBuf> {
        if self.cache.value(path).is_file(&self.cache.fs, ctx).await {
            return Some(path.to_path_buf());
        }
        for ext in [".js", ".json", ".node"] {
            let mut with_extension = path.as_os_str().to_os_string();
            with_extension.push(ext);
            let candidate = PathBuf::from(with_extension);
            if self.cache.value(&candidate).is_file(&self.cache.fs, ctx).await {
                return Some(candidate);
            }
        }
        for index in ["index.js", "index.json", "index.node"] {
            let candidate = path.join(index);
            if self.cache.value(&candidate).is_file(&self.cache.fs, ctx).await {
                return Some(candidate);
            }
        }
        None
    }

    async fn emit_legacy_index_deprecation(
        &self,
        url: &Url,
        pjson_url: &Url,
        base: &Url,
        main: Option<&str>,
        ctx: &mut Ctx,
    ) {
        // Only ES modules are on the hook for the removal of the ladder.
        let format = match self.module_format(url, ctx).await {
            Ok(format) => format,
            Err(_) => return,
        };
        if format != Some(ModuleFormat::Module) {
            return;
        }
        let pjson_path = package_json_path(pjson_url);
        let package_dir = pjson_path.parent().unwrap_or(Path::new("")).display().to_string();
        let message = match main {
            Some(main) => format!(
                "Package {package_dir} has a \"main\" field set to {main:?}, excluding the full filename and extension to the resolved file at {url}, imported from {base}. Automatic extension resolution of the \"main\" field is deprecated for ES modules.",
            ),
            None => format!(
                "No \"main\" or \"exports\" field defined in the package.json for {package_dir} resolving the main entry point {url}, imported from {base}. Default \"index\" lookups for the main are deprecated for ES modules.",
            ),
        };
        self.emit_deprecation(DEP0151, &pjson_path, url.as_str(), &message);
    }

    fn emit_trailing_slash_pattern_deprecation(&self, pjson_url: &Url, match_key: &str) {
        let pjson_path = package_json_path(pjson_url);
        let message = format!(
            "Use of deprecated trailing slash pattern mapping {match_key:?} in the \"exports\" field module resolution of the package at {}. Mapping specifiers ending in \"/\" is no longer supported.",
            pjson_path.display()
        );
        self.emit_deprecation(DEP0155, &pjson_path, match_key, &message);
    }

    fn emit_folder_mapping_deprecation(&self, pjson_url: &Url, key: &str, is_imports: bool) {
        let pjson_path = package_json_path(pjson_url);
        let message = format!(
            "Use of deprecated folder mapping {key:?} in the {:?} field module resolution of the package at {}. Update this package.json to use a subpath pattern like \"{key}*\".",
            if is_imports { "imports" } else { "exports" },
            pjson_path.display()
        );
        self.emit_deprecation(DEP0148, &pjson_path, key, &message);
    }

    fn emit_invalid_segment_deprecation(
        &self,
        pjson_url: &Url,
        request: &str,
        match_key: &str,
        target: &str,
        is_imports: bool,
        is_target: bool,
    ) {
        let pjson_path = package_json_path(pjson_url);
        let message = format!(
            "Use of deprecated {} resolving {request:?} for module request {match_key:?} matched to {target:?} in the {:?} field module resolution of the package at {}.",
            if is_target { "double slash" } else { "leading or trailing slash matching" },
            if is_imports { "imports" } else { "exports" },
            pjson_path.display()
        );
        self.emit_deprecation(DEP0166, &pjson_path, request, &message);
    }

    /// Warnings deduplicate per `(code, package.json, match)` for the
    /// lifetime of the resolver.
    fn emit_deprecation(&self, code: &'static str, pjson_path: &Path, matched: &str, message: &str) {
        if !self.emitted_warnings.insert((code, pjson_path.to_path_buf(), matched.to_string())) {
            return;
        }
        match &self.options.deprecations {
            Some(sink) => sink.emit(code, message),
            None => tracing::warn!(code, "{message}"),
        }
    }

    /// PATTERN_KEY_COMPARE(keyA, keyB)
    ///
    /// Descending specificity: the greater base (prefix up to and including
    /// `*`) wins, ties go to the greater total length. An empty `key_a`
    /// stands for "no best match yet" and always loses.
    fn pattern_key_compare(key_a: &str, key_b: &str) -> Ordering {
        if key_a.is_empty() {
            return Ordering::Greater;
        }
        debug_assert!(key_a.ends_with('/') || key_a.match_indices('*').count() == 1, "{key_a}");
        debug_assert!(key_b.ends_with('/') || key_b.match_indices('*').count() == 1, "{key_b}");
        let a_pos = key_a.find('*');
        let base_length_a = a_pos.map_or(key_a.len(), |p| p + 1);
        let b_pos = key_b.find('*');
        let base_length_b = b_pos.map_or(key_b.len(), |p| p + 1);
        if base_length_a > base_length_b {
            return Ordering::Less;
        }
        if base_length_b > base_length_a {
            return Ordering::Greater;
        }
        if a_pos.is_none() {
            return Ordering::Greater;
        }
        if b_pos.is_none() {
            return Ordering::Less;
        }
        if key_a.len() > key_b.len() {
            return Ordering::Less;
        }
        if key_b.len() > key_a.len() {
            return Ordering::Greater;
        }
        Ordering::Equal
    }
}

/// `{ ".": exports }` sugar detection. A map mixing condition and subpath
/// keys is a configuration error.
fn is_conditional_exports_main_sugar(
    exports: &JSONValue,
    pjson_url: &Url,
) -> Result<bool, ResolveError> {
    match exports {
        JSONValue::String(_) | JSONValue::Array(_) => Ok(true),
        JSONValue::Object(map) => {
            let mut is_sugar = None;
            for key in map.keys() {
                let current = key.is_empty() || !key.starts_with('.');
                match is_sugar {
                    None => is_sugar = Some(current),
                    Some(previous) if previous != current => {
                        return Err(ResolveError::InvalidPackageConfig {
                            path: package_json_path(pjson_url),
                            message: "\"exports\" cannot contain some keys starting with '.' and some not; the object must either contain package subpath keys only or condition name keys only".to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
            Ok(is_sugar.unwrap_or(false))
        }
        _ => Ok(false),
    }
}

/// The request string reported in diagnostics: the matched key with its
/// capture substituted back in.
fn pattern_request(match_key: &str, capture: &str, pattern: bool) -> String {
    if pattern {
        match_key.replacen('*', capture, 1)
    } else {
        format!("{match_key}{capture}")
    }
}

fn invalid_package_target(
    pjson_url: &Url,
    match_key: &str,
    target: &str,
    is_imports: bool,
) -> ResolveError {
    ResolveError::InvalidPackageTarget {
        kind: if is_imports { "imports" } else { "exports" },
        target: target.to_string(),
        key: match_key.to_string(),
        path: package_json_path(pjson_url),
    }
}

/// ECMA-262 array index: a canonical numeric string below 2^32 - 1.
fn is_array_index(key: &str) -> bool {
    key.parse::<u32>().is_ok_and(|n| n != u32::MAX && n.to_string() == key)
}

/// Scans path segments, split on `/` or `\`, for `.`, `..` and
/// `node_modules`, case-insensitively and including percent-encoded
/// spellings.
fn check_path_segments(s: &str) -> SegmentCheck {
    let mut saw_empty = false;
    for segment in s.split(['/', '\\']) {
        if segment.is_empty() {
            saw_empty = true;
            continue;
        }
        let Ok(decoded) = percent_decode_str(segment).decode_utf8() else { continue };
        if decoded == "."
            || decoded == ".."
            || decoded.eq_ignore_ascii_case("node_modules")
        {
            return SegmentCheck::Invalid;
        }
    }
    if saw_empty {
        SegmentCheck::EmptyOnly
    } else {
        SegmentCheck::Ok
    }
}

/// File system path of a `package.json` URL, for diagnostics.
fn package_json_path(pjson_url: &Url) -> PathBuf {
    pjson_url.to_file_path().unwrap_or_else(|()| PathBuf::from(pjson_url.as_str()))
}

/// URL of the directory containing `package.json`.
fn package_dir_path(pjson_url: &Url) -> Result<Url, ResolveError> {
    pjson_url.join(".").map_err(|_| ResolveError::InvalidModuleSpecifier {
        specifier: pjson_url.to_string(),
        reason: "is not a valid package.json URL".to_string(),
    })
}

fn file_url(path: &Path) -> Result<Url, ResolveError> {
    Url::from_file_path(path).map_err(|()| ResolveError::InvalidModuleSpecifier {
        specifier: path.display().to_string(),
        reason: "is not an absolute path".to_string(),
    })
}

fn file_path(url: &Url) -> Result<PathBuf, ResolveError> {
    url.to_file_path().map_err(|()| ResolveError::InvalidModuleSpecifier {
        specifier: url.to_string(),
        reason: "is not a valid file URL".to_string(),
    })
}

fn prettify_suggestion(specifier: &str, parent_dir: &Path, found: &Path) -> String {
    if classify(specifier) == SpecifierKind::Relative {
        if let Ok(relative) = found.strip_prefix(parent_dir) {
            return format!("./{}", relative.display());
        }
    }
    let found = found.display().to_string();
    match found.rfind("node_modules/") {
        Some(index) => found[index + "node_modules/".len()..].to_string(),
        None => found,
    }
}
