use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;

/// All resolution errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// The parent URL handed to the resolver could not be parsed as an
    /// absolute URL.
    #[error("parent URL {0:?} must be a valid absolute URL")]
    InvalidArgType(String),

    #[error(transparent)]
    Specifier(#[from] SpecifierError),

    /// Malformed or illegal specifier, e.g. a bad package name, an invalid
    /// `imports` name, or percent-encoded path separators in the result.
    #[error("invalid module specifier {specifier:?}: {reason}")]
    InvalidModuleSpecifier { specifier: String, reason: String },

    /// The `exports` field mixes subpath and condition keys, or contains
    /// numeric keys.
    #[error("invalid package configuration in {}: {message}", .path.display())]
    InvalidPackageConfig { path: PathBuf, message: String },

    /// A target string in `exports` or `imports` violates the path rules.
    #[error("invalid {kind:?} target {target:?} defined for {key:?} in {}", .path.display())]
    InvalidPackageTarget { kind: &'static str, target: String, key: String, path: PathBuf },

    /// No `exports` entry matched the requested subpath.
    #[error("package subpath {subpath:?} is not defined by \"exports\" in {}", .path.display())]
    PackageSubpathNotExported { subpath: String, path: PathBuf },

    /// No `imports` entry matched a `#` specifier.
    #[error("package import specifier {specifier:?} is not defined{}", imports_scope(.path))]
    PackageImportNotDefined { specifier: String, path: Option<PathBuf> },

    /// The final path does not exist, or the `node_modules` directory chain
    /// was exhausted.
    #[error("cannot find module {specifier:?}{}", did_you_mean(.suggestion))]
    ModuleNotFound { specifier: String, suggestion: Option<String> },

    /// The final path names a directory.
    #[error("directory import {:?} is not supported when resolving ES modules{}", .path.display(), did_you_mean(.suggestion))]
    UnsupportedDirectoryImport { path: PathBuf, suggestion: Option<String> },

    /// A module loaded over the network attempted to import a disallowed
    /// scheme.
    #[error("import of {specifier:?} by {parent} is not supported: {reason}")]
    NetworkImportDisallowed { specifier: String, parent: String, reason: &'static str },

    /// The specifier parsed as an absolute URL with a scheme the loader does
    /// not handle.
    #[error("only file and data URLs are supported by the default ESM loader, received scheme {0:?}")]
    UnsupportedUrlScheme(String),

    /// An input type was configured but the entry point resolved through the
    /// file namespace.
    #[error("the module input type can only be used with string input")]
    InputTypeNotAllowed,

    /// The installed policy manifest has no mapping for this dependency edge.
    #[error("the policy manifest defines no dependency mapping for {specifier:?} from {parent}")]
    ManifestDependencyMissing { specifier: String, parent: String },

    /// An `imports` entry re-exported a chain of bare specifiers that never
    /// terminated.
    #[error("encountered recursion while resolving")]
    Recursion,

    /// A `package.json` that failed to parse.
    #[error(transparent)]
    Json(#[from] JSONError),

    #[error(transparent)]
    IOError(#[from] IOError),
}

impl ResolveError {
    pub(crate) fn from_serde_json_error(path: PathBuf, error: &serde_json::Error) -> Self {
        Self::Json(JSONError {
            path,
            message: error.to_string(),
            line: error.line(),
            column: error.column(),
        })
    }
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> Self {
        Self::IOError(IOError(Arc::new(err)))
    }
}

/// Syntactically invalid specifiers, rejected before any resolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpecifierError {
    #[error("the module specifier is an empty string")]
    Empty,
}

/// JSON parse error with location, so a broken `package.json` points at the
/// offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} in {} at line {line} column {column}", .path.display())]
pub struct JSONError {
    pub path: PathBuf,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IOError(Arc<io::Error>);

// Compare kinds so resolution results stay comparable in tests.
impl PartialEq for IOError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map_or_else(String::new, |found| format!("\nDid you mean to import {found:?}?"))
}

fn imports_scope(path: &Option<PathBuf>) -> String {
    path.as_ref().map_or_else(String::new, |path| format!(" in package {}", path.display()))
}
