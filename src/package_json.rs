//! `package.json` definitions, limited to the fields module resolution reads.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value as JSONValue;

use crate::error::ResolveError;

/// A JSON object with source key order preserved.
///
/// Insertion order is load-bearing: conditional `exports`/`imports` maps are
/// scanned first-applicable-wins in the order keys appear in `package.json`.
pub type JSONMap = serde_json::Map<String, JSONValue>;

/// The `type` field.
///
/// <https://nodejs.org/api/packages.html#type>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Module,
    CommonJs,
}

impl Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::CommonJs => write!(f, "commonjs"),
        }
    }
}

/// Deserialized package.json
#[derive(Debug, Default)]
pub struct PackageJson {
    /// Path to `package.json`. Contains the `package.json` filename.
    pub path: PathBuf,

    /// Realpath to `package.json`. Contains the `package.json` filename.
    pub realpath: PathBuf,

    /// The "name" field defines your package's name.
    /// The "name" field can be used in addition to the "exports" field to
    /// self-reference a package using its name.
    ///
    /// <https://nodejs.org/api/packages.html#name>
    pub name: Option<String>,

    /// The "main" field defines the entry point of a package when imported by
    /// name via a node_modules lookup. Its value is a path.
    ///
    /// <https://nodejs.org/api/packages.html#main>
    pub main: Option<String>,

    /// The "type" field.
    pub r#type: Option<ModuleType>,

    exports: Option<JSONValue>,

    imports: Option<JSONValue>,
}

impl PackageJson {
    pub(crate) fn parse(path: PathBuf, realpath: PathBuf, json: &str) -> Result<Self, ResolveError> {
        let value: JSONValue = serde_json::from_str(json)
            .map_err(|error| ResolveError::from_serde_json_error(path.clone(), &error))?;

        let mut package_json = Self { path, realpath, ..Self::default() };
        // Anything other than a top level object is tolerated, the fields are
        // simply absent.
        if let JSONValue::Object(object) = value {
            package_json.name =
                object.get("name").and_then(JSONValue::as_str).map(ToString::to_string);
            package_json.main =
                object.get("main").and_then(JSONValue::as_str).map(ToString::to_string);
            // Unknown module types are ignored for forwards compatibility.
            package_json.r#type = object
                .get("type")
                .cloned()
                .and_then(|value| serde_json::from_value::<ModuleType>(value).ok());
            package_json.exports = object.get("exports").cloned();
            package_json.imports = object.get("imports").cloned();
        }
        Ok(package_json)
    }

    /// Directory to `package.json`.
    ///
    /// # Panics
    ///
    /// * When the package.json path is misconfigured.
    pub fn directory(&self) -> &Path {
        debug_assert!(self.realpath.file_name().is_some_and(|x| x == "package.json"));
        self.realpath.parent().unwrap()
    }

    /// The "exports" field allows defining the entry points of a package when
    /// imported by name loaded either via a node_modules lookup or a
    /// self-reference to its own name.
    ///
    /// `Some(Null)` is an explicit `"exports": null`, which callers treat the
    /// same as an absent field.
    ///
    /// <https://nodejs.org/api/packages.html#exports>
    pub fn exports(&self) -> Option<&JSONValue> {
        self.exports.as_ref()
    }

    /// The "imports" field creates private mappings that only apply to import
    /// specifiers from within the package itself. Only an object form is
    /// valid.
    ///
    /// <https://nodejs.org/api/packages.html#subpath-imports>
    pub fn imports(&self) -> Option<&JSONMap> {
        self.imports.as_ref().and_then(JSONValue::as_object)
    }
}
