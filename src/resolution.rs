use std::{path::PathBuf, sync::Arc};

use url::Url;

use crate::{format::ModuleFormat, package_json::PackageJson};

/// The result of a successful resolution: the absolute URL of the module to
/// load, plus what could be learned about it on the way there.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub(crate) url: Url,

    pub(crate) format: Option<ModuleFormat>,

    pub(crate) package_json: Option<Arc<PackageJson>>,
}

impl Resolution {
    /// Absolute URL of the module. For `file:` URLs, symbolic links are
    /// canonicalized unless symlink preservation is configured.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn into_url(self) -> Url {
        self.url
    }

    /// Format verdict for the module, when one could be made without reading
    /// its source.
    pub fn format(&self) -> Option<ModuleFormat> {
        self.format
    }

    /// `package.json` of the enclosing package scope, for `file:` results
    /// inside one.
    pub fn package_json(&self) -> Option<&Arc<PackageJson>> {
        self.package_json.as_ref()
    }

    /// File system path for `file:` results.
    pub fn path(&self) -> Option<PathBuf> {
        (self.url.scheme() == "file").then(|| self.url.to_file_path().ok()).flatten()
    }
}
