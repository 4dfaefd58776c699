//! Module format classification for resolved URLs.

use std::fmt::Display;

use url::Url;

/// Format of a resolved module, reported alongside the URL.
///
/// The `.js` extension is ambiguous on its own, its verdict follows the
/// `type` field of the enclosing package scope. `.mjs` is always
/// [ModuleFormat::Module], regardless of the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Builtin,
    CommonJs,
    Module,
    Json,
    Wasm,
}

impl Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::CommonJs => write!(f, "commonjs"),
            Self::Module => write!(f, "module"),
            Self::Json => write!(f, "json"),
            Self::Wasm => write!(f, "wasm"),
        }
    }
}

/// Format of a `data:` URL, decided by its mime type.
pub(crate) fn data_url_format(url: &Url) -> Option<ModuleFormat> {
    let mime = url.path().split([';', ',']).next().unwrap_or_default();
    match mime {
        "text/javascript" => Some(ModuleFormat::Module),
        "application/json" => Some(ModuleFormat::Json),
        "application/wasm" => Some(ModuleFormat::Wasm),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{data_url_format, ModuleFormat};

    #[test]
    fn data_urls() {
        let cases = [
            ("data:text/javascript,console.log(1)", Some(ModuleFormat::Module)),
            ("data:text/javascript;base64,AA==", Some(ModuleFormat::Module)),
            ("data:application/json,{}", Some(ModuleFormat::Json)),
            ("data:application/wasm;base64,AA==", Some(ModuleFormat::Wasm)),
            ("data:text/plain,hello", None),
        ];
        for (url, expected) in cases {
            assert_eq!(data_url_format(&Url::parse(url).unwrap()), expected, "{url}");
        }
    }
}
