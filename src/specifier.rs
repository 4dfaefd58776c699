//! Specifier classification and bare package name parsing.

use url::Url;

use crate::error::ResolveError;

/// Coarse shape of a module specifier, decided before any file system access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `""`
    Empty,
    /// `/usr/lib/x.mjs`
    Absolute,
    /// `.`, `..`, `./x`, `../x`
    Relative,
    /// `#internal`
    Private,
    /// Parses as an absolute URL, e.g. `node:fs` or `data:text/javascript,`
    Url,
    /// `lodash`, `@scope/pkg/sub`
    Bare,
}

pub fn classify(specifier: &str) -> SpecifierKind {
    match specifier.as_bytes().first() {
        None => SpecifierKind::Empty,
        Some(b'/') => SpecifierKind::Absolute,
        Some(b'.') if is_relative(specifier) => SpecifierKind::Relative,
        Some(b'#') => SpecifierKind::Private,
        _ => {
            if Url::parse(specifier).is_ok() {
                SpecifierKind::Url
            } else {
                SpecifierKind::Bare
            }
        }
    }
}

/// `.`, `./…`, `..` or `../…`
fn is_relative(specifier: &str) -> bool {
    let bytes = specifier.as_bytes();
    debug_assert_eq!(bytes.first(), Some(&b'.'));
    match bytes.get(1) {
        None | Some(b'/') => true,
        Some(b'.') => matches!(bytes.get(2), None | Some(b'/')),
        Some(_) => false,
    }
}

/// Splits a bare specifier into `(name, subpath, is_scoped)`.
///
/// The subpath is normalized to begin with `.`, i.e. `"."` or `"./feature"`.
///
/// # Errors
///
/// * [ResolveError::InvalidModuleSpecifier] for names that are empty, begin
///   with `.`, contain `%` or `\`, or scoped names without a package part.
pub fn parse_package_name<'s>(
    specifier: &'s str,
    base: &Url,
) -> Result<(&'s str, String, bool), ResolveError> {
    let mut separator_index = specifier.find('/');
    let mut valid_package_name = !specifier.is_empty();
    let mut is_scoped = false;
    if specifier.starts_with('@') {
        is_scoped = true;
        match separator_index {
            // `@scope` without a package part
            None => valid_package_name = false,
            // The name spans through the second `/`'s predecessor.
            Some(index) => {
                separator_index = specifier[index + 1..].find('/').map(|i| i + index + 1);
            }
        }
    }
    let package_name = separator_index.map_or(specifier, |index| &specifier[..index]);
    if package_name.starts_with('.') || package_name.contains(['%', '\\']) {
        valid_package_name = false;
    }
    if !valid_package_name {
        return Err(ResolveError::InvalidModuleSpecifier {
            specifier: specifier.to_string(),
            reason: format!("is not a valid package name (imported from {base})"),
        });
    }
    let package_subpath =
        separator_index.map_or_else(|| ".".to_string(), |index| format!(".{}", &specifier[index..]));
    Ok((package_name, package_subpath, is_scoped))
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{classify, parse_package_name, SpecifierKind};

    #[test]
    fn classification() {
        let cases = [
            ("", SpecifierKind::Empty),
            ("/usr/x.mjs", SpecifierKind::Absolute),
            (".", SpecifierKind::Relative),
            ("..", SpecifierKind::Relative),
            ("./x", SpecifierKind::Relative),
            ("../x", SpecifierKind::Relative),
            (".hidden", SpecifierKind::Bare),
            ("..x", SpecifierKind::Bare),
            ("#internal", SpecifierKind::Private),
            ("node:fs", SpecifierKind::Url),
            ("data:text/javascript,", SpecifierKind::Url),
            ("https://example.com/x.mjs", SpecifierKind::Url),
            ("lodash", SpecifierKind::Bare),
            ("@scope/pkg/sub", SpecifierKind::Bare),
        ];
        for (specifier, expected) in cases {
            assert_eq!(classify(specifier), expected, "{specifier}");
        }
    }

    #[test]
    fn package_names() {
        let base = Url::parse("file:///app/index.js").unwrap();
        let cases = [
            ("lodash", ("lodash", ".", false)),
            ("lodash/fp", ("lodash", "./fp", false)),
            ("lodash/fp/extra", ("lodash", "./fp/extra", false)),
            ("@scope/pkg", ("@scope/pkg", ".", true)),
            ("@scope/pkg/sub/path", ("@scope/pkg", "./sub/path", true)),
        ];
        for (specifier, (name, subpath, scoped)) in cases {
            let parsed = parse_package_name(specifier, &base).unwrap();
            assert_eq!(parsed, (name, subpath.to_string(), scoped), "{specifier}");
        }
    }

    #[test]
    fn invalid_package_names() {
        let base = Url::parse("file:///app/index.js").unwrap();
        for specifier in ["", ".hidden", "pkg%2fescape", "back\\slash", "@scope"] {
            assert!(parse_package_name(specifier, &base).is_err(), "{specifier}");
        }
    }
}
