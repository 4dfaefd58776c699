//! Resolution of `#…` specifiers through the `imports` field of the
//! enclosing package.

use super::resolver;
use crate::ResolveError;

const PARENT: Option<&str> = Some("file:///app/main.js");

#[tokio::test]
async fn literal() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#dep":"./impl.js"}}"##),
        ("/app/impl.js", ""),
        ("/app/main.js", ""),
    ]);
    let resolution = f.resolve("#dep", PARENT).await.unwrap();
    assert_eq!(resolution.url().as_str(), "file:///app/impl.js");
}

#[tokio::test]
async fn pattern() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#a/*":"./lib/*.js"}}"##),
        ("/app/lib/foo.js", ""),
        ("/app/main.js", ""),
    ]);
    let resolution = f.resolve("#a/foo", PARENT).await.unwrap();
    assert_eq!(resolution.url().as_str(), "file:///app/lib/foo.js");
}

#[tokio::test]
async fn conditions() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#c":{"node":"./n.js","default":"./d.js"}}}"##),
        ("/app/n.js", ""),
        ("/app/d.js", ""),
        ("/app/main.js", ""),
    ]);
    let resolution = f.resolve("#c", PARENT).await.unwrap();
    assert_eq!(resolution.url().as_str(), "file:///app/n.js");
}

#[tokio::test]
async fn bare_re_export() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#ext":"ext-pkg"}}"##),
        ("/app/node_modules/ext-pkg/package.json", r##"{"name":"ext-pkg","exports":"./main.js"}"##),
        ("/app/node_modules/ext-pkg/main.js", ""),
        ("/app/main.js", ""),
    ]);
    let resolution = f.resolve("#ext", PARENT).await.unwrap();
    assert_eq!(resolution.url().as_str(), "file:///app/node_modules/ext-pkg/main.js");
}

#[tokio::test]
async fn bare_re_export_with_pattern_substitution() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#u/*":"dep/*"}}"##),
        ("/app/node_modules/dep/package.json", r##"{"name":"dep","exports":{"./x":"./x.js"}}"##),
        ("/app/node_modules/dep/x.js", ""),
        ("/app/main.js", ""),
    ]);
    let resolution = f.resolve("#u/x", PARENT).await.unwrap();
    assert_eq!(resolution.url().as_str(), "file:///app/node_modules/dep/x.js");
}

#[tokio::test]
async fn invalid_names() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#a":"./a.js"}}"##),
        ("/app/a.js", ""),
        ("/app/main.js", ""),
    ]);
    for name in ["#", "#/z", "#z/"] {
        let err = f.resolve(name, PARENT).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidModuleSpecifier { .. }), "{name}: {err:?}");
    }
}

#[tokio::test]
async fn unlisted_name_is_not_defined() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#a":"./a.js"}}"##),
        ("/app/a.js", ""),
        ("/app/main.js", ""),
    ]);
    let err = f.resolve("#nope", PARENT).await.unwrap_err();
    assert!(
        matches!(&err, ResolveError::PackageImportNotDefined { specifier, .. } if specifier == "#nope"),
        "{err:?}"
    );
}

#[tokio::test]
async fn null_target_is_not_defined() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#blocked":null}}"##),
        ("/app/main.js", ""),
    ]);
    let err = f.resolve("#blocked", PARENT).await.unwrap_err();
    assert!(matches!(err, ResolveError::PackageImportNotDefined { .. }), "{err:?}");
}

#[tokio::test]
async fn without_an_enclosing_scope() {
    let f = resolver(&[("/lone/main.js", "")]);
    let err = f.resolve("#a", Some("file:///lone/main.js")).await.unwrap_err();
    assert!(
        matches!(&err, ResolveError::PackageImportNotDefined { path: None, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn relative_targets_stay_inside_the_package() {
    let f = resolver(&[
        ("/app/package.json", r##"{"imports":{"#esc":"../outside.js"}}"##),
        ("/outside.js", ""),
        ("/app/main.js", ""),
    ]);
    let err = f.resolve("#esc", PARENT).await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidPackageTarget { kind: "imports", .. }), "{err:?}");
}
