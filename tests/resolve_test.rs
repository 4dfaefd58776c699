//! Test public APIs against the on-disk fixtures.

use std::{env, path::PathBuf};

use url::Url;

use esm_resolver::{ModuleFormat, ResolveError, Resolver};

fn fixture() -> PathBuf {
    env::current_dir().unwrap().join("fixtures")
}

fn parent() -> String {
    Url::from_file_path(fixture().join("main.mjs")).unwrap().to_string()
}

#[tokio::test]
async fn package_main_export() {
    let resolver = Resolver::default();
    let resolution = resolver.resolve("sample-pkg", Some(&parent())).await.unwrap();
    assert_eq!(
        resolution.path(),
        Some(fixture().join("node_modules/sample-pkg/lib/index.mjs"))
    );
    assert_eq!(resolution.format(), Some(ModuleFormat::Module));
    assert_eq!(
        resolution.package_json().map(|p| p.name.clone()),
        Some(Some("sample-pkg".to_string()))
    );
}

#[tokio::test]
async fn conditional_subpath_export() {
    let resolver = Resolver::default();
    let resolution = resolver.resolve("sample-pkg/feature", Some(&parent())).await.unwrap();
    assert_eq!(
        resolution.path(),
        Some(fixture().join("node_modules/sample-pkg/lib/feature-node.mjs"))
    );
}

#[tokio::test]
async fn private_imports_mapping() {
    let resolver = Resolver::default();
    let resolution = resolver.resolve("#shared/util", Some(&parent())).await.unwrap();
    assert_eq!(resolution.path(), Some(fixture().join("shared/util.mjs")));
}

#[tokio::test]
async fn legacy_main() {
    let resolver = Resolver::default();
    let resolution = resolver.resolve("legacy-pkg", Some(&parent())).await.unwrap();
    assert_eq!(
        resolution.path(),
        Some(fixture().join("node_modules/legacy-pkg/server.js"))
    );
    assert_eq!(resolution.format(), Some(ModuleFormat::CommonJs));
}

#[tokio::test]
async fn relative_sibling() {
    let resolver = Resolver::default();
    let resolution = resolver.resolve("./shared/util.mjs", Some(&parent())).await.unwrap();
    assert_eq!(resolution.path(), Some(fixture().join("shared/util.mjs")));
}

#[tokio::test]
async fn data_url() {
    let resolver = Resolver::default();
    let specifier = "data:text/javascript,export%20default%201;";
    let resolution = resolver.resolve(specifier, Some(&parent())).await.unwrap();
    assert_eq!(resolution.url().as_str(), specifier);
}

#[tokio::test]
async fn unknown_package() {
    let resolver = Resolver::default();
    let err = resolver.resolve("ghost-pkg", Some(&parent())).await.unwrap_err();
    assert!(matches!(err, ResolveError::ModuleNotFound { .. }), "{err:?}");
}
