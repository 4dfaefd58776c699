use std::{
    borrow::Borrow,
    convert::AsRef,
    hash::{BuildHasherDefault, Hash, Hasher},
    io,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashSet;
use futures::future::BoxFuture;
use rustc_hash::FxHasher;
use tokio::sync::OnceCell as OnceLock;

use crate::{
    context::ResolveContext as Ctx, package_json::PackageJson, FileMetadata, FileSystem,
    ResolveError, ResolveOptions,
};

/// Process-lifetime memoization of file system observations.
///
/// Each interned path carries its stat metadata, canonicalized form (the
/// realpath cache) and parsed `package.json` (the package config reader
/// memo). Entries never invalidate.
#[derive(Default)]
pub struct Cache<Fs> {
    pub(crate) fs: Fs,
    paths: DashSet<CachedPath, BuildHasherDefault<IdentityHasher>>,
}

impl<Fs: Send + Sync + FileSystem> Cache<Fs> {
    pub fn new(fs: Fs) -> Self {
        Self { fs, paths: DashSet::default() }
    }

    pub fn clear(&self) {
        self.paths.clear();
    }

    pub fn value(&self, path: &Path) -> CachedPath {
        let hash = {
            let mut hasher = FxHasher::default();
            path.hash(&mut hasher);
            hasher.finish()
        };
        if let Some(cache_entry) = self.paths.get((hash, path).borrow() as &dyn CacheKey) {
            return cache_entry.clone();
        }
        let parent = path.parent().map(|p| self.value(p));
        let data =
            CachedPath(Arc::new(CachedPathImpl::new(hash, path.to_path_buf().into_boxed_path(), parent)));
        self.paths.insert(data.clone());
        data
    }
}

#[derive(Clone)]
pub struct CachedPath(Arc<CachedPathImpl>);

impl Hash for CachedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl PartialEq for CachedPath {
    fn eq(&self, other: &Self) -> bool {
        self.0.path == other.0.path
    }
}
impl Eq for CachedPath {}

impl Deref for CachedPath {
    type Target = CachedPathImpl;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl<'a> Borrow<dyn CacheKey + 'a> for CachedPath {
    fn borrow(&self) -> &(dyn CacheKey + 'a) {
        self
    }
}

impl AsRef<CachedPathImpl> for CachedPath {
    fn as_ref(&self) -> &CachedPathImpl {
        self.0.as_ref()
    }
}

impl CacheKey for CachedPath {
    fn tuple(&self) -> (u64, &Path) {
        (self.hash, &self.path)
    }
}

pub struct CachedPathImpl {
    hash: u64,
    path: Box<Path>,
    parent: Option<CachedPath>,
    meta: OnceLock<Option<FileMetadata>>,
    canonicalized: OnceLock<Option<PathBuf>>,
    package_json: OnceLock<Option<Arc<PackageJson>>>,
}

impl CachedPathImpl {
    fn new(hash: u64, path: Box<Path>, parent: Option<CachedPath>) -> Self {
        Self {
            hash,
            path,
            parent,
            meta: OnceLock::new(),
            canonicalized: OnceLock::new(),
            package_json: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }

    pub fn parent(&self) -> Option<&CachedPath> {
        self.parent.as_ref()
    }

    async fn meta<Fs: Send + Sync + FileSystem>(&self, fs: &Fs) -> Option<FileMetadata> {
        *self.meta.get_or_init(|| async { fs.metadata(&self.path).await.ok() }).await
    }

    pub async fn is_file<Fs: Send + Sync + FileSystem>(&self, fs: &Fs, ctx: &mut Ctx) -> bool {
        if let Some(meta) = self.meta(fs).await {
            ctx.add_file_dependency(self.path());
            meta.is_file
        } else {
            ctx.add_missing_dependency(self.path());
            false
        }
    }

    pub async fn is_dir<Fs: Send + Sync + FileSystem>(&self, fs: &Fs, ctx: &mut Ctx) -> bool {
        self.meta(fs).await.map_or_else(
            || {
                ctx.add_missing_dependency(self.path());
                false
            },
            |meta| meta.is_dir,
        )
    }

    /// Canonical form of this path, memoized for the process lifetime.
    ///
    /// Only paths whose own entry is a symbolic link hit the file system;
    /// everything else re-joins onto the canonicalized parent.
    pub fn realpath<'a, Fs: FileSystem + Send + Sync>(
        &'a self,
        fs: &'a Fs,
    ) -> BoxFuture<'a, io::Result<PathBuf>> {
        let fut = async move {
            self.canonicalized
                .get_or_try_init(|| async move {
                    if fs.symlink_metadata(&self.path).await.is_ok_and(|m| m.is_symlink) {
                        return fs.canonicalize(&self.path).await.map(Some);
                    }
                    if let Some(parent) = self.parent() {
                        let parent_path = parent.realpath(fs).await?;
                        return Ok(Some(
                            parent_path.join(self.path.strip_prefix(&parent.path).unwrap()),
                        ));
                    }
                    Ok(None)
                })
                .await
                .cloned()
                .map(|r| r.unwrap_or_else(|| self.path.clone().to_path_buf()))
        };
        Box::pin(fut)
    }

    /// Get package.json of the given directory.
    ///
    /// # Errors
    ///
    /// * [ResolveError::Json]
    #[cfg_attr(feature="enable_instrument", tracing::instrument(level=tracing::Level::DEBUG, skip_all, fields(path = %self.path.display())))]
    pub async fn package_json<Fs: FileSystem + Send + Sync>(
        &self,
        fs: &Fs,
        options: &ResolveOptions,
        ctx: &mut Ctx,
    ) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        let result = self
            .package_json
            .get_or_try_init(|| async {
                let package_json_path = self.path.join("package.json");
                let Ok(package_json_string) = fs.read_to_string(&package_json_path).await else {
                    return Ok(None);
                };
                let real_path = if options.preserve_symlinks {
                    package_json_path.clone()
                } else {
                    self.realpath(fs).await?.join("package.json")
                };
                PackageJson::parse(package_json_path, real_path, &package_json_string)
                    .map(|package_json| Some(Arc::new(package_json)))
            })
            .await
            .cloned();

        match &result {
            Ok(Some(package_json)) => {
                ctx.add_file_dependency(&package_json.path);
            }
            Ok(None) => {
                ctx.add_missing_dependency(&self.path.join("package.json"));
            }
            Err(_) => {
                ctx.add_file_dependency(&self.path.join("package.json"));
            }
        }
        result
    }
}

/// Memoized cache key, code adapted from <https://stackoverflow.com/a/50478038>.
trait CacheKey {
    fn tuple(&self) -> (u64, &Path);
}

impl Hash for dyn CacheKey + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tuple().0.hash(state);
    }
}

impl PartialEq for dyn CacheKey + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.tuple().1 == other.tuple().1
    }
}

impl Eq for dyn CacheKey + '_ {}

impl CacheKey for (u64, &Path) {
    fn tuple(&self) -> (u64, &Path) {
        (self.0, self.1)
    }
}

impl<'a> Borrow<dyn CacheKey + 'a> for (u64, &'a Path) {
    fn borrow(&self) -> &(dyn CacheKey + 'a) {
        self
    }
}

/// Since the cache key is memoized, use an identity hasher
/// to avoid double hashing.
#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn write(&mut self, _: &[u8]) {
        unreachable!("Invalid use of IdentityHasher")
    }
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}
