mod builtins;
mod imports_field;
mod memory_fs;
mod patterns;

use std::sync::Mutex;

pub use memory_fs::MemoryFS;

use crate::{DeprecationSink, ResolveOptions, ResolverGeneric};

/// Build a resolver over an in-memory tree.
fn resolver(files: &[(&'static str, &'static str)]) -> ResolverGeneric<MemoryFS> {
    resolver_with_options(files, ResolveOptions::default())
}

fn resolver_with_options(
    files: &[(&'static str, &'static str)],
    options: ResolveOptions,
) -> ResolverGeneric<MemoryFS> {
    ResolverGeneric::new_with_file_system(MemoryFS::new(files), options)
}

/// Sink capturing deprecation warnings for assertions.
#[derive(Debug, Default)]
struct WarningCollector(Mutex<Vec<(&'static str, String)>>);

impl DeprecationSink for WarningCollector {
    fn emit(&self, code: &'static str, message: &str) {
        self.0.lock().unwrap().push((code, message.to_string()));
    }
}

impl WarningCollector {
    fn codes(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(|(code, _)| *code).collect()
    }
}
