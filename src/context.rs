use std::path::{Path, PathBuf};

use crate::error::ResolveError;

/// `imports` entries may re-export bare specifiers, which re-enters the
/// package resolver. Mutually re-exporting packages would otherwise loop
/// forever.
const RECURSION_LIMIT: u8 = 64;

/// Per-resolution scratch state.
#[derive(Debug, Default)]
pub struct ResolveContext {
    depth: u8,

    pub file_dependencies: Option<Vec<PathBuf>>,

    pub missing_dependencies: Option<Vec<PathBuf>>,
}

impl ResolveContext {
    pub fn init_file_dependencies(&mut self) {
        self.file_dependencies = Some(vec![]);
        self.missing_dependencies = Some(vec![]);
    }

    pub fn add_file_dependency(&mut self, path: &Path) {
        if let Some(deps) = &mut self.file_dependencies {
            deps.push(path.to_path_buf());
        }
    }

    pub fn add_missing_dependency(&mut self, path: &Path) {
        if let Some(deps) = &mut self.missing_dependencies {
            deps.push(path.to_path_buf());
        }
    }

    pub fn test_for_infinite_recursion(&mut self) -> Result<(), ResolveError> {
        self.depth += 1;
        if self.depth > RECURSION_LIMIT {
            return Err(ResolveError::Recursion);
        }
        Ok(())
    }
}
