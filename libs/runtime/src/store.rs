//! Module store port
//!
//! Built late modules are persisted so a later run can load them without
//! recompiling. Freshness is timestamp based: a stored module is reused while
//! its definitions file is not newer than it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::builder::ModuleArtifact;
use crate::error::{LoadError, Result};

pub trait ModuleStore: Send + Sync {
    /// Whether a stored `module` is at least as recent as `source`.
    fn is_fresh(&self, source: &Path, module: &str) -> Result<bool>;

    fn read(&self, module: &str) -> Result<ModuleArtifact>;

    fn write(&self, module: &str, artifact: &ModuleArtifact) -> Result<()>;
}

/// Store keeping `<module>.json` (the manifest) and `<module>.rs` (the
/// generated source) in one directory
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self, module: &str) -> PathBuf {
        self.root.join(format!("{}.json", module))
    }

    pub fn source_path(&self, module: &str) -> PathBuf {
        self.root.join(format!("{}.rs", module))
    }

    fn modified(path: &Path) -> Result<Option<SystemTime>> {
        match fs::metadata(path) {
            Ok(metadata) => metadata
                .modified()
                .map(Some)
                .map_err(|e| LoadError::io(path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LoadError::io(path, e)),
        }
    }
}

impl ModuleStore for FileSystemStore {
    fn is_fresh(&self, source: &Path, module: &str) -> Result<bool> {
        let Some(stored) = Self::modified(&self.manifest_path(module))? else {
            return Ok(false);
        };
        let written = Self::modified(source)?.ok_or_else(|| {
            LoadError::io(
                source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "definitions file not found"),
            )
        })?;
        Ok(written <= stored)
    }

    fn read(&self, module: &str) -> Result<ModuleArtifact> {
        let path = self.manifest_path(module);
        let text = fs::read_to_string(&path).map_err(|e| LoadError::io(&path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, module: &str, artifact: &ModuleArtifact) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| LoadError::io(&self.root, e))?;

        let source = self.source_path(module);
        fs::write(&source, &artifact.source).map_err(|e| LoadError::io(&source, e))?;

        // The manifest goes last: its timestamp marks a complete write
        let manifest = self.manifest_path(module);
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&manifest, json).map_err(|e| LoadError::io(&manifest, e))?;

        tracing::debug!(module, path = %manifest.display(), "Stored late module");
        Ok(())
    }
}
