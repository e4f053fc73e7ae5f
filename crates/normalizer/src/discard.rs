use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::info;
use crate::config::NormalizerConfig;
use crate::error::ActionError;

/// Recoverable removal of a file
pub trait Discarder: Send + Sync {
    /// Remove `path` from its current location, returning where it went
    fn discard(&self, path: &Path) -> Result<PathBuf, ActionError>;
}

/// Build the discarder the configuration asks for
pub fn from_config(cfg: &NormalizerConfig) -> Arc<dyn Discarder> {
    match &cfg.discard_dir {
        Some(dir) => Arc::new(DirectoryDiscarder::new(dir.clone())),
        None => Arc::new(TrashDiscarder),
    }
}

/// Sends files to the desktop recycle bin
#[derive(Debug, Clone, Copy, Default)]
pub struct TrashDiscarder;

impl Discarder for TrashDiscarder {
    fn discard(&self, path: &Path) -> Result<PathBuf, ActionError> {
        info!("🗑️  Trashing: {}", path.display());
        trash::delete(path).map_err(|e| ActionError::Discard {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(PathBuf::from("<trash>").join(path.file_name().unwrap_or_default()))
    }
}

/// Renames files into a holding directory on the same filesystem
#[derive(Debug, Clone)]
pub struct DirectoryDiscarder {
    dir: PathBuf,
}

impl DirectoryDiscarder {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// First free `name`, `name.1`, `name.2`, ... in the discard directory
    fn free_slot(&self, path: &Path) -> Result<PathBuf, ActionError> {
        let name = path.file_name().ok_or_else(|| ActionError::Discard {
            path: path.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?;
        let first = self.dir.join(name);
        if !first.exists() {
            return Ok(first);
        }
        let mut n: u32 = 1;
        loop {
            let mut numbered = name.to_os_string();
            numbered.push(format!(".{}", n));
            let candidate = self.dir.join(numbered);
            if !candidate.exists() {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

impl Discarder for DirectoryDiscarder {
    fn discard(&self, path: &Path) -> Result<PathBuf, ActionError> {
        let target = self.free_slot(path)?;
        info!("🗑️  Discarding {} -> {}", path.display(), target.display());
        std::fs::rename(path, &target).map_err(|source| ActionError::Rename {
            from: path.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        Ok(target)
    }
}
