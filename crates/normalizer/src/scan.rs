use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use walkdir::WalkDir;
use crate::config::NormalizerConfig;

/// A media file discovered under the input root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub stem: String,
}

impl SourceFile {
    /// File name including extension
    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or(&self.stem)
    }
}

/// List recognized media files under the configured input root, oldest first.
///
/// Ties in modification time keep walk order, which is sorted by file name so
/// the sequence is reproducible between runs. The output, archive and discard
/// directories are skipped when they sit inside the input root.
pub fn list_sources(cfg: &NormalizerConfig) -> Result<Vec<SourceFile>> {
    let root = std::fs::canonicalize(&cfg.input_root)
        .with_context(|| format!("Input root is not accessible: {}", cfg.input_root.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Input root is not a directory: {}", root.display());
    }

    let excluded: Vec<PathBuf> = [Some(&cfg.output_root), Some(&cfg.archive_root), cfg.discard_dir.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .filter(|p| p != &root)
        .collect();

    info!("Scanning directory: {}", root.display());

    let mut sources = Vec::new();
    let mut entry_count = 0;
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path(), &excluded));

    for entry in walker {
        entry_count += 1;
        if entry_count % 1000 == 0 {
            info!("Scanned {} entries so far in {}...", entry_count, root.display());
        }

        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let recognized = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| cfg.is_recognized_extension(ext))
            .unwrap_or(false);
        if !recognized {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };

        let modified = match entry.metadata().map_err(std::io::Error::from).and_then(|m| m.modified()) {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(e) => {
                warn!("Skipping {}: cannot read modification time: {}", path.display(), e);
                continue;
            }
        };

        debug!("Found media file: {}", path.display());
        sources.push(SourceFile {
            path: path.to_path_buf(),
            modified,
            stem: stem.to_string(),
        });
    }

    // stable: equal timestamps keep walk order
    sources.sort_by_key(|s| s.modified);

    info!("Scan complete: {} entries, {} media files", entry_count, sources.len());
    Ok(sources)
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|ex| path == ex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, secs_after_epoch: u64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let f = File::create(path).unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch)).unwrap();
    }

    fn config_for(root: &Path) -> NormalizerConfig {
        NormalizerConfig {
            input_root: root.join("in"),
            output_root: root.join("out"),
            archive_root: root.join("archive"),
            ..Default::default()
        }
    }

    #[test]
    fn test_filters_extensions_and_orders_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let input = &cfg.input_root;

        touch(&input.join("b.mkv"), 3_000);
        touch(&input.join("nested/a.MP4"), 1_000);
        touch(&input.join("c.avi"), 2_000);
        touch(&input.join("notes.txt"), 500);
        touch(&input.join("clip.webm"), 500);

        let sources = list_sources(&cfg).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.file_name().to_string()).collect();
        assert_eq!(names, vec!["a.MP4", "c.avi", "b.mkv"]);
        assert!(sources.iter().all(|s| s.path.is_absolute()));
        assert_eq!(sources[0].stem, "a");
    }

    #[test]
    fn test_equal_mtimes_keep_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        for name in ["z.mov", "m.mkv", "a.mp4"] {
            touch(&cfg.input_root.join(name), 42);
        }

        let sources = list_sources(&cfg).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.file_name().to_string()).collect();
        assert_eq!(names, vec!["a.mp4", "m.mkv", "z.mov"]);
    }

    #[test]
    fn test_nested_output_roots_are_not_rescanned() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("library");
        let cfg = NormalizerConfig {
            input_root: input.clone(),
            output_root: input.join("done"),
            archive_root: input.join("originals"),
            ..Default::default()
        };
        touch(&input.join("todo.avi"), 10);
        touch(&input.join("done/todo.mkv"), 20);
        touch(&input.join("originals/old.avi"), 5);

        let sources = list_sources(&cfg).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].file_name(), "todo.avi");
    }

    #[test]
    fn test_inaccessible_root_is_error() {
        let cfg = NormalizerConfig {
            input_root: PathBuf::from("/nonexistent/hevcnorm/input"),
            ..Default::default()
        };
        assert!(list_sources(&cfg).is_err());
    }
}
