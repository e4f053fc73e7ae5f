//! Terminal actions for a resolved disposition.
//!
//! Every action either renames within one filesystem or discards recoverably,
//! so a batch interrupted at any point can simply be run again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use log::{error, info, warn};
use crate::config::NormalizerConfig;
use crate::discard::Discarder;
use crate::disposition::Disposition;
use crate::error::ActionError;
use crate::outcome::FileStatus;
use crate::scan::SourceFile;
use crate::transcode::Transcoder;

/// Create the output and archive roots (and discard directory) if missing
pub fn prepare_roots(cfg: &NormalizerConfig) -> Result<()> {
    let dirs = [Some(&cfg.output_root), Some(&cfg.archive_root), cfg.discard_dir.as_ref()];
    for dir in dirs.into_iter().flatten() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

/// Outcome of a rename that refuses to replace an existing file
#[derive(Debug, PartialEq, Eq)]
pub enum MoveResult {
    Moved,
    Occupied,
}

/// Atomic rename of `from` to `to`, unless `to` already exists.
///
/// A cross-filesystem rename fails rather than falling back to copy and delete.
pub fn move_no_clobber(from: &Path, to: &Path) -> Result<MoveResult, ActionError> {
    if to.exists() {
        return Ok(MoveResult::Occupied);
    }
    std::fs::rename(from, to).map_err(|source| ActionError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(MoveResult::Moved)
}

/// Carries out dispositions against the filesystem and the encoder
#[derive(Clone)]
pub struct Reconciler {
    cfg: Arc<NormalizerConfig>,
    transcoder: Arc<dyn Transcoder>,
    discarder: Arc<dyn Discarder>,
}

impl Reconciler {
    pub fn new(cfg: Arc<NormalizerConfig>, transcoder: Arc<dyn Transcoder>, discarder: Arc<dyn Discarder>) -> Self {
        Self { cfg, transcoder, discarder }
    }

    pub async fn apply(&self, source: &SourceFile, disposition: Disposition) -> Result<FileStatus, ActionError> {
        match disposition {
            Disposition::AlreadyConforming { destination } => self.move_conforming(source, destination),
            Disposition::PriorOutputValid { candidate } => self.archive_source(source, &candidate),
            Disposition::PriorOutputInvalid { candidate, reason } => {
                warn!("{}: discarding {} ({})", source.path.display(), candidate.display(), reason);
                let discarded = self.discarder.discard(&candidate)?;
                self.transcode(source, candidate, Some(discarded)).await
            }
            Disposition::NeedsTranscode { candidate } => self.transcode(source, candidate, None).await,
        }
    }

    fn move_conforming(&self, source: &SourceFile, destination: PathBuf) -> Result<FileStatus, ActionError> {
        match move_no_clobber(&source.path, &destination)? {
            MoveResult::Moved => {
                info!("✅ {} already {}; moved to {}", source.path.display(), self.cfg.target_codec, destination.display());
                Ok(FileStatus::Moved { destination })
            }
            MoveResult::Occupied => {
                warn!("⚠️  {} already {} but {} is occupied; leaving it in place", source.path.display(), self.cfg.target_codec, destination.display());
                Ok(FileStatus::Collision { destination })
            }
        }
    }

    fn archive_source(&self, source: &SourceFile, candidate: &Path) -> Result<FileStatus, ActionError> {
        let archived_to = self.cfg.archive_root.join(source.file_name());
        match move_no_clobber(&source.path, &archived_to)? {
            MoveResult::Moved => {
                info!("✅ {} already transcoded to {}; source archived to {}", source.path.display(), candidate.display(), archived_to.display());
                Ok(FileStatus::Archived { archived_to })
            }
            MoveResult::Occupied => {
                warn!("⚠️  {} has a valid output but {} is occupied; leaving it in place", source.path.display(), archived_to.display());
                Ok(FileStatus::Collision { destination: archived_to })
            }
        }
    }

    async fn transcode(&self, source: &SourceFile, destination: PathBuf, discarded: Option<PathBuf>) -> Result<FileStatus, ActionError> {
        let status = self.transcoder.transcode(&source.path, &destination).await?;
        if status.success() {
            info!("✅ Transcoded {} -> {}", source.path.display(), destination.display());
            Ok(FileStatus::Transcoded { destination, discarded })
        } else {
            error!("❌ Transcode of {} failed (exit {:?}); {} will be re-checked next run", source.path.display(), status.code, destination.display());
            Ok(FileStatus::TranscodeFailed { destination, code: status.code, discarded })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposition::InvalidReason;
    use crate::testing::{write_media, FakeTranscoder, FakeTrash};
    use chrono::Utc;

    struct Fixture {
        _dir: tempfile::TempDir,
        cfg: Arc<NormalizerConfig>,
        transcoder: Arc<FakeTranscoder>,
        trash: Arc<FakeTrash>,
        reconciler: Reconciler,
    }

    fn fixture(transcoder: FakeTranscoder) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Arc::new(NormalizerConfig {
            input_root: dir.path().join("in"),
            output_root: dir.path().join("out"),
            archive_root: dir.path().join("archive"),
            ..Default::default()
        });
        prepare_roots(&cfg).unwrap();
        std::fs::create_dir_all(&cfg.input_root).unwrap();
        let transcoder = Arc::new(transcoder);
        let trash = Arc::new(FakeTrash::new(dir.path().join("trash")));
        let reconciler = Reconciler::new(cfg.clone(), transcoder.clone(), trash.clone());
        Fixture { _dir: dir, cfg, transcoder, trash, reconciler }
    }

    fn source(cfg: &NormalizerConfig, name: &str, codec: &str, duration: f64) -> SourceFile {
        let path = cfg.input_root.join(name);
        write_media(&path, codec, Some(duration));
        SourceFile {
            stem: Path::new(name).file_stem().unwrap().to_string_lossy().to_string(),
            path,
            modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_conforming_move() {
        let fx = fixture(FakeTranscoder::default());
        let src = source(&fx.cfg, "clip.mp4", "hevc", 10.0);
        let dest = fx.cfg.output_root.join("clip.mp4");

        let status = fx.reconciler.apply(&src, Disposition::AlreadyConforming { destination: dest.clone() }).await.unwrap();
        assert_eq!(status, FileStatus::Moved { destination: dest.clone() });
        assert!(dest.exists());
        assert!(!src.path.exists());
        assert!(fx.transcoder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_conforming_collision_leaves_both_files() {
        let fx = fixture(FakeTranscoder::default());
        let src = source(&fx.cfg, "clip.mp4", "hevc", 10.0);
        let dest = fx.cfg.output_root.join("clip.mp4");
        std::fs::write(&dest, b"someone else").unwrap();

        let status = fx.reconciler.apply(&src, Disposition::AlreadyConforming { destination: dest.clone() }).await.unwrap();
        assert_eq!(status, FileStatus::Collision { destination: dest.clone() });
        assert!(src.path.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"someone else");
    }

    #[tokio::test]
    async fn test_valid_prior_output_archives_source() {
        let fx = fixture(FakeTranscoder::default());
        let src = source(&fx.cfg, "film.avi", "h264", 100.0);
        let candidate = fx.cfg.output_root.join("film.mkv");
        write_media(&candidate, "hevc", Some(100.2));

        let status = fx.reconciler.apply(&src, Disposition::PriorOutputValid { candidate: candidate.clone() }).await.unwrap();
        assert_eq!(status, FileStatus::Archived { archived_to: fx.cfg.archive_root.join("film.avi") });
        assert!(!src.path.exists());
        assert!(fx.cfg.archive_root.join("film.avi").exists());
        assert!(candidate.exists());
        assert!(fx.transcoder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_archive_collision_leaves_source() {
        let fx = fixture(FakeTranscoder::default());
        let src = source(&fx.cfg, "film.avi", "h264", 100.0);
        let candidate = fx.cfg.output_root.join("film.mkv");
        write_media(&candidate, "hevc", Some(100.0));
        let archived = fx.cfg.archive_root.join("film.avi");
        std::fs::write(&archived, b"older copy").unwrap();

        let status = fx.reconciler.apply(&src, Disposition::PriorOutputValid { candidate: candidate.clone() }).await.unwrap();
        assert_eq!(status, FileStatus::Collision { destination: archived.clone() });
        assert!(src.path.exists());
        assert_eq!(std::fs::read(&archived).unwrap(), b"older copy");
        assert!(candidate.exists());
        assert!(fx.transcoder.calls().is_empty());
        assert!(fx.trash.discarded().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_prior_output_is_discarded_then_retranscoded() {
        let fx = fixture(FakeTranscoder::default());
        let src = source(&fx.cfg, "film.avi", "h264", 100.0);
        let candidate = fx.cfg.output_root.join("film.mkv");
        std::fs::write(&candidate, b"partial").unwrap();

        let status = fx
            .reconciler
            .apply(
                &src,
                Disposition::PriorOutputInvalid {
                    candidate: candidate.clone(),
                    reason: InvalidReason::Unreadable("truncated".into()),
                },
            )
            .await
            .unwrap();

        assert!(matches!(status, FileStatus::Transcoded { discarded: Some(_), .. }));
        assert_eq!(fx.trash.discarded(), vec![candidate.clone()]);
        assert_eq!(fx.transcoder.calls(), vec![(src.path.clone(), candidate.clone())]);
        assert!(src.path.exists(), "source stays until a later run archives it");
    }

    #[tokio::test]
    async fn test_encoder_failure_is_reported_not_raised() {
        let fx = fixture(FakeTranscoder::failing());
        let src = source(&fx.cfg, "film.avi", "h264", 100.0);
        let candidate = fx.cfg.output_root.join("film.mkv");

        let status = fx.reconciler.apply(&src, Disposition::NeedsTranscode { candidate: candidate.clone() }).await.unwrap();
        assert_eq!(status, FileStatus::TranscodeFailed { destination: candidate.clone(), code: Some(1), discarded: None });
        assert!(candidate.exists(), "partial output is left for the next run");
        assert!(src.path.exists());
    }

    #[test]
    fn test_move_no_clobber_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = move_no_clobber(&dir.path().join("a"), &dir.path().join("b")).unwrap_err();
        assert!(matches!(err, ActionError::Rename { .. }));
    }
}
