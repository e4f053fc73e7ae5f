use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use log::{debug, info, warn};
use crate::config::NormalizerConfig;
use crate::error::ProbeError;
use crate::ffprobe::{MediaDescriptor, MediaProbe};
use crate::scan::SourceFile;

/// Relative duration difference under which two files count as the same length
pub const DEFAULT_DURATION_TOLERANCE: f64 = 0.01;

/// What to do with one source file
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Video is already in the target codec; move it into the output root as-is
    AlreadyConforming { destination: PathBuf },
    /// A previous run left a matching output; archive the source
    PriorOutputValid { candidate: PathBuf },
    /// A previous run left a broken output; discard it and transcode again
    PriorOutputInvalid { candidate: PathBuf, reason: InvalidReason },
    /// No prior output; transcode into the candidate path
    NeedsTranscode { candidate: PathBuf },
}

/// Why an existing candidate output was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    Unreadable(String),
    DurationMismatch { source: Option<f64>, candidate: Option<f64> },
}

/// State of the candidate output slot at resolution time
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateState {
    Absent,
    Probed(MediaDescriptor),
    Unreadable(String),
}

impl Disposition {
    /// Short stable label, used in logs and summaries
    pub fn kind(&self) -> DispositionKind {
        match self {
            Disposition::AlreadyConforming { .. } => DispositionKind::AlreadyConforming,
            Disposition::PriorOutputValid { .. } => DispositionKind::PriorOutputValid,
            Disposition::PriorOutputInvalid { .. } => DispositionKind::PriorOutputInvalid,
            Disposition::NeedsTranscode { .. } => DispositionKind::NeedsTranscode,
        }
    }
}

/// Disposition without its paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionKind {
    AlreadyConforming,
    PriorOutputValid,
    PriorOutputInvalid,
    NeedsTranscode,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Unreadable(reason) => write!(f, "not a valid video file: {}", reason),
            InvalidReason::DurationMismatch { source, candidate } => write!(
                f,
                "duration mismatch: source {} vs output {}",
                fmt_duration(*source),
                fmt_duration(*candidate)
            ),
        }
    }
}

fn fmt_duration(d: Option<f64>) -> String {
    d.map(|d| format!("{:.3}s", d)).unwrap_or_else(|| "unknown".to_string())
}

/// Compare two durations with the default 1% tolerance
pub fn compare_duration(a: f64, b: f64) -> bool {
    compare_duration_within(a, b, DEFAULT_DURATION_TOLERANCE)
}

/// Relative comparison: `|a - b| / max(|a|, |b|) <= tolerance`.
///
/// Two zero durations never match, so a degenerate zero-length output cannot
/// be accepted as a finished transcode of a zero-length source.
pub fn compare_duration_within(a: f64, b: f64, tolerance: f64) -> bool {
    let larger = a.abs().max(b.abs());
    if larger == 0.0 || !larger.is_finite() {
        return false;
    }
    (a - b).abs() / larger <= tolerance
}

/// Path a transcode of `source` is written to
pub fn candidate_path(cfg: &NormalizerConfig, source: &SourceFile) -> PathBuf {
    cfg.output_root.join(format!("{}.{}", source.stem, cfg.output_extension))
}

/// Path a conforming source is moved to (original name kept)
pub fn conforming_destination(cfg: &NormalizerConfig, source: &SourceFile) -> PathBuf {
    cfg.output_root.join(source.file_name())
}

/// Pure classification of a source given its probe and the candidate slot
pub fn decide(
    cfg: &NormalizerConfig,
    source: &SourceFile,
    probe: &MediaDescriptor,
    candidate_state: CandidateState,
) -> Disposition {
    if probe.video_codec == cfg.target_codec {
        return Disposition::AlreadyConforming {
            destination: conforming_destination(cfg, source),
        };
    }

    let candidate = candidate_path(cfg, source);
    match candidate_state {
        CandidateState::Absent => Disposition::NeedsTranscode { candidate },
        CandidateState::Unreadable(reason) => Disposition::PriorOutputInvalid {
            candidate,
            reason: InvalidReason::Unreadable(reason),
        },
        CandidateState::Probed(output) => {
            let matches = match (probe.duration, output.duration) {
                (Some(a), Some(b)) => compare_duration_within(a, b, cfg.duration_tolerance),
                _ => false,
            };
            if matches {
                Disposition::PriorOutputValid { candidate }
            } else {
                Disposition::PriorOutputInvalid {
                    candidate,
                    reason: InvalidReason::DurationMismatch {
                        source: probe.duration,
                        candidate: output.duration,
                    },
                }
            }
        }
    }
}

/// Probes a source and its candidate output and picks a disposition
#[derive(Clone)]
pub struct DispositionResolver {
    cfg: Arc<NormalizerConfig>,
    probe: Arc<dyn MediaProbe>,
}

impl DispositionResolver {
    pub fn new(cfg: Arc<NormalizerConfig>, probe: Arc<dyn MediaProbe>) -> Self {
        Self { cfg, probe }
    }

    /// Resolve one source. An `Err` means the source itself could not be probed.
    pub async fn resolve(&self, source: &SourceFile) -> Result<Disposition, ProbeError> {
        let descriptor = self.probe_source(source).await?;
        Ok(self.resolve_probed(source, &descriptor).await)
    }

    /// Probe only the source file
    pub async fn probe_source(&self, source: &SourceFile) -> Result<MediaDescriptor, ProbeError> {
        let descriptor = self.probe.probe(&source.path).await?;
        debug!(
            "{}: video={} audio={:?} duration={:?}",
            source.path.display(),
            descriptor.video_codec,
            descriptor.audio_codec,
            descriptor.duration
        );
        Ok(descriptor)
    }

    /// Output path this source will write to or be judged against
    pub fn output_slot(&self, source: &SourceFile, descriptor: &MediaDescriptor) -> PathBuf {
        if descriptor.video_codec == self.cfg.target_codec {
            conforming_destination(&self.cfg, source)
        } else {
            candidate_path(&self.cfg, source)
        }
    }

    /// Finish resolution of an already probed source by inspecting its candidate output
    pub async fn resolve_probed(&self, source: &SourceFile, descriptor: &MediaDescriptor) -> Disposition {
        if descriptor.video_codec == self.cfg.target_codec {
            return decide(&self.cfg, source, descriptor, CandidateState::Absent);
        }

        if descriptor.duration.is_none() {
            warn!("{}: ffprobe reported no duration; a prior output can never be accepted", source.path.display());
        }

        let candidate = candidate_path(&self.cfg, source);
        let state = if candidate.exists() {
            match self.probe.probe(&candidate).await {
                Ok(out) => CandidateState::Probed(out),
                Err(e) => CandidateState::Unreadable(e.to_string()),
            }
        } else {
            CandidateState::Absent
        };

        let disposition = decide(&self.cfg, source, descriptor, state);
        if let Disposition::PriorOutputInvalid { candidate, reason } = &disposition {
            info!("{}: existing output {} rejected ({})", source.path.display(), candidate.display(), reason);
        }
        disposition
    }
}
