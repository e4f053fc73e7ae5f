use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::disposition::DispositionKind;

/// Terminal state of one source file in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Already in the target codec; moved into the output root
    Moved { destination: PathBuf },
    /// A valid output already existed; source moved to the archive root
    Archived { archived_to: PathBuf },
    /// Encoder exited 0
    Transcoded { destination: PathBuf, discarded: Option<PathBuf> },
    /// Encoder exited non-zero; output left for the next run to judge
    TranscodeFailed { destination: PathBuf, code: Option<i32>, discarded: Option<PathBuf> },
    /// Destination slot occupied; source left untouched
    Collision { destination: PathBuf },
    /// Source could not be probed; left untouched
    ProbeFailed { reason: String },
    /// Dry run: what would have happened
    Planned { target: PathBuf },
    /// Filesystem or process error while acting
    Error { reason: String },
}

/// Result record reported by a worker for one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub id: String,
    pub source: PathBuf,
    pub disposition: Option<DispositionKind>,
    #[serde(flatten)]
    pub status: FileStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FileOutcome {
    pub fn new(source: PathBuf, disposition: Option<DispositionKind>, status: FileStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            disposition,
            status,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Whether the file needs operator attention
    pub fn is_problem(&self) -> bool {
        matches!(
            self.status,
            FileStatus::TranscodeFailed { .. }
                | FileStatus::Collision { .. }
                | FileStatus::ProbeFailed { .. }
                | FileStatus::Error { .. }
        )
    }
}

/// Per-status tallies of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub moved: usize,
    pub archived: usize,
    pub transcoded: usize,
    pub transcode_failed: usize,
    pub discarded: usize,
    pub collisions: usize,
    pub probe_failed: usize,
    pub planned: usize,
    pub errors: usize,
}

/// Aggregate of every file outcome in one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: StatusCounts,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            counts: StatusCounts::default(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        let c = &mut self.counts;
        match &outcome.status {
            FileStatus::Moved { .. } => c.moved += 1,
            FileStatus::Archived { .. } => c.archived += 1,
            FileStatus::Transcoded { discarded, .. } => {
                c.transcoded += 1;
                c.discarded += usize::from(discarded.is_some());
            }
            FileStatus::TranscodeFailed { discarded, .. } => {
                c.transcode_failed += 1;
                c.discarded += usize::from(discarded.is_some());
            }
            FileStatus::Collision { .. } => c.collisions += 1,
            FileStatus::ProbeFailed { .. } => c.probe_failed += 1,
            FileStatus::Planned { .. } => c.planned += 1,
            FileStatus::Error { .. } => c.errors += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn problems(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_problem())
    }
}

impl Default for BatchSummary {
    fn default() -> Self {
        Self::new()
    }
}
