use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use crate::actions::Reconciler;
use crate::config::NormalizerConfig;
use crate::discard::Discarder;
use crate::disposition::{Disposition, DispositionResolver};
use crate::ffprobe::MediaProbe;
use crate::outcome::{BatchSummary, FileOutcome, FileStatus};
use crate::scan::SourceFile;
use crate::transcode::Transcoder;

/// Probe, decide and act for a single file
pub struct FilePipeline {
    cfg: Arc<NormalizerConfig>,
    resolver: DispositionResolver,
    reconciler: Reconciler,
    dry_run: bool,
    /// One lock per output path; held from candidate inspection until the action finishes
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FilePipeline {
    pub fn new(
        cfg: Arc<NormalizerConfig>,
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn Transcoder>,
        discarder: Arc<dyn Discarder>,
    ) -> Self {
        Self {
            resolver: DispositionResolver::new(cfg.clone(), probe),
            reconciler: Reconciler::new(cfg.clone(), transcoder, discarder),
            cfg,
            dry_run: false,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve and report dispositions without touching the filesystem
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn slot_lock(&self, slot: &Path) -> Arc<Mutex<()>> {
        self.slots.lock().await.entry(slot.to_path_buf()).or_default().clone()
    }

    /// Run one file to a terminal state. Never fails: every error becomes an outcome.
    ///
    /// Files sharing an output path are judged and acted on one at a time, so
    /// each sees the slot as the previous one left it.
    pub async fn process(&self, source: SourceFile) -> FileOutcome {
        let started_at = Utc::now();

        let descriptor = match self.resolver.probe_source(&source).await {
            Ok(d) => d,
            Err(e) => {
                error!("❌ Cannot probe {}: {}", source.path.display(), e);
                return FileOutcome::new(source.path, None, FileStatus::ProbeFailed { reason: e.to_string() }, started_at);
            }
        };

        let slot = self.resolver.output_slot(&source, &descriptor);
        let lock = self.slot_lock(&slot).await;
        let _held = match lock.clone().try_lock_owned() {
            Ok(held) => held,
            Err(_) => {
                debug!("{}: waiting for {}", source.path.display(), slot.display());
                lock.lock_owned().await
            }
        };

        let disposition = self.resolver.resolve_probed(&source, &descriptor).await;

        let kind = disposition.kind();
        info!("{}: {:?}", source.path.display(), kind);

        if self.dry_run {
            let target = match &disposition {
                Disposition::AlreadyConforming { destination } => destination.clone(),
                Disposition::PriorOutputValid { .. } => self.cfg.archive_root.join(source.file_name()),
                Disposition::PriorOutputInvalid { candidate, .. } | Disposition::NeedsTranscode { candidate } => candidate.clone(),
            };
            return FileOutcome::new(source.path, Some(kind), FileStatus::Planned { target }, started_at);
        }

        let status = match self.reconciler.apply(&source, disposition).await {
            Ok(status) => status,
            Err(e) => {
                error!("❌ {}: {}", source.path.display(), e);
                FileStatus::Error { reason: e.to_string() }
            }
        };
        FileOutcome::new(source.path, Some(kind), status, started_at)
    }
}

/// Runs the file pipeline over a batch with a fixed number of workers
pub struct BatchScheduler {
    pipeline: Arc<FilePipeline>,
    workers: usize,
}

impl BatchScheduler {
    pub fn new(pipeline: FilePipeline, workers: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            workers: workers.max(1),
        }
    }

    /// Process every source, oldest first, and wait for all of them to finish.
    pub async fn run(&self, sources: Vec<SourceFile>) -> BatchSummary {
        let mut summary = BatchSummary::new();
        info!("Batch {} starting: {} file(s), {} worker(s)", summary.run_id, sources.len(), self.workers);

        let total = sources.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(sources)));
        let (tx, mut rx) = mpsc::unbounded_channel::<FileOutcome>();

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers.min(total.max(1)) {
            let queue = queue.clone();
            let tx = tx.clone();
            let pipeline = self.pipeline.clone();
            workers.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(source) = next else { break };
                    debug!("worker {} picked {}", worker_id, source.path.display());

                    let path: PathBuf = source.path.clone();
                    let started_at = Utc::now();
                    let pipeline = pipeline.clone();
                    // own task per file so a panic is contained to that file
                    let outcome = match tokio::spawn(async move { pipeline.process(source).await }).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!("❌ Processing {} aborted: {}", path.display(), e);
                            FileOutcome::new(path, None, FileStatus::Error { reason: format!("task failed: {}", e) }, started_at)
                        }
                    };
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut done = 0;
        while let Some(outcome) = rx.recv().await {
            done += 1;
            info!("[{}/{}] {} -> {:?}", done, total, outcome.source.display(), outcome.status);
            summary.record(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task ended abnormally: {}", e);
            }
        }

        summary.finish();
        let c = &summary.counts;
        info!(
            "Done: {} file(s) - {} moved, {} archived, {} transcoded, {} failed, {} discarded, {} collisions, {} probe failures, {} errors",
            summary.total(),
            c.moved,
            c.archived,
            c.transcoded,
            c.transcode_failed,
            c.discarded,
            c.collisions,
            c.probe_failed,
            c.errors
        );
        summary
    }
}
