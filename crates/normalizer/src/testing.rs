//! In-process stand-ins for ffprobe, ffmpeg and the trash, shared by unit tests.
//!
//! Fake media files are plain text `codec=<name>;duration=<secs|none>`, so a
//! rename carries the "probe result" with the file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use crate::discard::Discarder;
use crate::error::{ActionError, ProbeError};
use crate::ffprobe::{MediaDescriptor, MediaProbe};
use crate::transcode::{TranscodeStatus, Transcoder};

pub fn write_media(path: &Path, codec: &str, duration: Option<f64>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let duration = duration.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string());
    std::fs::write(path, format!("codec={};duration={}", codec, duration)).unwrap();
}

fn read_media(path: &Path) -> Option<MediaDescriptor> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut codec = None;
    let mut duration = None;
    for part in text.trim().split(';') {
        match part.split_once('=')? {
            ("codec", c) => codec = Some(c.to_string()),
            ("duration", "none") => {}
            ("duration", d) => duration = Some(d.parse().ok()?),
            _ => return None,
        }
    }
    Some(MediaDescriptor {
        duration,
        video_codec: codec?,
        audio_codec: None,
    })
}

#[derive(Default)]
pub struct FakeProbe {
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        read_media(path).ok_or_else(|| ProbeError::NoVideoStream(path.to_path_buf()))
    }
}

/// Writes an hevc "encode" of the source, optionally failing with a partial file
#[derive(Default)]
pub struct FakeTranscoder {
    pub fail: bool,
    pub delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<TranscodeStatus, ActionError> {
        self.calls.lock().unwrap().push((source.to_path_buf(), destination.to_path_buf()));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let status = if self.fail {
            std::fs::write(destination, b"partial").unwrap();
            TranscodeStatus { code: Some(1) }
        } else {
            let duration = read_media(source).and_then(|m| m.duration);
            write_media(destination, "hevc", duration);
            TranscodeStatus { code: Some(0) }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(status)
    }
}

/// Moves discarded files into a directory so tests can inspect them
pub struct FakeTrash {
    pub dir: PathBuf,
    discarded: Mutex<Vec<PathBuf>>,
}

impl FakeTrash {
    pub fn new(dir: PathBuf) -> Self {
        std::fs::create_dir_all(&dir).unwrap();
        Self { dir, discarded: Mutex::new(Vec::new()) }
    }

    pub fn discarded(&self) -> Vec<PathBuf> {
        self.discarded.lock().unwrap().clone()
    }
}

impl Discarder for FakeTrash {
    fn discard(&self, path: &Path) -> Result<PathBuf, ActionError> {
        let count = self.discarded.lock().unwrap().len();
        let name = format!("{}-{}", count, path.file_name().unwrap().to_string_lossy());
        let target = self.dir.join(name);
        std::fs::rename(path, &target).map_err(|source| ActionError::Rename {
            from: path.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        self.discarded.lock().unwrap().push(path.to_path_buf());
        Ok(target)
    }
}
