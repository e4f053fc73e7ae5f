use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a normalizer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Root directory scanned for source media
    pub input_root: PathBuf,
    /// Final home for conforming files and completed transcodes
    pub output_root: PathBuf,
    /// Holding area for sources whose transcoded output already exists
    pub archive_root: PathBuf,
    /// Directory that receives discarded outputs; `None` uses the OS trash
    pub discard_dir: Option<PathBuf>,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary
    pub ffprobe_bin: PathBuf,
    /// Number of files processed concurrently (bounds live encoder processes)
    pub workers: usize,
    /// Video codec name (as reported by ffprobe) that counts as already conforming
    pub target_codec: String,
    /// Container extension of transcoded outputs
    pub output_extension: String,
    /// Source container extensions picked up by the scan (lowercase, no dot)
    pub extensions: Vec<String>,
    /// Maximum relative duration difference for a prior output to be accepted
    pub duration_tolerance: f64,
    /// Lower CPU and I/O priority of encoder processes
    pub lower_priority: bool,
    /// Encoder parameters
    pub profile: EncodeProfile,
}

/// Fixed ffmpeg parameter profile used for every transcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeProfile {
    pub hwaccel: String,
    pub container: String,
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
    pub pix_fmt: String,
    /// Keeps both dimensions even, which libx265 with yuv420p requires
    pub scale_filter: String,
    pub fps_mode: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub subtitle_codec: String,
    /// FFREPORT verbosity (32 = info)
    pub report_level: u8,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            hwaccel: "auto".to_string(),
            container: "matroska".to_string(),
            video_codec: "libx265".to_string(),
            crf: 28,
            preset: "medium".to_string(),
            pix_fmt: "yuv420p".to_string(),
            scale_filter: "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
            fps_mode: "passthrough".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            subtitle_codec: "mov_text".to_string(),
            report_level: 32,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl NormalizerConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            input_root: PathBuf::from("input"),
            output_root: PathBuf::from("output"),
            archive_root: PathBuf::from("archive"),
            discard_dir: None,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            workers: 2,
            target_codec: "hevc".to_string(),
            output_extension: "mkv".to_string(),
            extensions: ["mp4", "mov", "mkv", "avi"].iter().map(|s| s.to_string()).collect(),
            duration_tolerance: 0.01,
            lower_priority: true,
            profile: EncodeProfile::default(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// Reject settings the scheduler and resolver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if !(0.0..1.0).contains(&self.duration_tolerance) {
            bail!("duration_tolerance must be in [0, 1), got {}", self.duration_tolerance);
        }
        if self.target_codec.trim().is_empty() {
            bail!("target_codec must not be empty");
        }
        if self.output_extension.trim().is_empty() || self.output_extension.starts_with('.') {
            bail!("output_extension must be a bare extension such as \"mkv\"");
        }
        if self.output_root == self.input_root {
            bail!("output_root must differ from input_root: {}", self.input_root.display());
        }
        if self.archive_root == self.input_root {
            bail!("archive_root must differ from input_root: {}", self.input_root.display());
        }
        Ok(())
    }

    /// Whether a lowercase extension belongs to the recognized source set
    pub fn is_recognized_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}
