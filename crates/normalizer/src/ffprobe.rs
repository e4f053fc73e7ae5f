use std::path::{Path, PathBuf};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;
use crate::error::ProbeError;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeFormat {
    pub format_name: Option<String>,
    /// Seconds, as the decimal string ffprobe prints
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// What the resolver needs to know about a media file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    /// Container duration in seconds, when ffprobe reports one
    pub duration: Option<f64>,
    /// Codec of the first video stream
    pub video_codec: String,
    /// Codec of the first audio stream, if any
    pub audio_codec: Option<String>,
}

impl FFProbeData {
    /// First stream of the given type (`"video"`, `"audio"`, ...)
    pub fn first_stream(&self, codec_type: &str) -> Option<&FFProbeStream> {
        self.streams.iter().find(|s| s.codec_type.as_deref() == Some(codec_type))
    }

    /// Reduce raw ffprobe output to a descriptor; a file without a video stream is not media we handle
    pub fn describe(&self, path: &Path) -> Result<MediaDescriptor, ProbeError> {
        let video = self
            .first_stream("video")
            .ok_or_else(|| ProbeError::NoVideoStream(path.to_path_buf()))?;

        let duration = self
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite());

        Ok(MediaDescriptor {
            duration,
            video_codec: video.codec_name.clone().unwrap_or_default(),
            audio_codec: self.first_stream("audio").and_then(|s| s.codec_name.clone()),
        })
    }
}

/// Something that can describe a media file
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor, ProbeError>;
}

/// MediaProbe backed by a local ffprobe binary
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_bin: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self { ffprobe_bin: ffprobe_bin.into() }
    }

    /// Run ffprobe and parse its JSON output
    pub async fn probe_raw(&self, file_path: &Path) -> Result<FFProbeData, ProbeError> {
        if !file_path.exists() {
            return Err(ProbeError::NotFound(file_path.to_path_buf()));
        }

        debug!("ffprobe: probing {}", file_path.display());

        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(file_path)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| ProbeError::Launch {
                path: file_path.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::NonZeroExit {
                path: file_path.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_output(file_path, &output.stdout)
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor, ProbeError> {
        let data = self.probe_raw(path).await?;
        data.describe(path)
    }
}

/// Parse ffprobe's `-print_format json` output
pub fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<FFProbeData, ProbeError> {
    serde_json::from_slice(stdout).map_err(|source| ProbeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
