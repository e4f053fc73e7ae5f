use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::process::Command;
use crate::config::{EncodeProfile, NormalizerConfig};
use crate::error::ActionError;
use crate::priority;
use crate::sidecar;

/// Exit status of one encoder run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeStatus {
    /// `None` when the encoder was killed by a signal
    pub code: Option<i32>,
}

impl TranscodeStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an encode of `source` into `destination` and waits for it
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<TranscodeStatus, ActionError>;
}

/// Transcoder that launches a local ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_bin: PathBuf,
    profile: EncodeProfile,
    lower_priority: bool,
}

impl FfmpegTranscoder {
    pub fn from_config(cfg: &NormalizerConfig) -> Self {
        Self {
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
            profile: cfg.profile.clone(),
            lower_priority: cfg.lower_priority,
        }
    }
}

/// Build the ffmpeg argument list for one encode
pub fn build_ffmpeg_args(profile: &EncodeProfile, input: &Path, output: &Path) -> Vec<OsString> {
    // never prompt, never overwrite: an existing output is the resolver's business
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-n", "-v", "error"]
        .iter()
        .map(OsString::from)
        .collect();

    args.push("-hwaccel".into());
    args.push(profile.hwaccel.clone().into());
    args.push("-i".into());
    args.push(input.as_os_str().to_os_string());

    let mut opts: Vec<(&str, String)> = vec![
        ("-map", "0:v:0?".to_string()),
        ("-map", "0:a?".to_string()),
        ("-map", "0:s?".to_string()),
        ("-vf", profile.scale_filter.clone()),
        ("-c:v", profile.video_codec.clone()),
        ("-crf", profile.crf.to_string()),
    ];
    if profile.video_codec == "libx265" {
        opts.push(("-x265-params", format!("crf={}", profile.crf)));
    }
    opts.extend([
        ("-preset", profile.preset.clone()),
        ("-pix_fmt", profile.pix_fmt.clone()),
        ("-fps_mode", profile.fps_mode.clone()),
        ("-c:a", profile.audio_codec.clone()),
        ("-b:a", profile.audio_bitrate.clone()),
        ("-c:s", profile.subtitle_codec.clone()),
        ("-threads", "0".to_string()),
        ("-f", profile.container.clone()),
    ]);
    for (flag, value) in opts {
        args.push(flag.into());
        args.push(value.into());
    }
    args.push(output.as_os_str().to_os_string());

    args
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<TranscodeStatus, ActionError> {
        info!("🎬 Transcoding {} to {}", source.display(), destination.display());

        let args = build_ffmpeg_args(&self.profile, source, destination);
        debug!("ffmpeg args: {:?}", args);

        let child = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .env("FFREPORT", sidecar::ffreport_value(destination, self.profile.report_level))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source_err| ActionError::Encoder {
                path: source.to_path_buf(),
                source: source_err,
            })?;

        if self.lower_priority {
            match child.id() {
                Some(pid) => {
                    debug!("Lowering CPU/IO priority of ffmpeg pid {}", pid);
                    if let Err(e) = priority::lower_process_priority(pid) {
                        warn!("Could not lower priority of ffmpeg pid {}: {}", pid, e);
                    }
                }
                None => warn!("ffmpeg exited before its priority could be lowered"),
            }
        }

        let output = child.wait_with_output().await.map_err(|source_err| ActionError::Encoder {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        let status = TranscodeStatus { code: output.status.code() };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffmpeg failed with exit code {:?} for {}", status.code, source.display());
            if !stderr.trim().is_empty() {
                error!("ffmpeg STDERR: {}", stderr.trim());
            }
        }
        Ok(status)
    }
}
