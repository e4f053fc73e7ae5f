use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a file could not be described by the prober
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("failed to launch ffprobe for {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ffprobe exited with code {code:?} for {path}: {stderr}")]
    NonZeroExit {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unparseable ffprobe output for {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no video stream in {0}")]
    NoVideoStream(PathBuf),
}

/// Failures while carrying out a reconciliation action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to discard {path}: {reason}")]
    Discard { path: PathBuf, reason: String },

    #[error("failed to run encoder for {path}: {source}")]
    Encoder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
