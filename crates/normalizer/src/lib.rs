pub mod actions;
pub mod config;
pub mod discard;
pub mod disposition;
pub mod error;
pub mod ffprobe;
pub mod outcome;
pub mod priority;
pub mod scan;
pub mod scheduler;
pub mod sidecar;
pub mod transcode;

#[cfg(test)]
mod testing;

pub use config::{EncodeProfile, NormalizerConfig};
pub use disposition::{compare_duration, Disposition, DispositionKind, DispositionResolver};
pub use ffprobe::{FfprobeProbe, MediaDescriptor, MediaProbe};
pub use outcome::{BatchSummary, FileOutcome, FileStatus};
pub use scan::SourceFile;
pub use scheduler::{BatchScheduler, FilePipeline};
pub use transcode::{FfmpegTranscoder, Transcoder};
