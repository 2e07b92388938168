//! External-encoder contract.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::spec::ManifestUrl;

mod ffmpeg;

pub use ffmpeg::FfmpegEncoder;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("failed to spawn encoder process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("encoder i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// The process ran and reported failure; `diagnostic` carries its
    /// own error output.
    #[error("encoder {status}: {diagnostic}")]
    Failed { status: String, diagnostic: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    Completed,
    /// The cancellation token fired mid-run and the process was stopped;
    /// whatever was written so far remains on disk.
    Interrupted,
}

/// One bounded-duration encode of a stream to a local file.
///
/// The implementation must overwrite any pre-existing output, enforce
/// the duration bound itself, terminate on cancellation, and surface a
/// human-readable diagnostic when the run fails.
#[async_trait]
pub trait StreamEncoder: Send + Sync {
    async fn encode(
        &self,
        manifest: &ManifestUrl,
        max_duration: Duration,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<EncodeStatus, EncoderError>;
}
