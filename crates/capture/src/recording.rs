//! Bounded recording of a discovered stream.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::encoder::{EncodeStatus, StreamEncoder};
use crate::spec::ManifestUrl;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingOutcome {
    /// The encoder finished. `flush_confirmed` is false when the
    /// stable-storage sync failed; the file content is likely intact,
    /// but persistence could not be confirmed.
    Completed { flush_confirmed: bool },
    /// The encoder reported failure. Never retried: the stream is
    /// time-sensitive, a rerun would capture different material.
    Failed { diagnostic: String },
    /// Cancelled mid-encode; partial output was still flushed.
    Interrupted { flush_confirmed: bool },
}

/// Runs exactly one encoder invocation and confirms the output reached
/// stable storage before declaring the recording complete.
pub struct RecordingJob {
    encoder: Arc<dyn StreamEncoder>,
}

impl RecordingJob {
    pub fn new(encoder: Arc<dyn StreamEncoder>) -> Self {
        Self { encoder }
    }

    pub async fn run(
        &self,
        manifest: &ManifestUrl,
        duration: Duration,
        output: &Path,
        token: &CancellationToken,
    ) -> RecordingOutcome {
        info!(%manifest, output = %output.display(), "recording stream");

        match self.encoder.encode(manifest, duration, output, token).await {
            Ok(EncodeStatus::Completed) => RecordingOutcome::Completed {
                flush_confirmed: flush(output).await,
            },
            Ok(EncodeStatus::Interrupted) => {
                warn!("encoder stopped early, flushing partial output");
                RecordingOutcome::Interrupted {
                    flush_confirmed: flush(output).await,
                }
            }
            Err(reason) => {
                error!(%reason, "encoder failed, recording lost");
                RecordingOutcome::Failed {
                    diagnostic: reason.to_string(),
                }
            }
        }
    }
}

/// Forces pending writes to stable storage. Failure is surfaced as a
/// warning, never swallowed: on most systems the data is already on
/// disk, but completion must not claim more than was verified.
async fn flush(output: &Path) -> bool {
    let sync = async {
        File::open(output).await?.sync_all().await?;
        Ok::<(), std::io::Error>(())
    };
    match sync.await {
        Ok(()) => true,
        Err(reason) => {
            warn!(
                output = %output.display(),
                %reason,
                "recording finished but could not confirm persistence"
            );
            false
        }
    }
}
