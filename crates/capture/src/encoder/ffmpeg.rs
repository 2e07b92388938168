//! ffmpeg-backed implementation of the encoder contract.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EncodeStatus, EncoderError, StreamEncoder};
use crate::spec::ManifestUrl;

/// Lines of process stderr kept for the failure diagnostic.
const STDERR_TAIL_LINES: usize = 12;

/// Runs `ffmpeg` as a child process, stream-copying the manifest into
/// the output file for at most the requested duration. ffmpeg itself
/// enforces the time bound (`-t`) and the overwrite (`-y`).
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(manifest: &ManifestUrl, max_duration: Duration, output: &Path) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-y".into(),
            "-i".into(),
            manifest.as_str().into(),
            "-t".into(),
            max_duration.as_secs().to_string().into(),
            "-c".into(),
            "copy".into(),
            output.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl StreamEncoder for FfmpegEncoder {
    async fn encode(
        &self,
        manifest: &ManifestUrl,
        max_duration: Duration,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<EncodeStatus, EncoderError> {
        info!(
            program = %self.program.display(),
            duration_secs = max_duration.as_secs(),
            output = %output.display(),
            "starting encoder"
        );

        let mut child = Command::new(&self.program)
            .args(Self::args(manifest, max_duration, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EncoderError::Spawn)?;

        // Drain stderr concurrently so a chatty process can never fill
        // the pipe, keeping only the tail for the diagnostic.
        let stderr = child.stderr.take();
        let tail = tokio::spawn(async move {
            let mut kept: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "encoder", "{line}");
                    if kept.len() == STDERR_TAIL_LINES {
                        kept.pop_front();
                    }
                    kept.push_back(line);
                }
            }
            kept.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = token.cancelled() => {
                warn!("cancellation requested, stopping encoder");
                child.start_kill().ok();
                child.wait().await?;
                tail.await.ok();
                return Ok(EncodeStatus::Interrupted);
            }
        };

        let diagnostic = tail.await.unwrap_or_default();
        if status.success() {
            Ok(EncodeStatus::Completed)
        } else {
            Err(EncoderError::Failed {
                status: status.to_string(),
                diagnostic,
            })
        }
    }
}
