//! End-to-end capture pipeline: wait, discover, record, report.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::PageAgent;
use crate::discovery::{DiscoveryError, DiscoverySettings, ManifestDiscoverer};
use crate::encoder::StreamEncoder;
use crate::error::Cancelled;
use crate::gate::TimeGate;
use crate::recording::{RecordingJob, RecordingOutcome};
use crate::spec::CaptureSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Waiting,
    Discovering,
    Recording,
    Completed,
    Failed,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CaptureState::Idle => "idle",
            CaptureState::Waiting => "waiting",
            CaptureState::Discovering => "discovering",
            CaptureState::Recording => "recording",
            CaptureState::Completed => "completed",
            CaptureState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Terminal result of one capture run. The three failure shapes are
/// materially different situations for an unattended job and keep their
/// own diagnostics.
#[derive(Debug)]
pub enum CaptureOutcome {
    Completed {
        output: PathBuf,
        flush_confirmed: bool,
    },
    DiscoveryFailed(DiscoveryError),
    EncodingFailed {
        diagnostic: String,
    },
    Cancelled(Cancelled),
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Completed { .. })
    }
}

impl fmt::Display for CaptureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureOutcome::Completed {
                output,
                flush_confirmed: true,
            } => write!(f, "recording saved at {}", output.display()),
            CaptureOutcome::Completed {
                output,
                flush_confirmed: false,
            } => write!(
                f,
                "recording saved at {} but persistence could not be confirmed",
                output.display()
            ),
            CaptureOutcome::DiscoveryFailed(reason) => {
                write!(f, "no stream link found: {reason}")
            }
            CaptureOutcome::EncodingFailed { diagnostic } => {
                write!(f, "stream link found but recording failed: {diagnostic}")
            }
            CaptureOutcome::Cancelled(reason) => reason.fmt(f),
        }
    }
}

/// Drives one capture job through
/// `Idle → Waiting → Discovering → Recording → {Completed | Failed}`.
///
/// Discovery fully finishes (session released) before recording starts,
/// so the rendering agent and the encoder are never active at the same
/// time. The pipeline never loops: a terminal state is final.
pub struct CaptureOrchestrator {
    spec: CaptureSpec,
    output_dir: PathBuf,
    gate: TimeGate,
    discoverer: ManifestDiscoverer,
    job: RecordingJob,
    state: watch::Sender<CaptureState>,
    trail: Mutex<Vec<CaptureState>>,
}

impl CaptureOrchestrator {
    pub fn new(
        spec: CaptureSpec,
        output_dir: impl Into<PathBuf>,
        agent: Arc<dyn PageAgent>,
        encoder: Arc<dyn StreamEncoder>,
    ) -> Self {
        let (state, _) = watch::channel(CaptureState::Idle);
        Self {
            spec,
            output_dir: output_dir.into(),
            gate: TimeGate::default(),
            discoverer: ManifestDiscoverer::new(agent),
            job: RecordingJob::new(encoder),
            state,
            trail: Mutex::new(vec![CaptureState::Idle]),
        }
    }

    pub fn with_gate(mut self, gate: TimeGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_discovery(mut self, settings: DiscoverySettings) -> Self {
        self.discoverer = self.discoverer.with_settings(settings);
        self
    }

    pub fn spec(&self) -> &CaptureSpec {
        &self.spec
    }

    /// Current state, for embedders that follow progress concurrently.
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Every state this run has passed through, in order.
    pub fn transitions(&self) -> Vec<CaptureState> {
        self.trail.lock().unwrap().clone()
    }

    fn transition(&self, state: CaptureState) {
        info!(%state, name = self.spec.name(), "capture state");
        self.trail.lock().unwrap().push(state);
        self.state.send_replace(state);
    }

    pub async fn run(&self, token: &CancellationToken) -> CaptureOutcome {
        self.transition(CaptureState::Waiting);
        if let Err(cancelled) = self.gate.wait_until(self.spec.start_at(), token).await {
            self.transition(CaptureState::Failed);
            return CaptureOutcome::Cancelled(cancelled);
        }

        self.transition(CaptureState::Discovering);
        let manifest = match self.discoverer.discover(self.spec.page_url(), token).await {
            Ok(manifest) => {
                info!(%manifest, "stream manifest discovered");
                manifest
            }
            Err(DiscoveryError::Cancelled(cancelled)) => {
                self.transition(CaptureState::Failed);
                return CaptureOutcome::Cancelled(cancelled);
            }
            Err(reason) => {
                error!(%reason, "manifest discovery failed, nothing to record");
                self.transition(CaptureState::Failed);
                return CaptureOutcome::DiscoveryFailed(reason);
            }
        };

        self.transition(CaptureState::Recording);
        let output = self.spec.output_path(&self.output_dir);
        match self
            .job
            .run(&manifest, self.spec.duration(), &output, token)
            .await
        {
            RecordingOutcome::Completed { flush_confirmed } => {
                self.transition(CaptureState::Completed);
                CaptureOutcome::Completed {
                    output,
                    flush_confirmed,
                }
            }
            RecordingOutcome::Failed { diagnostic } => {
                self.transition(CaptureState::Failed);
                CaptureOutcome::EncodingFailed { diagnostic }
            }
            RecordingOutcome::Interrupted { flush_confirmed } => {
                warn!(
                    output = %output.display(),
                    flush_confirmed,
                    "capture cancelled mid-recording, partial output kept"
                );
                self.transition(CaptureState::Failed);
                CaptureOutcome::Cancelled(Cancelled::during("recording the stream"))
            }
        }
    }
}
