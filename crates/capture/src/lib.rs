//! # Capture engine
//!
//! Core of the lectio stream recorder: schedules a single capture job,
//! discovers the stream's manifest URL by driving a page-rendering agent
//! and observing its network traffic, then records a bounded duration of
//! the stream through an external encoder.
//!
//! The rendering agent and the encoder are consumed through the narrow
//! [`agent::PageAgent`] and [`encoder::StreamEncoder`] contracts so the
//! engine stays independent of any concrete browser or media tool.

pub mod agent;
pub mod discovery;
pub mod encoder;
pub mod error;
pub mod gate;
pub mod interceptor;
pub mod orchestrator;
pub mod recording;
pub mod spec;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use agent::{AgentError, PageAgent, PageSession};
pub use discovery::{DiscoveryError, DiscoverySettings, ManifestDiscoverer};
pub use encoder::{EncodeStatus, EncoderError, FfmpegEncoder, StreamEncoder};
pub use error::Cancelled;
pub use gate::{Clock, SystemClock, TimeGate};
pub use interceptor::{ManifestInterceptor, RequestObserver};
pub use orchestrator::{CaptureOrchestrator, CaptureOutcome, CaptureState};
pub use recording::{RecordingJob, RecordingOutcome};
pub use spec::{CaptureSpec, ManifestUrl, SpecError};
pub use trigger::TriggerOutcome;
