//! Manifest discovery: render the hosting page, watch its traffic.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::agent::{AgentError, PageAgent, PageSession};
use crate::error::Cancelled;
use crate::interceptor::{self, ManifestInterceptor};
use crate::spec::ManifestUrl;
use crate::trigger::{self, TriggerOutcome};

pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_secs(5);

/// Selector of the interaction that starts playback on the target pages.
pub const DEFAULT_PLAY_SELECTOR: &str = r#"button[title="Play Video"]"#;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("could not open rendering session: {0}")]
    Session(#[source] AgentError),
    #[error("page navigation failed: {0}")]
    Navigation(#[source] AgentError),
    /// Distinct from [`DiscoveryError::Navigation`]: the page loaded but
    /// never requested a manifest inside the settle window.
    #[error("no manifest request observed within {settle:?}")]
    NoManifest { settle: Duration },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Wait after the playback interaction, allowing the player to issue
    /// its manifest request asynchronously. Fixed and explicit: a slow
    /// page that fires later than this is reported as a failure, never
    /// silently waited out.
    pub settle_window: Duration,
    pub play_selector: String,
    pub manifest_marker: String,
    pub max_tries: u32,
    pub retry_delay: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            settle_window: DEFAULT_SETTLE_WINDOW,
            play_selector: DEFAULT_PLAY_SELECTOR.into(),
            manifest_marker: interceptor::DEFAULT_MARKER.into(),
            max_tries: trigger::DEFAULT_MAX_TRIES,
            retry_delay: trigger::DEFAULT_RETRY_DELAY,
        }
    }
}

/// Owns one rendering session per discovery run and guarantees its
/// release on every exit path. The manifest cell is only read after the
/// session is gone, so no request callback can race the hand-off.
pub struct ManifestDiscoverer {
    agent: Arc<dyn PageAgent>,
    settings: DiscoverySettings,
}

impl ManifestDiscoverer {
    pub fn new(agent: Arc<dyn PageAgent>) -> Self {
        Self {
            agent,
            settings: DiscoverySettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DiscoverySettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn discover(
        &self,
        page_url: &Url,
        token: &CancellationToken,
    ) -> Result<ManifestUrl, DiscoveryError> {
        if token.is_cancelled() {
            return Err(Cancelled::during("discovering the manifest").into());
        }

        let mut session = self.agent.open().await.map_err(DiscoveryError::Session)?;
        let interceptor = ManifestInterceptor::new(self.settings.manifest_marker.as_str());
        session.observe_requests(interceptor.observer());

        info!(%page_url, "navigating to the hosting page");
        if let Err(reason) = session.navigate(page_url).await {
            release(session).await;
            return Err(DiscoveryError::Navigation(reason));
        }

        let triggered = trigger::attempt(
            async || session.click(&self.settings.play_selector).await,
            self.settings.max_tries,
            self.settings.retry_delay,
            token,
        )
        .await;
        match triggered {
            Ok(TriggerOutcome::Triggered { tries }) => {
                debug!(tries, "playback triggered");
            }
            // Non-fatal: attempt() already warned about the exhaustion.
            Ok(TriggerOutcome::Exhausted { .. }) => {}
            Err(cancelled) => {
                release(session).await;
                return Err(cancelled.into());
            }
        }

        debug!(settle = ?self.settings.settle_window, "settling for asynchronous player traffic");
        session.idle(self.settings.settle_window).await;
        release(session).await;

        interceptor.manifest().ok_or(DiscoveryError::NoManifest {
            settle: self.settings.settle_window,
        })
    }
}

async fn release(session: Box<dyn PageSession>) {
    if let Err(reason) = session.close().await {
        warn!(%reason, "rendering session did not close cleanly");
    }
}
