//! In-crate fakes for the rendering-agent and encoder contracts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::agent::{AgentError, PageAgent, PageSession};
use crate::encoder::{EncodeStatus, EncoderError, StreamEncoder};
use crate::gate::Clock;
use crate::interceptor::RequestObserver;
use crate::spec::ManifestUrl;

/// Follows tokio's (possibly paused) clock from a fixed base instant,
/// so timed code under test sees virtual time advance.
pub(crate) struct TestClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl TestClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

/// Scripted rendering agent: emits a fixed set of request URLs at
/// navigation and idle time, with configurable failure modes.
#[derive(Default)]
pub(crate) struct FakeAgent {
    pub requests_on_navigate: Vec<String>,
    pub requests_on_idle: Vec<String>,
    pub fail_navigation: bool,
    pub click_failures: u32,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PageAgent for FakeAgent {
    async fn open(&self) -> Result<Box<dyn PageSession>, AgentError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            requests_on_navigate: self.requests_on_navigate.clone(),
            requests_on_idle: self.requests_on_idle.clone(),
            fail_navigation: self.fail_navigation,
            click_failures_left: self.click_failures,
            observer: None,
            closes: Arc::clone(&self.closes),
        }))
    }
}

pub(crate) struct FakeSession {
    requests_on_navigate: Vec<String>,
    requests_on_idle: Vec<String>,
    fail_navigation: bool,
    click_failures_left: u32,
    observer: Option<RequestObserver>,
    closes: Arc<AtomicUsize>,
}

impl FakeSession {
    fn emit(&self, urls: &[String]) {
        if let Some(observer) = &self.observer {
            for url in urls {
                observer(url);
            }
        }
    }
}

#[async_trait]
impl PageSession for FakeSession {
    fn observe_requests(&mut self, observer: RequestObserver) {
        self.observer = Some(observer);
    }

    async fn navigate(&mut self, url: &Url) -> Result<(), AgentError> {
        if self.fail_navigation {
            return Err(AgentError::Navigation {
                url: url.to_string(),
                reason: "name resolution failed".into(),
            });
        }
        let requests = self.requests_on_navigate.clone();
        self.emit(&requests);
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), AgentError> {
        if self.click_failures_left > 0 {
            self.click_failures_left -= 1;
            return Err(AgentError::Interaction(format!("{selector} not rendered")));
        }
        Ok(())
    }

    async fn idle(&mut self, _window: Duration) {
        let requests = self.requests_on_idle.clone();
        self.emit(&requests);
    }

    async fn close(self: Box<Self>) -> Result<(), AgentError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) enum FakeEncodeBehavior {
    /// Writes a small output file and reports completion.
    Succeed,
    /// Reports a failed run with the given diagnostic.
    Fail(String),
}

/// Records every invocation; never retries are expected of it.
pub(crate) struct FakeEncoder {
    pub behavior: FakeEncodeBehavior,
    pub invocations: Mutex<Vec<(ManifestUrl, Duration, PathBuf)>>,
}

impl FakeEncoder {
    pub fn new(behavior: FakeEncodeBehavior) -> Self {
        Self {
            behavior,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<(ManifestUrl, Duration, PathBuf)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamEncoder for FakeEncoder {
    async fn encode(
        &self,
        manifest: &ManifestUrl,
        max_duration: Duration,
        output: &Path,
        _token: &CancellationToken,
    ) -> Result<EncodeStatus, EncoderError> {
        self.invocations
            .lock()
            .unwrap()
            .push((manifest.clone(), max_duration, output.to_path_buf()));
        match &self.behavior {
            FakeEncodeBehavior::Succeed => {
                tokio::fs::write(output, b"fake recording").await?;
                Ok(EncodeStatus::Completed)
            }
            FakeEncodeBehavior::Fail(diagnostic) => Err(EncoderError::Failed {
                status: "exit status: 1".into(),
                diagnostic: diagnostic.clone(),
            }),
        }
    }
}
