//! Rendering-agent contract.
//!
//! Discovery needs exactly six capabilities from a page renderer: launch
//! an isolated headless session, observe outbound requests, navigate,
//! invoke a named element, idle for a fixed window, and tear the session
//! down deterministically. Everything else about the browser stays on
//! the other side of this boundary.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::interceptor::RequestObserver;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to launch rendering session: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("page interaction failed: {0}")]
    Interaction(String),
    #[error("rendering session failure: {0}")]
    Session(String),
}

/// Factory for isolated headless rendering sessions.
#[async_trait]
pub trait PageAgent: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, AgentError>;
}

/// One live page-rendering session.
///
/// Request observation is passive: every request proceeds unmodified
/// whether or not the observer looks at it. `close` must be safe to call
/// on every exit path and releases all session resources.
#[async_trait]
pub trait PageSession: Send {
    /// Registers the per-request observation callback. Must be wired
    /// before `navigate` so early requests are not missed.
    fn observe_requests(&mut self, observer: RequestObserver);

    async fn navigate(&mut self, url: &Url) -> Result<(), AgentError>;

    /// Locates `selector` and invokes it. A missing or not-yet-rendered
    /// element is an `Err`, never a panic, so callers can retry.
    async fn click(&mut self, selector: &str) -> Result<(), AgentError>;

    /// Lets the page run for a fixed window without driving it.
    async fn idle(&mut self, window: Duration);

    async fn close(self: Box<Self>) -> Result<(), AgentError>;
}
