//! `PageAgent` implementation backed by a launched browser.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use capture_engine::{AgentError, PageAgent, PageSession, RequestObserver};

use crate::chrome::{self, BrowserConfig, BrowserProcess};
use crate::client::CdpClient;
use crate::error::CdpError;

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Rendering agent that launches one isolated headless browser per
/// session and drives it over the DevTools protocol.
pub struct HeadlessBrowser {
    config: BrowserConfig,
    load_timeout: Duration,
    command_timeout: Duration,
}

impl HeadlessBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    async fn open_session(&self) -> Result<CdpPageSession, CdpError> {
        let browser = chrome::launch(&self.config).await?;
        let target = new_page_target(browser.devtools_port()).await?;
        debug!(ws = %target.web_socket_debugger_url, "attaching to page target");

        let client = CdpClient::connect(&target.web_socket_debugger_url, self.command_timeout)
            .await?;
        client.call("Network.enable", json!({})).await?;
        client.call("Page.enable", json!({})).await?;

        Ok(CdpPageSession {
            client,
            browser,
            load_timeout: self.load_timeout,
        })
    }
}

impl Default for HeadlessBrowser {
    fn default() -> Self {
        Self::new(BrowserConfig::default())
    }
}

#[async_trait]
impl PageAgent for HeadlessBrowser {
    async fn open(&self) -> Result<Box<dyn PageSession>, AgentError> {
        match self.open_session().await {
            Ok(session) => Ok(Box::new(session)),
            Err(reason) => Err(AgentError::Launch(reason.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageTarget {
    web_socket_debugger_url: String,
}

/// Creates a fresh page target through the DevTools HTTP endpoint and
/// returns its websocket address.
async fn new_page_target(port: u16) -> Result<PageTarget, CdpError> {
    let endpoint = format!("http://127.0.0.1:{port}/json/new?url=about:blank");
    let target = reqwest::Client::new()
        .put(&endpoint)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(target)
}

struct CdpPageSession {
    client: CdpClient,
    browser: BrowserProcess,
    load_timeout: Duration,
}

#[async_trait]
impl PageSession for CdpPageSession {
    fn observe_requests(&mut self, observer: RequestObserver) {
        self.client.set_request_observer(observer);
    }

    async fn navigate(&mut self, url: &Url) -> Result<(), AgentError> {
        let navigation_failed = |reason: String| AgentError::Navigation {
            url: url.to_string(),
            reason,
        };

        // Grab the notifier first: the load event may fire before the
        // navigate response is processed.
        let loaded = self.client.load_events();

        let result = self
            .client
            .call("Page.navigate", json!({ "url": url.as_str() }))
            .await
            .map_err(|reason| navigation_failed(reason.to_string()))?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(navigation_failed(error_text.to_string()));
            }
        }

        tokio::time::timeout(self.load_timeout, loaded.notified())
            .await
            .map_err(|_| {
                navigation_failed(format!(
                    "load event not fired within {:?}",
                    self.load_timeout
                ))
            })?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), AgentError> {
        let encoded = serde_json::to_string(selector)
            .map_err(|reason| AgentError::Interaction(reason.to_string()))?;
        let expression = format!(
            "(() => {{ const el = document.querySelector({encoded}); \
             if (!el) return false; el.click(); return true; }})()"
        );

        let result = self
            .client
            .call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await
            .map_err(|reason| AgentError::Interaction(reason.to_string()))?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception");
            return Err(AgentError::Interaction(text.to_string()));
        }

        let clicked = result
            .pointer("/result/value")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if clicked {
            Ok(())
        } else {
            Err(AgentError::Interaction(format!(
                "no element matches {selector}"
            )))
        }
    }

    async fn idle(&mut self, window: Duration) {
        tokio::time::sleep(window).await;
    }

    async fn close(self: Box<Self>) -> Result<(), AgentError> {
        let CdpPageSession {
            client, browser, ..
        } = *self;
        client.shutdown().await;
        browser
            .shutdown()
            .await
            .map_err(|reason| AgentError::Session(reason.to_string()))
    }
}
