use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error(
        "no chromium-compatible browser found; install one or point LECTIO_BROWSER at the binary"
    )]
    BrowserNotFound,
    #[error("browser failed to start: {0}")]
    Launch(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("devtools http endpoint error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed devtools message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("devtools protocol error: {0}")]
    Protocol(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("devtools connection closed")]
    ConnectionClosed,
}
