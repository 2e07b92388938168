//! Browser executable discovery and headless process launch.

use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::CdpError;

/// Environment override for the browser binary.
pub const BROWSER_ENV: &str = "LECTIO_BROWSER";

const DEVTOOLS_BANNER: &str = "DevTools listening on ";

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Explicit browser binary; when unset the binary is discovered from
    /// the environment, `PATH` and well-known install locations.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Deadline for the DevTools endpoint to come up after spawn.
    pub launch_timeout: Duration,
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            launch_timeout: Duration::from_secs(20),
            extra_args: Vec::new(),
        }
    }
}

/// A running browser with its DevTools endpoint. The temporary profile
/// directory lives exactly as long as the process handle.
pub(crate) struct BrowserProcess {
    child: Child,
    port: u16,
    _profile: TempDir,
}

impl BrowserProcess {
    pub(crate) fn devtools_port(&self) -> u16 {
        self.port
    }

    /// Stops the browser and reaps the process.
    pub(crate) async fn shutdown(mut self) -> Result<(), CdpError> {
        self.child.start_kill().ok();
        self.child.wait().await?;
        Ok(())
    }
}

pub(crate) fn resolve_executable(config: &BrowserConfig) -> Option<PathBuf> {
    if let Some(explicit) = &config.executable {
        return Some(explicit.clone());
    }
    detect_executable()
}

fn detect_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(BROWSER_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
            warn!(%BROWSER_ENV, path = trimmed, "configured browser binary does not exist");
        }
    }

    for name in executable_names() {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    os_specific_paths().into_iter().find(|path| path.exists())
}

fn executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(root) = env::var(key) {
                paths.push(PathBuf::from(&root).join("Google/Chrome/Application/chrome.exe"));
                paths.push(PathBuf::from(&root).join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

/// Spawns the browser with an ephemeral DevTools port and waits for the
/// endpoint banner on stderr.
pub(crate) async fn launch(config: &BrowserConfig) -> Result<BrowserProcess, CdpError> {
    let executable = resolve_executable(config).ok_or(CdpError::BrowserNotFound)?;
    let profile = tempfile::Builder::new()
        .prefix("lectio-profile-")
        .tempdir()?;

    let mut command = Command::new(&executable);
    command
        .arg("--remote-debugging-port=0")
        .arg(format!("--user-data-dir={}", profile.path().display()))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--disable-gpu");
    if config.headless {
        command.arg("--headless=new");
    }
    command
        .args(&config.extra_args)
        .arg("about:blank")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(executable = %executable.display(), "launching browser");
    let mut child = command.spawn()?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CdpError::Launch("browser stderr was not captured".into()))?;
    let mut lines = BufReader::new(stderr).lines();

    let ws_url = timeout(config.launch_timeout, async {
        let mut seen = Vec::new();
        while let Some(line) = lines.next_line().await? {
            trace!(target: "browser", "{line}");
            if let Some(rest) = line.trim().strip_prefix(DEVTOOLS_BANNER) {
                return Ok(rest.trim().to_string());
            }
            seen.push(line);
        }
        // stderr closed: the process died before the endpoint came up.
        Err(CdpError::Launch(format!(
            "browser exited during startup: {}",
            seen.join("\n")
        )))
    })
    .await
    .map_err(|_| CdpError::Timeout("the DevTools endpoint to come up".into()))??;

    // Keep draining stderr so the browser can never block on the pipe.
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            trace!(target: "browser", "{line}");
        }
    });

    let port = Url::parse(&ws_url)
        .ok()
        .and_then(|url| url.port())
        .ok_or_else(|| CdpError::Launch(format!("unparseable DevTools endpoint: {ws_url}")))?;

    debug!(%ws_url, port, "browser ready");
    Ok(BrowserProcess {
        child,
        port,
        _profile: profile,
    })
}
