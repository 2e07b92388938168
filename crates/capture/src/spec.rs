//! Capture job description and derived output naming.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

/// Reference zone for output naming and start-time input. The original
/// deployment records lecture streams announced in Prague local time.
pub const REFERENCE_TZ: Tz = chrono_tz::Europe::Prague;

/// File extension of the recorded output.
pub const OUTPUT_EXT: &str = "mp4";

/// Default recording length when the caller gives none.
pub const DEFAULT_DURATION_SECS: u64 = 7200;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("recording name must not be empty")]
    EmptyName,
    #[error("invalid page url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("recording duration must be greater than zero")]
    ZeroDuration,
}

/// Immutable description of one capture job, validated on construction.
#[derive(Debug, Clone)]
pub struct CaptureSpec {
    name: String,
    page_url: Url,
    duration: Duration,
    start_at: DateTime<Utc>,
    output_file: String,
}

impl CaptureSpec {
    /// Validates the inputs and derives the output file name once.
    ///
    /// `page_url` is the page hosting the player, not the manifest
    /// itself. `start_at` in the past means "start immediately".
    pub fn new(
        name: impl Into<String>,
        page_url: &str,
        duration_secs: u64,
        start_at: DateTime<Utc>,
    ) -> Result<Self, SpecError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }
        if duration_secs == 0 {
            return Err(SpecError::ZeroDuration);
        }
        let page_url = Url::parse(page_url)?;

        let stamp = start_at
            .with_timezone(&REFERENCE_TZ)
            .format("%Y-%m-%d-%H-%M");
        let output_file = format!("{name}-{stamp}.{OUTPUT_EXT}");

        Ok(Self {
            name,
            page_url,
            duration: Duration::from_secs(duration_secs),
            start_at,
            output_file,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    /// Output location inside `dir`. Deterministic for a given spec, so a
    /// rerun of the same job overwrites rather than collides.
    pub fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.output_file)
    }
}

/// The discovered stream endpoint. Opaque: the engine never parses it,
/// it is handed to the encoder as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestUrl(String);

impl ManifestUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        // 10:30 Prague is 09:30 UTC in winter (CET, +01:00).
        Utc.with_ymd_and_hms(2026, 2, 18, 9, 30, 0).unwrap()
    }

    #[test]
    fn output_path_is_deterministic() {
        let a = CaptureSpec::new("lecture1", "https://live.example/room1.html", 5, start())
            .unwrap()
            .output_path(Path::new("/workspace"));
        let b = CaptureSpec::new("lecture1", "https://live.example/room1.html", 5, start())
            .unwrap()
            .output_path(Path::new("/workspace"));
        assert_eq!(a, b);
    }

    #[test]
    fn output_path_uses_reference_zone_calendar() {
        let spec =
            CaptureSpec::new("lecture1", "https://live.example/room1.html", 5, start()).unwrap();
        assert_eq!(
            spec.output_path(Path::new("/workspace")),
            PathBuf::from("/workspace/lecture1-2026-02-18-10-30.mp4"),
        );
    }

    #[test]
    fn rejects_empty_name() {
        let err = CaptureSpec::new("  ", "https://live.example/room1.html", 5, start());
        assert!(matches!(err, Err(SpecError::EmptyName)));
    }

    #[test]
    fn rejects_zero_duration() {
        let err = CaptureSpec::new("lecture1", "https://live.example/room1.html", 0, start());
        assert!(matches!(err, Err(SpecError::ZeroDuration)));
    }

    #[test]
    fn rejects_malformed_url() {
        let err = CaptureSpec::new("lecture1", "not a url", 5, start());
        assert!(matches!(err, Err(SpecError::InvalidUrl(_))));
    }
}
