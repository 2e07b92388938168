use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Parser;

use capture_engine::spec::{DEFAULT_DURATION_SECS, REFERENCE_TZ};

use crate::error::AppError;

/// Input format for the optional start time, interpreted in the
/// Europe/Prague reference zone.
pub const START_FORMAT: &str = "%Y-%m-%d-%H-%M";

#[derive(Parser, Debug)]
#[command(
    name = "lectio",
    version,
    about = "Scheduled recorder for live streams hidden behind a player page",
    long_about = "Waits until the configured start time, opens the page hosting the player in \
                  a headless browser to discover the stream's manifest URL from its network \
                  traffic, then records a bounded duration of the stream with ffmpeg."
)]
pub struct CliArgs {
    /// Name of the recording; reruns with the same name and start time
    /// overwrite the previous file
    pub name: String,

    /// URL of the page hosting the player (not the manifest itself),
    /// e.g. https://live.example/room123.html
    pub page_url: String,

    /// Recording length in seconds
    #[arg(default_value_t = DEFAULT_DURATION_SECS)]
    pub duration: u64,

    /// Start time as YYYY-MM-DD-HH-MM in the Europe/Prague time zone;
    /// starts immediately when omitted
    pub start: Option<String>,

    /// Directory the recording is written to (created if missing)
    #[arg(short, long, default_value = "recordings")]
    pub output_dir: PathBuf,

    /// Seconds to let the page settle after the playback interaction
    /// before judging discovery failed
    #[arg(long, default_value_t = 5)]
    pub settle_window: u64,

    /// Seconds between progress reports while waiting for the start time
    #[arg(long, default_value_t = 60)]
    pub poll_interval: u64,

    /// CSS selector of the element that starts playback
    #[arg(long, default_value = capture_engine::discovery::DEFAULT_PLAY_SELECTOR)]
    pub play_selector: String,

    /// Substring identifying the stream-manifest request
    #[arg(long, default_value = capture_engine::interceptor::DEFAULT_MARKER)]
    pub marker: String,

    /// Attempts at the playback interaction before giving up on it
    #[arg(long, default_value_t = 3)]
    pub max_tries: u32,

    /// Seconds between playback-interaction attempts
    #[arg(long, default_value_t = 1)]
    pub retry_delay: u64,

    /// Browser binary to use instead of auto-detection
    #[arg(long)]
    pub browser: Option<PathBuf>,

    /// ffmpeg binary to use
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Parses the start string in the reference zone. Malformed input is a
/// validation error reported before any work begins, never a silent
/// fallback to "now".
pub fn parse_start_time(input: &str) -> Result<DateTime<Utc>, AppError> {
    let naive = NaiveDateTime::parse_from_str(input, START_FORMAT).map_err(|_| {
        AppError::InvalidInput(format!(
            "invalid start time {input:?}, expected YYYY-MM-DD-HH-MM \
             (e.g. 2026-02-18-10-30 for 18. 02. 2026 10:30 Prague time)"
        ))
    })?;
    let local = naive
        .and_local_timezone(REFERENCE_TZ)
        .single()
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "start time {input:?} is ambiguous or skipped in the Europe/Prague zone"
            ))
        })?;
    Ok(local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_time_is_interpreted_in_prague() {
        // CET in winter: 10:30 Prague == 09:30 UTC.
        let parsed = parse_start_time("2026-02-18-10-30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 2, 18, 9, 30, 0).unwrap());
    }

    #[test]
    fn summer_start_time_honours_dst() {
        // CEST in summer: 10:30 Prague == 08:30 UTC.
        let parsed = parse_start_time("2026-06-18-10-30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 6, 18, 8, 30, 0).unwrap());
    }

    #[test]
    fn malformed_start_time_is_rejected() {
        for input in ["tomorrow", "2026-02-18 10:30", "2026-13-01-10-30", ""] {
            assert!(
                parse_start_time(input).is_err(),
                "{input:?} should be rejected"
            );
        }
    }
}
