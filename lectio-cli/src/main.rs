mod cli;
mod error;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use capture_engine::spec::REFERENCE_TZ;
use capture_engine::{
    CaptureOrchestrator, CaptureOutcome, CaptureSpec, DiscoverySettings, FfmpegEncoder, TimeGate,
};
use cdp_agent::{BrowserConfig, HeadlessBrowser};

use cli::CliArgs;
use error::AppError;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();
    init_logging(args.verbose, args.quiet);

    // Validate the whole job description before any scheduling or
    // network work; a bad start string must never default to "now".
    let start_at = match &args.start {
        Some(input) => cli::parse_start_time(input)?,
        None => Utc::now(),
    };
    let spec = CaptureSpec::new(&args.name, &args.page_url, args.duration, start_at)?;

    // The core never creates directories, the CLI does.
    std::fs::create_dir_all(&args.output_dir)?;

    info!(
        name = spec.name(),
        page = %spec.page_url(),
        start = %spec.start_at().with_timezone(&REFERENCE_TZ).format("%d. %m. %Y %H:%M"),
        duration_secs = args.duration,
        "going to record"
    );

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            interrupt.cancel();
        }
    });

    let browser = HeadlessBrowser::new(BrowserConfig {
        executable: args.browser.clone(),
        ..BrowserConfig::default()
    });
    let encoder = FfmpegEncoder::new(&args.ffmpeg);
    let settings = DiscoverySettings {
        settle_window: Duration::from_secs(args.settle_window),
        play_selector: args.play_selector.clone(),
        manifest_marker: args.marker.clone(),
        max_tries: args.max_tries,
        retry_delay: Duration::from_secs(args.retry_delay),
    };

    let orchestrator = CaptureOrchestrator::new(
        spec,
        &args.output_dir,
        Arc::new(browser),
        Arc::new(encoder),
    )
    .with_gate(TimeGate::new(Duration::from_secs(args.poll_interval)))
    .with_discovery(settings);

    match orchestrator.run(&token).await {
        CaptureOutcome::Completed {
            output,
            flush_confirmed,
        } => {
            if flush_confirmed {
                info!(output = %output.display(), "recording finished");
            } else {
                warn!(
                    output = %output.display(),
                    "recording finished but persistence could not be confirmed"
                );
            }
            Ok(())
        }
        failed => Err(AppError::Capture(failed)),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
