//! # neurosity-capture
//!
//! Records every real-time metric of a Neurosity headset into
//! `session_YYYYMMDD-HHMMSS/<metric>.txt` for a fixed duration plus buffer.
//! Credentials missing from both the environment and `./.env` are prompted
//! for.

use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod app;
mod prompt;

use app::{print_report, print_session_details};
use prompt::TerminalPrompter;

use neurosity_capture::{CaptureConfig, CaptureRun, CredentialResolver, GatewayCloud, load_dotenv};

/// Capture all Neurosity metric streams to per-metric log files.
#[derive(Parser)]
#[command(name = "neurosity-capture", version, about)]
struct Cli {
    /// Capture duration in minutes
    #[arg(short, long)]
    duration: Option<u64>,

    /// Extra minutes to keep recording after the duration
    #[arg(short, long)]
    buffer: Option<u64>,

    /// Path to neurosity-capture.toml config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway WebSocket URL override
    #[arg(long)]
    url: Option<String>,

    /// Enable verbose logging (set RUST_LOG for fine-grained control)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "neurosity_capture=debug,neurosity_capture_cli=debug"
    } else {
        "neurosity_capture=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// First Ctrl-C stops the capture gracefully, the second exits at once.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!(
            "\n{}",
            "Interrupted. Unsubscribing and writing the report...".yellow()
        );
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted again. Exiting immediately.".red());
            std::process::exit(130);
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match CaptureConfig::discover(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "Invalid configuration:".red(), e);
            return Err(e.into());
        }
    };
    if let Some(url) = cli.url {
        config.gateway_url = url;
    }
    if let Some(duration) = cli.duration {
        config.duration_minutes = duration;
    }
    if let Some(buffer) = cli.buffer {
        config.buffer_minutes = buffer;
    }
    tracing::debug!(?config, "Resolved capture config");

    println!(
        "{} Neurosity Capture",
        "╔══════════════════════════════════╗\n║".bright_blue()
    );
    println!("{}", "╚══════════════════════════════════╝".bright_blue());

    let dotenv = match load_dotenv(Path::new(".")) {
        Ok(vars) => vars,
        Err(e) => {
            eprintln!("{} {}", "Unreadable .env file:".red(), e);
            return Err(e.into());
        }
    };
    let mut resolver = CredentialResolver::with_dotenv(TerminalPrompter, dotenv);
    let profile = match resolver.resolve_profile() {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("{} {}", "Missing configuration:".red(), e);
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    println!("Connecting to {}...", config.gateway_url.cyan());
    let cloud = GatewayCloud::new(config.clone());
    let run = match CaptureRun::start(&cloud, &profile, config.session_window()).await {
        Ok(run) => run,
        Err(e) => {
            eprintln!("{} {}", "Login failed:".red(), e);
            return Err(e.into());
        }
    };

    print_session_details(run.info(), &profile.credentials.password.masked());
    println!(
        "Data streaming has started and will stop in {} mins (+{} min buffer).",
        config.duration_minutes, config.buffer_minutes
    );
    println!("Use Ctrl+C to stop manually.");

    let report = run.capture(cancel).await;
    print_report(&report);

    Ok(())
}
