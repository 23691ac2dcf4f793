//! healthprobe binary entry point.
//!
//! Probes every configured host once, prints one line per target and exits
//! with the number of failed probes. A run that cannot start, for example
//! because the configuration file is unreadable, exits with
//! [`FATAL_EXIT_CODE`].

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use healthprobe::{
    config::{AppConfig, DEFAULT_CONFIG_PATH, parse_duration},
    dispatch::{Dispatcher, FATAL_EXIT_CODE},
    probe::ProbeRegistry,
    report::{OutputFormat, render},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One-shot endpoint health probes
#[derive(Parser, Debug)]
#[command(name = "healthprobe", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "HEALTHPROBE_CONFIG")]
    config: String,

    /// Probes in flight at once (overrides config file)
    #[arg(long, env = "HEALTHPROBE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Outer bound per target, e.g. `30s` (overrides config file)
    #[arg(long, value_parser = parse_duration, env = "HEALTHPROBE_TARGET_TIMEOUT")]
    target_timeout: Option<Duration>,

    /// Output format: text or json
    #[arg(long, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Disable colored output (NO_COLOR is honored as well)
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Load configuration from file; failure aborts before any probing
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(concurrency) = cli.concurrency {
        config.settings.concurrency = concurrency;
    }
    if let Some(target_timeout) = cli.target_timeout {
        config.settings.target_timeout = target_timeout;
    }
    config.validate()?;

    let loaded = config.targets();
    tracing::info!(
        "Loaded {} targets ({} host entries skipped)",
        loaded.targets.len(),
        loaded.omitted.len()
    );

    let registry = ProbeRegistry::new(config.settings.clone())?;
    if registry.uses_raw_icmp() {
        tracing::info!("ICMP probes use raw sockets and may need elevated privileges");
    }

    let report = Dispatcher::new(registry).run(&loaded.targets).await;

    let mut stdout = std::io::stdout().lock();
    render(&mut stdout, cli.format, &report, &loaded.omitted)?;
    stdout.flush()?;

    Ok(ExitCode::from(report.summary.exit_code()))
}
