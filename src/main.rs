//! deploy-verify: post-deployment endpoint check.
//!
//! This is the binary entry point. It loads configuration from a TOML file,
//! initializes tracing, provisions the selected definition through the
//! terraform CLI, and verifies the resulting endpoint. Exits 0 when the
//! endpoint is healthy and with a failure-specific code otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deploy_verify::config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use deploy_verify::probe::HttpProbe;
use deploy_verify::provision::TerraformProvisioner;
use deploy_verify::{run_check, CheckError, CheckReport};

/// Verify that a freshly provisioned endpoint comes up healthy
#[derive(Parser, Debug)]
#[command(name = "deploy-verify", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Infrastructure definition directory (overrides provision.dir)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Log level filter (e.g., "deploy_verify=debug")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<AppConfig, CheckError> {
    let config = AppConfig::load(&args.config)?;
    match &args.dir {
        Some(dir) => Ok(config.with_dir(dir.clone())?),
        None => Ok(config),
    }
}

fn init_tracing(log_level: Option<String>, logging: &LoggingConfig) {
    // Priority: CLI > env > default
    let log_filter = log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));

    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Process exit code for a finished check
fn exit_code(result: &Result<CheckReport, CheckError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

async fn run(config: &AppConfig) -> Result<CheckReport, CheckError> {
    let provisioner = TerraformProvisioner::from_config(&config.provision);
    let probe = HttpProbe::new()?;
    run_check(config, &provisioner, probe).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Tracing is configured from the file, so config errors go straight to stderr
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    init_tracing(args.log_level, &config.logging);
    tracing::info!(
        dir = %config.provision.dir.display(),
        output_key = %config.provision.output_key,
        "Loaded configuration"
    );

    let result = run(&config).await;
    match &result {
        Ok(report) => {
            println!(
                "healthy: {} returned {} after {} attempt(s) in {:.1?}",
                report.url, report.status, report.attempts, report.elapsed
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Check failed");
            eprintln!("unhealthy: {}", e);
        }
    }
    ExitCode::from(exit_code(&result))
}
