use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use icethermo::io::read_run_config;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Surface thermodynamics solver for ice accretion
#[derive(Parser)]
#[command(name = "icethermo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Film, temperature and ice accretion along an iced surface", long_about = None)]
struct Cli {
    /// Run description (JSON)
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Overrides the output directory of the run description
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = read_run_config(&cli.config)?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    let outputs = icethermo::run(&config)?;
    for out in &outputs {
        info!(
            "{}: {} ({} outer iterations)",
            out.solution.side.tag(),
            if out.solution.is_converged() {
                "converged"
            } else {
                "budget exhausted"
            },
            out.solution.status.iterations()
        );
    }
    Ok(())
}
