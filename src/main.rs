use anyhow::{Context, Result};
use clap::Parser;
use simharness::analyzer::{self, AnalyzerOptions};
use simharness::cli::{Cli, OutputFormat};
use simharness::config::HarnessConfig;
use simharness::runner::CancellationToken;
use simharness::{report, runner};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; warnings always, everything with --debug
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> Result<HarnessConfig> {
    let base = match &args.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    let config = args.apply(base);
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;

    if args.format == OutputFormat::Text {
        println!(
            "--- Running Simulation: Tasks={}, Threads={} ---",
            config.task_count, config.worker_count
        );
    }

    // Ctrl-C terminates the simulation's process group instead of orphaning it
    let mut execution = config.execution_options();
    execution.cancel =
        Some(CancellationToken::on_interrupt().context("failed to install SIGINT handler")?);

    // A failed run is reported by the runner and yields no output
    let output = runner::capture_telemetry(&config.command(), &execution);

    let options = AnalyzerOptions {
        sim_time_policy: config.sim_time_policy,
        extended: args.stats_extended,
    };
    let analysis = analyzer::analyze(output.as_deref(), options)
        .context("failed to analyze simulation telemetry")?;

    if let Some(rendered) = report::render(&analysis, args.format)? {
        print!("{}", rendered);
    }

    Ok(())
}
