use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, info};
use soilwater_balance::{ModelInput, PlotMode, chart_series, write_results_file, write_series};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Daily tipping-bucket soil water balance
#[derive(Parser)]
#[command(name = "soilwater_balance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Layered tipping-bucket soil water balance", long_about = None)]
struct Cli {
    /// Model input file (TOML)
    #[arg(short, long)]
    input: PathBuf,

    /// Daily results file
    #[arg(short, long, default_value = "balance.csv")]
    output: PathBuf,

    /// Number of days to simulate, overriding the input file
    #[arg(short = 'n', long)]
    days: Option<usize>,

    /// Also write chart series next to the results
    #[arg(short, long, value_enum)]
    plot: Option<PlotMode>,

    /// Log level (trace, debug, info, warn, error); falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let level = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .or_else(|| std::env::var("RUST_LOG").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let input = ModelInput::from_file(&cli.input)
        .with_context(|| format!("reading model input {}", cli.input.display()))?;
    let mut simulator = input.build_simulator(cli.days)?;
    simulator.run_to_end()?;

    let balance = simulator.mass_balance();
    info!(
        "{} days simulated, cumulative residual {:.3e} mm",
        simulator.days_completed(),
        balance.residual
    );

    let results = simulator.into_results();
    write_results_file(&cli.output, &results)
        .with_context(|| format!("writing results to {}", cli.output.display()))?;
    info!("results written to {}", cli.output.display());

    if let Some(plot) = cli.plot {
        let path = cli.output.with_extension("plot.csv");
        let mut writer = BufWriter::new(File::create(&path)?);
        write_series(&mut writer, &chart_series(&results, plot))?;
        writer.flush()?;
        info!("chart series written to {}", path.display());
    }
    Ok(())
}
