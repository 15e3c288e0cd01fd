use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airbrake_sim::config::AirbrakeConfig;
use airbrake_sim::io::CsvDirectory;

#[derive(Parser)]
#[command(name = "airbrake-sim")]
#[command(about = "Closed-loop airbrake apogee control simulator")]
#[command(version)]
struct Cli {
    /// TOML configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured noise seed
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for CSV tables
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one recorded closed-loop trajectory
    Simulate {
        /// Run length in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },
    /// Grid-search the gains of the tuned channel
    Tune,
    /// Sweep initial-state offsets and tabulate apogee deviations
    Robustness,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AirbrakeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AirbrakeConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    let sink = CsvDirectory::new(&config.output_dir);
    let mut sim = config
        .build_simulator(sink)
        .context("assembling controller and plant")?;

    match cli.command {
        Commands::Simulate { duration } => {
            let duration = duration.unwrap_or(config.duration);
            let summary = sim.simulate(duration, true).context("closed-loop simulation")?;
            println!(
                "Apogee {:.1} m over {} steps (t_end = {:.2} s), tables in {}",
                summary.peak,
                summary.steps,
                summary.final_time,
                config.output_dir.display()
            );
        }
        Commands::Tune => {
            let result = sim.tune_with(&config.tuning).context("gain search")?;
            match result.best_gains {
                Some([p, i, d]) => println!(
                    "Best deviation {:.2} m over {} cells: p = {:.2}, i = {:.2}, d = {:.2}",
                    result.best_deviation, result.cells, p, i, d
                ),
                None => println!("Gain search space is empty"),
            }
        }
        Commands::Robustness => {
            let map = sim
                .robustness_with(&config.init_state(), &config.robustness)
                .context("robustness sweep")?;
            let worst = map.worst().map_or(0.0, |(_, w)| w);
            println!(
                "{} cells, worst apogee miss {:.1} m, tables in {}",
                map.deviations.nrows(),
                worst,
                config.output_dir.display()
            );
        }
    }

    Ok(())
}
