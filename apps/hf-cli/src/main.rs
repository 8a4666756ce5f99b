use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hf_sim::SimulatorConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod station;
mod swing_up;

use error::{CliResult, read_file};

#[derive(Parser)]
#[command(name = "hf-cli")]
#[command(about = "hybridflow CLI - hybrid system simulation and trajectory optimization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize an acrobot swing-up and replay it in simulation
    SwingUp {
        /// Playback speed relative to wall clock (0 runs as fast as possible)
        #[arg(long, default_value_t = 1.0)]
        realtime_rate: f64,
        /// Number of knot points
        #[arg(long, default_value_t = 21)]
        samples: usize,
        /// Minimum trajectory duration in seconds
        #[arg(long, default_value_t = 2.0)]
        t_min: f64,
        /// Maximum trajectory duration in seconds
        #[arg(long, default_value_t = 10.0)]
        t_max: f64,
        /// Acrobot model file (YAML); defaults to the standard parameters
        #[arg(long)]
        model: Option<PathBuf>,
        /// Solver options file (YAML)
        #[arg(long)]
        solver_config: Option<PathBuf>,
        /// Simulator options file (YAML); --realtime-rate overrides its rate
        #[arg(long)]
        sim_config: Option<PathBuf>,
    },
    /// Run a mock two-joint station driven over an in-process transport
    Station {
        /// Playback speed relative to wall clock (0 runs as fast as possible)
        #[arg(long, default_value_t = 1.0)]
        realtime_rate: f64,
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Simulator options file (YAML); --realtime-rate overrides its rate
        #[arg(long)]
        sim_config: Option<PathBuf>,
    },
}

fn sim_config(path: Option<&Path>, realtime_rate: f64) -> CliResult<SimulatorConfig> {
    let mut config = match path {
        Some(path) => SimulatorConfig::from_yaml_str(&read_file(path)?)?,
        None => SimulatorConfig::default(),
    };
    config.target_realtime_rate = realtime_rate;
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::SwingUp {
            realtime_rate,
            samples,
            t_min,
            t_max,
            model,
            solver_config,
            sim_config: sim_path,
        } => sim_config(sim_path.as_deref(), realtime_rate).and_then(|config| {
            swing_up::run(&swing_up::SwingUpArgs {
                samples,
                t_min,
                t_max,
                model,
                solver_config,
                config,
            })
        }),
        Commands::Station {
            realtime_rate,
            duration,
            sim_config: sim_path,
        } => sim_config(sim_path.as_deref(), realtime_rate)
            .and_then(|config| station::run(duration, config)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
