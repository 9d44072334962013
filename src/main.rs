use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{bail, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plasma_mc::controller::{default_workers, ControllerHandle, ControllerOptions, SimulationController};
use plasma_mc::io::{load_run_file, short_scientific};

#[derive(Parser, Debug)]
#[command(version, about = "Metropolis Monte Carlo for electron-ion plasmas", long_about = None)]
struct Args {
    /// YAML run file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
    /// Output root, overrides the run file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,
    /// Status refresh period, seconds
    #[arg(short, long)]
    refresh: Option<u64>,
    /// Grace period after a stop request, milliseconds
    #[arg(long, default_value_t = 1000)]
    grace: u64,
    /// Override the particle count of every point
    #[arg(long)]
    particles: Option<usize>,
    /// Override the step budget of every point
    #[arg(long)]
    steps: Option<usize>,
    /// Only run points at this temperature, K
    #[arg(long)]
    temperature: Option<u32>,
    /// Override the displacement factor of every point
    #[arg(long)]
    delta: Option<f64>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let run = load_run_file(&args.config)?;

    let mut configurations = run.configurations()?;
    if let Some(temperature) = args.temperature {
        configurations.retain(|c| c.temperature == temperature);
    }
    for config in &mut configurations {
        if let Some(particles) = args.particles {
            config.particles = particles;
        }
        if let Some(steps) = args.steps {
            config.steps = steps;
        }
        if let Some(delta) = args.delta {
            config.max_delta = delta;
        }
        config.validate()?;
    }
    if configurations.is_empty() {
        bail!("No calculation points in {}", args.config.display());
    }

    let output = args.output.or(run.output).unwrap_or_else(|| PathBuf::from("."));
    let options = ControllerOptions {
        workers: args.workers.or(run.workers).unwrap_or_else(default_workers),
        refresh: Duration::from_secs(args.refresh.or(run.refresh_seconds).unwrap_or(10)),
        grace: Duration::from_millis(args.grace),
        ..Default::default()
    };

    for config in &configurations {
        info!(
            point = %config.folder(),
            potential = ?config.potential,
            ensemble = ?config.ensemble,
            "T = {} K, n = {} cm^-3, gamma = {:.4}",
            config.temperature,
            short_scientific(config.density),
            config.gamma()
        );
    }

    let controller = SimulationController::new(&configurations, &output, options);
    watch_stdin(controller.handle());
    let statuses = controller.run()?;

    let failed = statuses.iter().filter(|s| s.latest.failed).count();
    if failed > 0 {
        warn!("{} of {} points failed", failed, statuses.len());
    }
    info!("all simulations finished");
    Ok(())
}

/// Stop gracefully when `stop` or `q` is entered.
fn watch_stdin(handle: ControllerHandle) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "stop" | "q" => {
                    info!("stop requested from the console");
                    handle.stop();
                    break;
                }
                "" => {}
                other => warn!("unknown command '{}', type 'stop' or 'q' to finish", other),
            }
        }
    });
}
