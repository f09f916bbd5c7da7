//! Command-line driver: runs a population of bodies through the solver for
//! a fixed number of steps, printing a status line (and optionally a
//! density table) as it goes.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, Level};

use spread_bh::{Body, Boundary, DtMode, RunController, SimConfig};

/// Spreads a population of point masses toward a near-uniform
/// distribution on the unit torus, via Barnes-Hut repulsion.
#[derive(Parser, Debug)]
#[command(name = "spread", author, version, about)]
struct Cli {
    /// Number of steps to run.
    #[arg(short = 'n', long, default_value_t = 1000)]
    steps: u64,

    /// JSON file holding the initial bodies (an array of `{x, y, mass}`).
    /// If omitted, a random population is generated instead.
    #[arg(short, long)]
    bodies: Option<PathBuf>,

    /// Number of bodies in the random population (ignored if `--bodies`
    /// is given).
    #[arg(long, default_value_t = 500)]
    population: usize,

    /// Barnes-Hut opening angle θ.
    #[arg(long, default_value_t = 0.5)]
    theta: f64,

    /// Number of parallel force shards.
    #[arg(short, long, default_value_t = 8)]
    k: usize,

    /// Per-step drag factor σ.
    #[arg(long, default_value_t = 0.2)]
    sigma: f64,

    /// Per-step displacement cap Δx_max.
    #[arg(long, default_value_t = 0.001)]
    dx_max: f64,

    /// Repulsion softening η.
    #[arg(long, default_value_t = 0.0)]
    eta: f64,

    /// Manual Δt; if omitted, Δt is chosen automatically each step.
    #[arg(long)]
    dt: Option<f64>,

    /// Reflect off the unit square's edges instead of wrapping.
    #[arg(long)]
    reflect: bool,

    /// Print a decile density table every `report_every` steps.
    #[arg(long, default_value_t = 100)]
    report_every: u64,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let initial = match &cli.bodies {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<Body>>(&text)?
        }
        None => random_population(cli.population),
    };

    let config = SimConfig {
        theta: cli.theta,
        dt_mode: cli.dt.map(DtMode::Manual).unwrap_or(DtMode::Auto),
        k: cli.k,
        sigma: cli.sigma,
        dx_max: cli.dx_max,
        boundary: if cli.reflect { Boundary::Within } else { Boundary::Across },
        eta: cli.eta,
    };

    let controller = RunController::new(&initial, config)?;
    controller.start();

    for step in 1..=cli.steps {
        let want_density = cli.report_every > 0 && step % cli.report_every == 0;
        let report = controller.step(want_density)?;
        println!("{}", report.status_line());
        if let Some(table) = report.density {
            for (level, deciles) in table.iter().enumerate() {
                println!("  level {:>2}: {:?}", level, deciles);
            }
        }
    }

    Ok(())
}

fn random_population(n: usize) -> Vec<Body> {
    (0..n)
        .map(|_| Body::new(fastrand::f64(), fastrand::f64(), 1.0))
        .collect()
}
