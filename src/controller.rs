//! The run controller: owns the live simulation state behind a single
//! lock, drives it step by step, and exposes a small STOPPED/RUNNING state
//! machine a caller can poll or drive on a timer.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::body::{Body, BodyStore};
use crate::config::SimConfig;
use crate::dispatch;
use crate::error::SimError;
use crate::integrator::{self, StepMetrics};
use crate::stats::{self, DensityTable};
use crate::tree::Quadtree;

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;

/// Everything produced by a single [`RunController::step`] call.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub step: u64,
    pub positions: Vec<(f64, f64)>,
    pub min_inter_body_distance: f64,
    pub max_accel: f64,
    pub dt_used: f64,
    pub v_max: f64,
    pub capped_ratio: f64,
    pub computations: u64,
    pub density: Option<DensityTable>,
}

impl StepReport {
    /// A terse, single-line rendering suitable for a CLI status line.
    pub fn status_line(&self) -> String {
        format!(
            "step {:>6}  n={:<5}  dt={:.6}  v_max={:.6}  r_min={:.6}  capped={:.1}%  computations={}",
            self.step,
            self.positions.len(),
            self.dt_used,
            self.v_max,
            self.min_inter_body_distance,
            self.capped_ratio * 100.0,
            self.computations,
        )
    }
}

struct Simulation {
    bodies: BodyStore,
    tree: Quadtree,
    config: SimConfig,
    computations: AtomicU64,
    step: u64,
}

impl Simulation {
    fn new(initial: &[Body], config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut bodies = BodyStore::new(initial)?;
        let mut tree = Quadtree::new();
        tree.bootstrap(&mut bodies);
        tree.recompute_aggregates(&bodies);
        Ok(Self { bodies, tree, config, computations: AtomicU64::new(0), step: 0 })
    }

    fn step(&mut self, want_density: bool) -> Result<StepReport, SimError> {
        let n = self.bodies.len();
        let mut ax = vec![0.0; n];
        let mut ay = vec![0.0; n];

        let force_summary =
            dispatch::compute_forces(&self.tree, &self.bodies, &self.config, &mut ax, &mut ay, &self.computations)?;

        let dt = integrator::choose_dt(&self.config, force_summary.min_inter_body_distance, force_summary.max_accel);
        let metrics: StepMetrics = integrator::integrate(&mut self.bodies, &ax, &ay, &self.config, dt)?;

        self.tree.rebucket(&mut self.bodies)?;
        self.tree.recompute_aggregates(&self.bodies);

        self.step += 1;
        debug!(step = self.step, dt, v_max = metrics.v_max, "completed step");

        let density = if want_density { Some(stats::density_table(&self.tree)) } else { None };

        Ok(StepReport {
            step: self.step,
            positions: self.bodies.positions(),
            min_inter_body_distance: force_summary.min_inter_body_distance,
            max_accel: force_summary.max_accel,
            dt_used: metrics.dt_used,
            v_max: metrics.v_max,
            capped_ratio: metrics.capped_ratio,
            computations: self.computations.load(Ordering::Relaxed),
            density,
        })
    }
}

/// Owns a simulation and a run/stop flag; safe to share across threads.
/// The simulation itself lives behind a `parking_lot::Mutex` ("the
/// rendering mutex"): a caller reading a snapshot for display takes the
/// same lock a step briefly holds, so it never observes a half-updated
/// tree.
pub struct RunController {
    sim: Mutex<Simulation>,
    state: AtomicU8,
    pending_config: Mutex<Option<SimConfig>>,
}

impl RunController {
    pub fn new(initial: &[Body], config: SimConfig) -> Result<Arc<Self>, SimError> {
        let sim = Simulation::new(initial, config)?;
        Ok(Arc::new(Self {
            sim: Mutex::new(sim),
            state: AtomicU8::new(STOPPED),
            pending_config: Mutex::new(None),
        }))
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    pub fn start(&self) {
        self.state.store(RUNNING, Ordering::Release);
        info!("run started");
    }

    pub fn stop(&self) {
        self.state.store(STOPPED, Ordering::Release);
        info!("run stopped");
    }

    /// Queues a config change to take effect at the next step boundary,
    /// rather than mutating live state mid-step.
    pub fn reconfigure(&self, config: SimConfig) -> Result<(), SimError> {
        config.validate()?;
        *self.pending_config.lock() = Some(config);
        Ok(())
    }

    /// Advances the simulation by exactly one step, applying any pending
    /// config change first.
    pub fn step(&self, want_density: bool) -> Result<StepReport, SimError> {
        let mut sim = self.sim.lock();
        if let Some(cfg) = self.pending_config.lock().take() {
            sim.config = cfg;
        }
        sim.step(want_density)
    }

    /// A snapshot of current positions without advancing the simulation,
    /// taken under the same lock a step uses.
    pub fn snapshot_positions(&self) -> Vec<(f64, f64)> {
        self.sim.lock().bodies.positions()
    }

    /// Runs `step` in a loop, sleeping `poll_interval` between checks of
    /// the run/stop flag. Honors [`RunController::stop`] only at step
    /// boundaries, a step in progress always finishes. Returns on the
    /// first step error, which callers should treat as a fatal condition
    /// per the run's own error taxonomy.
    pub fn drive(self: &Arc<Self>, poll_interval: Duration, want_density: bool) -> Result<(), SimError> {
        loop {
            if !self.is_running() {
                std::thread::sleep(poll_interval);
                continue;
            }
            match self.step(want_density) {
                Ok(report) => {
                    if report.step % 1000 == 0 {
                        info!(%report.step, "checkpoint");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "step failed, stopping run");
                    self.stop();
                    return Err(e);
                }
            }
        }
    }
}
