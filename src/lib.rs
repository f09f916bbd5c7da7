//! Barnes-Hut repulsion solver for spreading a population of point masses
//! toward a near-uniform distribution on the unit torus `[0, 1)^2`.
//!
//! The core loop, per step, is: compute each body's repulsive acceleration
//! against every other body via a hierarchical approximation over a
//! static, depth-limited quadtree (`tree`, `kernel`, `dispatch`), then
//! integrate positions and velocities under drag and a displacement cap
//! (`integrator`), then re-bucket bodies into the tree and recompute its
//! aggregates for the next step. [`RunController`] owns this loop and
//! exposes it as a small start/stop state machine.

pub mod body;
pub mod config;
pub mod controller;
pub mod coord;
pub mod dispatch;
pub mod error;
pub mod integrator;
pub mod kernel;
pub mod stats;
pub mod torus;
pub mod tree;

pub use body::{Body, BodyStore};
pub use config::{Boundary, DtMode, SimConfig};
pub use controller::{RunController, StepReport};
pub use error::SimError;
pub use stats::{decile_ratio, density_table, DensityTable};
pub use tree::Quadtree;
