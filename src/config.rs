//! Simulation configuration: the opening angle, time-step mode, shard
//! count, drag, displacement cap, boundary policy and softening. This is
//! the one validated boundary for user-facing parameters; `validate`
//! rejects out-of-range values without touching any live state, so a
//! rejected update leaves prior values in place.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// How the per-step time step is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DtMode {
    /// Δt is derived each step from `sqrt(0.5 * r_min / F_max)`.
    Auto,
    /// Δt is whatever the caller last requested.
    Manual(f64),
}

/// Boundary policy applied after the position update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Coordinates wrap: consistent with the torus metric used for forces.
    Across,
    /// Elastic reflection off the unit square's edges. Breaks the torus
    /// assumption the force kernel relies on; kept only for demonstration.
    Within,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Barnes-Hut opening angle θ: a node is accepted as a pseudo-body when
    /// `side / distance < θ`.
    pub theta: f64,
    pub dt_mode: DtMode,
    /// Number of parallel shards the body range is cut into for the force
    /// phase. `k > n` collapses trailing shards to empty.
    pub k: usize,
    /// Per-step drag factor σ, applied before acceleration.
    pub sigma: f64,
    /// Per-step displacement cap Δx_max.
    pub dx_max: f64,
    pub boundary: Boundary,
    /// Repulsion softening η.
    pub eta: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            theta: 0.5,
            dt_mode: DtMode::Auto,
            k: 100,
            sigma: 0.2,
            dx_max: 0.001,
            boundary: Boundary::Across,
            eta: 0.0,
        }
    }
}

impl SimConfig {
    /// Rejects configurations the core cannot run with: `theta <= 0`,
    /// `k == 0`, `sigma` outside `(0, 1]`, `dx_max <= 0`, or `eta < 0`.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.theta > 0.0) {
            return Err(SimError::InvalidConfig(format!("theta must be > 0, got {}", self.theta)));
        }
        if self.k == 0 {
            return Err(SimError::InvalidConfig("k must be > 0".into()));
        }
        if !(self.sigma > 0.0 && self.sigma <= 1.0) {
            return Err(SimError::InvalidConfig(format!("sigma must be in (0, 1], got {}", self.sigma)));
        }
        if !(self.dx_max > 0.0) {
            return Err(SimError::InvalidConfig(format!("dx_max must be > 0, got {}", self.dx_max)));
        }
        if self.eta < 0.0 {
            return Err(SimError::InvalidConfig(format!("eta must be >= 0, got {}", self.eta)));
        }
        if let DtMode::Manual(dt) = self.dt_mode {
            if !(dt > 0.0) {
                return Err(SimError::InvalidConfig(format!("manual dt must be > 0, got {dt}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_theta() {
        let cfg = SimConfig { theta: 0.0, ..SimConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_shards() {
        let cfg = SimConfig { k: 0, ..SimConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_sigma_outside_unit_interval() {
        assert!(SimConfig { sigma: 0.0, ..SimConfig::default() }.validate().is_err());
        assert!(SimConfig { sigma: 1.5, ..SimConfig::default() }.validate().is_err());
        assert!(SimConfig { sigma: 1.0, ..SimConfig::default() }.validate().is_ok());
    }

    #[test]
    fn rejects_negative_eta() {
        let cfg = SimConfig { eta: -1e-9, ..SimConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
