//! The per-step serial integrator: drag, accelerate, cap displacement,
//! advance position, then apply the boundary policy. Runs after the force
//! phase has filled in per-body accelerations.

use crate::body::BodyStore;
use crate::config::{Boundary, DtMode, SimConfig};
use crate::error::SimError;
use crate::torus;

/// Everything the integrator measured or decided during one step, needed
/// by the caller to assemble a status report.
#[derive(Clone, Copy, Debug)]
pub struct StepMetrics {
    /// Δt actually used this step.
    pub dt_used: f64,
    /// Largest post-drag, pre-cap speed observed, tracked serially.
    pub v_max: f64,
    /// Fraction of bodies whose displacement was rescaled to `dx_max`.
    pub capped_ratio: f64,
}

/// Chooses this step's Δt. In [`DtMode::Auto`], Δt is derived from the
/// force phase's `r_min`/`F_max`; if no pair ever interacted (`f_max == 0`)
/// or no bodies exist, falls back to `dx_max` itself, since the usual
/// acceleration-scaled estimate is undefined. Manual mode always uses the
/// caller-supplied value.
pub fn choose_dt(cfg: &SimConfig, r_min: f64, f_max: f64) -> f64 {
    match cfg.dt_mode {
        DtMode::Manual(dt) => dt,
        DtMode::Auto => {
            if f_max > 0.0 {
                (0.5 * r_min / f_max).sqrt()
            } else {
                cfg.dx_max
            }
        }
    }
}

/// Advances every body by one step: drag the existing velocity, add this
/// step's acceleration, cap the resulting displacement to `dx_max`,
/// advance the position, then apply the boundary policy. `ax`/`ay` are the
/// accelerations the force phase just computed, one per body.
pub fn integrate(
    bodies: &mut BodyStore,
    ax: &[f64],
    ay: &[f64],
    cfg: &SimConfig,
    dt: f64,
) -> Result<StepMetrics, SimError> {
    let n = bodies.len();
    let mut v_max = 0.0f64;
    let mut capped = 0usize;

    for i in 0..n {
        bodies.vx[i] *= cfg.sigma;
        bodies.vy[i] *= cfg.sigma;

        bodies.vx[i] += ax[i] * dt;
        bodies.vy[i] += ay[i] * dt;

        let speed = (bodies.vx[i] * bodies.vx[i] + bodies.vy[i] * bodies.vy[i]).sqrt();
        if speed > v_max {
            v_max = speed;
        }

        let step_len = speed * dt;
        if step_len > cfg.dx_max {
            let scale = cfg.dx_max / step_len;
            bodies.vx[i] *= scale;
            bodies.vy[i] *= scale;
            capped += 1;
        }

        let nx = bodies.x[i] + bodies.vx[i] * dt;
        let ny = bodies.y[i] + bodies.vy[i] * dt;
        let (fx, fy) = apply_boundary(nx, ny, cfg.boundary, &mut bodies.vx[i], &mut bodies.vy[i]);

        if !(0.0..1.0).contains(&fx) || !(0.0..1.0).contains(&fy) {
            return Err(SimError::InvalidPosition { body: i as u32, x: fx, y: fy });
        }
        bodies.x[i] = fx;
        bodies.y[i] = fy;
    }

    let capped_ratio = if n > 0 { capped as f64 / n as f64 } else { 0.0 };
    Ok(StepMetrics { dt_used: dt, v_max, capped_ratio })
}

/// Applies the boundary policy to a proposed `(x, y)`. `Across` wraps into
/// `[0, 1)`, consistent with the torus metric. `Within` reflects off the
/// unit square's edges and negates the corresponding velocity component.
fn apply_boundary(x: f64, y: f64, policy: Boundary, vx: &mut f64, vy: &mut f64) -> (f64, f64) {
    match policy {
        Boundary::Across => (torus::wrap(x), torus::wrap(y)),
        Boundary::Within => {
            let (rx, flip_x) = reflect(x);
            let (ry, flip_y) = reflect(y);
            if flip_x {
                *vx = -*vx;
            }
            if flip_y {
                *vy = -*vy;
            }
            (rx, ry)
        }
    }
}

/// Reflects `v` into `[0, 1)` off the boundaries at 0 and 1, returning the
/// reflected value and whether an odd number of reflections occurred (in
/// which case the matching velocity component must flip sign).
fn reflect(v: f64) -> (f64, bool) {
    if (0.0..1.0).contains(&v) {
        return (v, false);
    }
    let period = 2.0;
    let mut m = v.rem_euclid(period);
    let mut flipped = false;
    if m >= 1.0 {
        m = period - m;
        flipped = true;
    }
    // m is now in [0, 1]; clamp the boundary-touching case into the
    // half-open interval the rest of the system assumes.
    if m >= 1.0 {
        m = 1.0 - f64::EPSILON;
    }
    (m, flipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;

    fn store(bodies: &[Body]) -> BodyStore {
        BodyStore::new(bodies).unwrap()
    }

    #[test]
    fn choose_dt_falls_back_to_dx_max_when_no_force_was_felt() {
        let cfg = SimConfig::default();
        assert_eq!(choose_dt(&cfg, 2.0, 0.0), cfg.dx_max);
    }

    #[test]
    fn choose_dt_auto_matches_the_formula() {
        let cfg = SimConfig::default();
        let dt = choose_dt(&cfg, 0.4, 8.0);
        assert!((dt - (0.5 * 0.4 / 8.0f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn choose_dt_manual_ignores_force_state() {
        let cfg = SimConfig { dt_mode: DtMode::Manual(0.01), ..SimConfig::default() };
        assert_eq!(choose_dt(&cfg, 0.0, 1000.0), 0.01);
    }

    #[test]
    fn displacement_beyond_dx_max_is_rescaled_to_exactly_dx_max() {
        let mut bodies = store(&[Body::new(0.5, 0.5, 1.0)]);
        let ax = [1000.0];
        let ay = [0.0];
        let cfg = SimConfig { dx_max: 0.001, sigma: 1.0, ..SimConfig::default() };
        let metrics = integrate(&mut bodies, &ax, &ay, &cfg, 1.0).unwrap();
        assert_eq!(metrics.capped_ratio, 1.0);
        let actual_step = ((bodies.x[0] - 0.5).powi(2) + (bodies.y[0] - 0.5).powi(2)).sqrt();
        assert!((actual_step - cfg.dx_max).abs() < 1e-12);
    }

    #[test]
    fn uncapped_body_moves_by_exactly_v_dt() {
        let mut bodies = store(&[Body::new(0.5, 0.5, 1.0)]);
        let ax = [0.0];
        let ay = [0.0];
        bodies.vx[0] = 0.0001;
        let cfg = SimConfig { sigma: 1.0, dx_max: 10.0, ..SimConfig::default() };
        integrate(&mut bodies, &ax, &ay, &cfg, 1.0).unwrap();
        assert!((bodies.x[0] - 0.5001).abs() < 1e-12);
        assert_eq!(bodies.y[0], 0.5);
    }

    #[test]
    fn across_boundary_wraps_past_the_edge() {
        let mut bodies = store(&[Body::new(0.9999, 0.5, 1.0)]);
        bodies.vx[0] = 0.01;
        let ax = [0.0];
        let ay = [0.0];
        let cfg = SimConfig { sigma: 1.0, dx_max: 10.0, boundary: Boundary::Across, ..SimConfig::default() };
        integrate(&mut bodies, &ax, &ay, &cfg, 1.0).unwrap();
        assert!(bodies.x[0] < 0.9999, "wrapped around to a small x");
        assert!(bodies.vx[0] > 0.0, "velocity direction unchanged by a wrap");
    }

    #[test]
    fn within_boundary_reflects_and_flips_velocity() {
        let mut bodies = store(&[Body::new(0.9999, 0.5, 1.0)]);
        bodies.vx[0] = 0.01;
        let ax = [0.0];
        let ay = [0.0];
        let cfg = SimConfig { sigma: 1.0, dx_max: 10.0, boundary: Boundary::Within, ..SimConfig::default() };
        integrate(&mut bodies, &ax, &ay, &cfg, 1.0).unwrap();
        assert!(bodies.x[0] < 0.9999, "reflected back away from the edge");
        assert!(bodies.vx[0] < 0.0, "velocity flipped on reflection");
    }

    #[test]
    fn drag_is_applied_before_acceleration() {
        let mut bodies = store(&[Body::new(0.5, 0.5, 1.0)]);
        bodies.vx[0] = 1.0;
        let ax = [1.0];
        let ay = [0.0];
        let cfg = SimConfig { sigma: 0.5, dx_max: 10.0, ..SimConfig::default() };
        integrate(&mut bodies, &ax, &ay, &cfg, 1.0).unwrap();
        // drag: 1.0 * 0.5 = 0.5, then + 1.0 * 1.0 dt => 1.5
        assert!((bodies.vx[0] - 1.5).abs() < 1e-12);
    }
}
