//! The Barnes–Hut force kernel: per-body recursive top-down traversal of
//! the static quadtree, computing repulsive acceleration under the torus
//! metric with the standard `s/d < θ` opening-angle acceptance test.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::body::{BodyStore, SENTINEL};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::torus;
use crate::tree::Quadtree;

/// Sentinel meaning "no pair of bodies/sources was seen yet" for a min
/// inter-body distance, meaning a body with no interacting source this step.
pub const NO_PAIR_SENTINEL: f64 = 2.0;

/// Acceleration and the smallest torus distance to any source visited,
/// for a single body.
pub struct BodyForce {
    pub ax: f64,
    pub ay: f64,
    pub min_dist: f64,
}

/// Computes the repulsive acceleration on body `id` by traversing `tree`
/// top-down from the root, applying the Barnes–Hut acceptance test at
/// every internal node. `computations` is a shared atomic throughput
/// counter, incremented once per force contribution (pseudo-body or
/// pairwise), read only for telemetry.
pub fn body_force(
    id: u32,
    bodies: &BodyStore,
    tree: &Quadtree,
    cfg: &SimConfig,
    computations: &AtomicU64,
) -> Result<BodyForce, SimError> {
    let i = id as usize;
    let (px, py) = (bodies.x[i], bodies.y[i]);
    let pm = bodies.mass[i];

    let mut acc = BodyForce { ax: 0.0, ay: 0.0, min_dist: NO_PAIR_SENTINEL };
    traverse(tree.root().coord, id, px, py, pm, bodies, tree, cfg, computations, &mut acc)?;
    Ok(acc)
}

#[allow(clippy::too_many_arguments)]
fn traverse(
    coord: crate::coord::NodeCoord,
    id: u32,
    px: f64,
    py: f64,
    pm: f64,
    bodies: &BodyStore,
    tree: &Quadtree,
    cfg: &SimConfig,
    computations: &AtomicU64,
    acc: &mut BodyForce,
) -> Result<(), SimError> {
    let node = tree.node(coord);
    if node.mass == 0.0 {
        return Ok(());
    }

    let side = coord.side();
    let d = torus::distance(px, py, node.com_x, node.com_y);

    // d == 0 can only mean the node's COM exactly coincides with the test
    // point; accepting it would divide by zero, so force a descent instead
    // (unless we are already at a leaf, where the pairwise path below
    // performs the real distinctness check against actual bodies).
    let accept = d > 0.0 && (side / d) < cfg.theta;

    if accept {
        add_contribution(acc, px, py, pm, node.com_x, node.com_y, node.mass, cfg.eta, d);
        computations.fetch_add(1, Ordering::Relaxed);
        return Ok(());
    }

    if !coord.is_leaf() {
        for child in coord.children() {
            traverse(child, id, px, py, pm, bodies, tree, cfg, computations, acc)?;
        }
        return Ok(());
    }

    // Leaf: walk the body chain, excluding the test body itself.
    let mut b = node.first_body;
    while b != SENTINEL {
        if b != id {
            let j = b as usize;
            let (bx, by, bm) = (bodies.x[j], bodies.y[j], bodies.mass[j]);
            let dist = torus::distance(px, py, bx, by);
            if dist == 0.0 {
                return Err(SimError::ZeroDistance { a: id, b, leaf: coord });
            }
            add_contribution(acc, px, py, pm, bx, by, bm, cfg.eta, dist);
            computations.fetch_add(1, Ordering::Relaxed);
        }
        b = bodies.next[b as usize];
    }
    Ok(())
}

/// Adds the repulsion contribution from a source at `(sx, sy)` with mass
/// `sm` onto the accumulator for a test point at `(px, py)` with mass `pm`,
/// given the torus distance `d` already computed between them.
#[allow(clippy::too_many_arguments)]
#[inline]
fn add_contribution(acc: &mut BodyForce, px: f64, py: f64, pm: f64, sx: f64, sy: f64, sm: f64, eta: f64, d: f64) {
    let dx = torus::delta(sx, px);
    let dy = torus::delta(sy, py);
    let r2 = dx * dx + dy * dy + eta;
    let r3 = r2 * r2.sqrt();
    let mp = pm * sm;
    acc.ax += dx * mp / r3;
    acc.ay += dy * mp / r3;
    if d < acc.min_dist {
        acc.min_dist = d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::config::SimConfig;
    use crate::tree::Quadtree;

    fn setup(bodies_in: &[Body]) -> (Quadtree, BodyStore) {
        let mut bodies = BodyStore::new(bodies_in).unwrap();
        let mut tree = Quadtree::new();
        tree.bootstrap(&mut bodies);
        tree.recompute_aggregates(&bodies);
        (tree, bodies)
    }

    #[test]
    fn single_body_feels_no_force() {
        let (tree, bodies) = setup(&[Body::new(0.5, 0.5, 1.0)]);
        let cfg = SimConfig::default();
        let counter = AtomicU64::new(0);
        let f = body_force(0, &bodies, &tree, &cfg, &counter).unwrap();
        assert_eq!(f.ax, 0.0);
        assert_eq!(f.ay, 0.0);
        assert_eq!(f.min_dist, NO_PAIR_SENTINEL);
    }

    #[test]
    fn two_bodies_repel_along_their_axis_symmetrically() {
        let (tree, bodies) = setup(&[Body::new(0.25, 0.5, 0.1), Body::new(0.75, 0.5, 0.1)]);
        let cfg = SimConfig { theta: 0.5, k: 1, ..SimConfig::default() };
        let counter = AtomicU64::new(0);
        let f0 = body_force(0, &bodies, &tree, &cfg, &counter).unwrap();
        let f1 = body_force(1, &bodies, &tree, &cfg, &counter).unwrap();

        // Torus distance is 0.5 either way; forces equal magnitude, opposite sign.
        assert!((f0.ax + f1.ax).abs() < 1e-12);
        assert!(f0.ay.abs() < 1e-12 && f1.ay.abs() < 1e-12);
        assert!(f0.ax < 0.0, "body 0 pushed away from body 1, toward -x");
        assert!(f1.ax > 0.0);
        assert!((f0.min_dist - 0.5).abs() < 1e-9);
    }

    #[test]
    fn wrap_around_neighbor_pushes_in_the_wrapping_direction() {
        let (tree, bodies) = setup(&[
            Body::new(0.1, 0.5, 1.0),
            Body::new(0.9, 0.5, 1.0),
            Body::new(0.5, 0.9, 1.0),
        ]);
        let cfg = SimConfig { theta: 0.0, k: 1, ..SimConfig::default() };
        let counter = AtomicU64::new(0);
        let f0 = body_force(0, &bodies, &tree, &cfg, &counter).unwrap();
        // Body 1 (x=0.9) is 0.2 away from body 0 via wrap, closer than the
        // direct 0.8; it should dominate and push body 0 toward +x (the
        // wrap direction from 0.9 to 0.1).
        assert!(f0.ax > 0.0);
    }

    #[test]
    fn zero_distance_between_distinct_bodies_is_an_integrity_error() {
        let (tree, bodies) = setup(&[Body::new(0.4, 0.4, 1.0), Body::new(0.400001, 0.4, 1.0)]);
        // Force both bodies into the exact same leaf position to trigger it.
        let mut bodies = bodies;
        bodies.x[1] = bodies.x[0];
        let mut tree = tree;
        tree.recompute_aggregates(&bodies);
        let cfg = SimConfig::default();
        let counter = AtomicU64::new(0);
        let err = body_force(0, &bodies, &tree, &cfg, &counter).unwrap_err();
        assert!(matches!(err, SimError::ZeroDistance { .. }));
    }
}
