//! The parallel dispatcher: slices the body-id range into `K` contiguous
//! shards and runs the force kernel on each shard concurrently. Disjoint
//! writes are enforced by the type system: the acceleration columns are
//! split into `K` non-overlapping `&mut [f64]` slices before any shard
//! runs, so no synchronization is needed for the writes themselves, and no
//! `unsafe` aliasing is involved.

use std::sync::atomic::AtomicU64;

use rayon::prelude::*;

use crate::body::BodyStore;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::kernel::{self, NO_PAIR_SENTINEL};
use crate::tree::Quadtree;

/// Per-step summary produced by reducing every shard's local result.
#[derive(Clone, Copy, Debug)]
pub struct ForceSummary {
    /// Smallest torus distance seen between any test body and any source
    /// it visited this step. `NO_PAIR_SENTINEL` if no pair was ever seen
    /// (e.g. a single body with nothing to interact with).
    pub min_inter_body_distance: f64,
    /// Largest acceleration magnitude observed across all bodies, `F_max`.
    pub max_accel: f64,
}

/// Boundary indices `[0, b1, b2, ..., n]` cutting `[0, n)` into `k`
/// contiguous shards. Trailing shards collapse to empty when `k > n`.
fn shard_boundaries(n: usize, k: usize) -> Vec<usize> {
    let shard_size = (n + k - 1) / k.max(1);
    let mut bounds = Vec::with_capacity(k + 1);
    bounds.push(0);
    for s in 1..=k {
        bounds.push((s * shard_size).min(n));
    }
    bounds
}

/// Splits `slice` into disjoint `&mut` sub-slices at the given boundaries
/// (`boundaries[0] == 0`, `boundaries[last] == slice.len()`).
fn split_into_shards<T>(mut slice: &mut [T], boundaries: &[usize]) -> Vec<&mut [T]> {
    let mut out = Vec::with_capacity(boundaries.len().saturating_sub(1));
    let mut prev = 0;
    for &b in &boundaries[1..] {
        let (head, tail) = slice.split_at_mut(b - prev);
        out.push(head);
        slice = tail;
        prev = b;
    }
    out
}

/// Runs the force kernel for every body, in `K` parallel shards, and
/// reduces the per-shard minima into a single [`ForceSummary`]. Writes
/// each body's acceleration into `ax`/`ay`, which must have length
/// `bodies.len()` and are wholly disjoint from `bodies` itself, and that
/// disjointness, not convention, is what lets every shard write its slice
/// concurrently with every other shard reading the (unrelated) positions
/// of bodies outside it.
pub fn compute_forces(
    tree: &Quadtree,
    bodies: &BodyStore,
    cfg: &SimConfig,
    ax: &mut [f64],
    ay: &mut [f64],
    computations: &AtomicU64,
) -> Result<ForceSummary, SimError> {
    let n = bodies.len();
    if n == 0 {
        return Ok(ForceSummary { min_inter_body_distance: NO_PAIR_SENTINEL, max_accel: 0.0 });
    }
    debug_assert_eq!(ax.len(), n);
    debug_assert_eq!(ay.len(), n);

    let boundaries = shard_boundaries(n, cfg.k);
    let ax_shards = split_into_shards(ax, &boundaries);
    let ay_shards = split_into_shards(ay, &boundaries);

    let ranges: Vec<(usize, usize)> = boundaries.windows(2).map(|w| (w[0], w[1])).collect();

    let shard_results: Vec<Result<(f64, f64), SimError>> = ranges
        .into_iter()
        .zip(ax_shards.into_iter().zip(ay_shards.into_iter()))
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|((start, end), (ax_shard, ay_shard))| {
            run_shard(tree, bodies, cfg, start, end, ax_shard, ay_shard, computations)
        })
        .collect();

    let mut min_dist = NO_PAIR_SENTINEL;
    let mut max_accel = 0.0f64;
    for r in shard_results {
        let (shard_min, shard_max) = r?;
        if shard_min < min_dist {
            min_dist = shard_min;
        }
        if shard_max > max_accel {
            max_accel = shard_max;
        }
    }

    Ok(ForceSummary { min_inter_body_distance: min_dist, max_accel })
}

#[allow(clippy::too_many_arguments)]
fn run_shard(
    tree: &Quadtree,
    bodies: &BodyStore,
    cfg: &SimConfig,
    start: usize,
    end: usize,
    ax_shard: &mut [f64],
    ay_shard: &mut [f64],
    computations: &AtomicU64,
) -> Result<(f64, f64), SimError> {
    let mut min_dist = NO_PAIR_SENTINEL;
    let mut max_accel = 0.0f64;

    for id in start..end {
        let f = kernel::body_force(id as u32, bodies, tree, cfg, computations)?;
        let local = id - start;
        ax_shard[local] = f.ax;
        ay_shard[local] = f.ay;
        if f.min_dist < min_dist {
            min_dist = f.min_dist;
        }
        let mag = (f.ax * f.ax + f.ay * f.ay).sqrt();
        if mag > max_accel {
            max_accel = mag;
        }
    }

    Ok((min_dist, max_accel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;

    fn setup(bodies_in: &[Body]) -> (Quadtree, BodyStore) {
        let mut bodies = BodyStore::new(bodies_in).unwrap();
        let mut tree = Quadtree::new();
        tree.bootstrap(&mut bodies);
        tree.recompute_aggregates(&bodies);
        (tree, bodies)
    }

    #[test]
    fn shard_boundaries_cover_the_range_exactly() {
        let b = shard_boundaries(7, 3);
        assert_eq!(b, vec![0, 3, 6, 7]);
        let b = shard_boundaries(7, 100);
        assert_eq!(b[0], 0);
        assert_eq!(*b.last().unwrap(), 7);
        assert_eq!(b.len(), 101);
    }

    #[test]
    fn single_body_has_sentinel_min_distance() {
        let (tree, bodies) = setup(&[Body::new(0.5, 0.5, 1.0)]);
        let cfg = SimConfig::default();
        let counter = AtomicU64::new(0);
        let mut ax = vec![0.0; bodies.len()];
        let mut ay = vec![0.0; bodies.len()];
        let summary = compute_forces(&tree, &bodies, &cfg, &mut ax, &mut ay, &counter).unwrap();
        assert_eq!(summary.min_inter_body_distance, NO_PAIR_SENTINEL);
        assert_eq!(summary.max_accel, 0.0);
    }

    #[test]
    fn many_shards_agree_with_a_single_shard() {
        let input: Vec<Body> = (0..40)
            .map(|i| Body::new((i as f64) / 41.0, ((i * 13) % 41) as f64 / 41.0, 1.0))
            .collect();

        let (tree, bodies_k1) = setup(&input);
        let cfg1 = SimConfig { k: 1, ..SimConfig::default() };
        let counter = AtomicU64::new(0);
        let mut ax1 = vec![0.0; input.len()];
        let mut ay1 = vec![0.0; input.len()];
        let s1 = compute_forces(&tree, &bodies_k1, &cfg1, &mut ax1, &mut ay1, &counter).unwrap();

        let (tree2, bodies_k8) = setup(&input);
        let cfg8 = SimConfig { k: 8, ..SimConfig::default() };
        let mut ax8 = vec![0.0; input.len()];
        let mut ay8 = vec![0.0; input.len()];
        let s8 = compute_forces(&tree2, &bodies_k8, &cfg8, &mut ax8, &mut ay8, &counter).unwrap();

        for i in 0..input.len() {
            assert!((ax1[i] - ax8[i]).abs() < 1e-9);
            assert!((ay1[i] - ay8[i]).abs() < 1e-9);
        }
        assert!((s1.min_inter_body_distance - s8.min_inter_body_distance).abs() < 1e-9);
        assert!((s1.max_accel - s8.max_accel).abs() < 1e-9);
    }
}
