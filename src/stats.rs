//! Density statistics: per-level decile breakdown of body counts across a
//! level's cells, used to judge how close a run is to a uniform spread.

use crate::coord::{level_offset, MAX_LEVEL};
use crate::tree::Quadtree;

/// Ten decile boundaries (ascending) of body count across every cell of a
/// single tree level.
pub type Deciles = [u64; 10];

/// The full decile table across every level `0..=MAX_LEVEL`: a fixed-shape
/// 9x10 table. Level 0 (the root) has exactly one cell, so its row is
/// degenerate (all ten deciles equal the total body count), but it is still
/// reported for a uniform, index-by-level table shape.
pub type DensityTable = [Deciles; MAX_LEVEL as usize + 1];

/// Computes the decile table for the current tree state. Level `l`'s row
/// reports the counts, sorted ascending and cut into ten equal-sized
/// groups, one boundary value per decile (the group's largest count).
pub fn density_table(tree: &Quadtree) -> DensityTable {
    let mut table = [[0u64; 10]; MAX_LEVEL as usize + 1];
    for level in 0..=MAX_LEVEL {
        table[level as usize] = level_deciles(tree, level);
    }
    table
}

fn level_deciles(tree: &Quadtree, level: u8) -> Deciles {
    let start = level_offset(level);
    let span = 1usize << (2 * level as u32);
    let mut counts: Vec<u64> = (0..span)
        .map(|local| tree.node_at_index(start + local).count as u64)
        .collect();
    counts.sort_unstable();

    let mut deciles = [0u64; 10];
    let n = counts.len();
    for (d, slot) in deciles.iter_mut().enumerate() {
        let end = ((d + 1) * n) / 10;
        let idx = end.saturating_sub(1).min(n - 1);
        *slot = counts[idx];
    }
    deciles
}

/// Ratio of the top decile's boundary to the bottom decile's, the single
/// number used to judge convergence toward a uniform spread at `level`
/// (1.0 is perfectly even; values much greater than 1 mean clumping). A
/// bottom decile of zero is reported as `f64::INFINITY` unless the top is
/// also zero, in which case the level has no bodies at all and the ratio
/// is reported as `1.0`.
pub fn decile_ratio(deciles: &Deciles) -> f64 {
    let bottom = deciles[0] as f64;
    let top = deciles[9] as f64;
    if bottom == 0.0 {
        if top == 0.0 {
            1.0
        } else {
            f64::INFINITY
        }
    } else {
        top / bottom
    }
}
