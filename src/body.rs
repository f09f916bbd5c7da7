//! The body store: contiguous, column-oriented storage for positions,
//! masses, velocities, and the intrusive leaf-chain linkage.
//!
//! Bodies are owned by a single `BodyStore`, indexed by a stable `u32` id
//! that never changes for the lifetime of a run. This is the arena-plus-
//! index resolution of the pointer-graph design note: `prev`/`next` are
//! body ids rather than pointers, `SENTINEL` stands in for `nil`.

use serde::{Deserialize, Serialize};

use crate::coord::NodeCoord;
use crate::error::SimError;

/// Sentinel id meaning "no body" (used for `prev`/`next` chain ends and for
/// a leaf's `first_body` when the leaf is empty).
pub const SENTINEL: u32 = u32::MAX;

/// A single point mass, position in `[0, 1)^2`. This is the serializable,
/// at-rest representation an external loader hands in and an external
/// consumer can snapshot back out; it carries none of the intrusive
/// linkage, which is bookkeeping internal to [`BodyStore`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
}

impl Body {
    pub fn new(x: f64, y: f64, mass: f64) -> Self {
        Self { x, y, mass }
    }
}

/// Column-oriented storage for every body in a run, plus the per-body
/// leaf-chain linkage and cached leaf coordinate.
///
/// Accelerations are deliberately not a column here: the force phase writes
/// them into caller-owned buffers disjoint from this store's own borrow, so
/// a shared `&BodyStore` can be read (for position/mass/chain traversal)
/// concurrently with mutable writes to those buffers. See `dispatch`.
#[derive(Debug)]
pub struct BodyStore {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mass: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    /// Level-8 leaf coordinate this body currently belongs to.
    pub coord: Vec<NodeCoord>,
    /// Previous body in this body's leaf chain, or `SENTINEL`.
    pub prev: Vec<u32>,
    /// Next body in this body's leaf chain, or `SENTINEL`.
    pub next: Vec<u32>,
}

impl BodyStore {
    /// Builds a store from an initial body set. Validates that every
    /// position is in `[0, 1)^2` and every mass is positive; this is the
    /// one place bad input from an upstream loader is caught, matching the
    /// "configuration out of range" policy's spirit of rejecting at the
    /// boundary rather than failing deep inside a step.
    pub fn new(initial: &[Body]) -> Result<Self, SimError> {
        let n = initial.len();
        let mut store = BodyStore {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            mass: Vec::with_capacity(n),
            vx: vec![0.0; n],
            vy: vec![0.0; n],
            coord: Vec::with_capacity(n),
            prev: vec![SENTINEL; n],
            next: vec![SENTINEL; n],
        };

        for (i, b) in initial.iter().enumerate() {
            if !(0.0..1.0).contains(&b.x) || !(0.0..1.0).contains(&b.y) {
                return Err(SimError::InvalidBody {
                    index: i,
                    reason: format!("position ({}, {}) outside [0, 1)^2", b.x, b.y),
                });
            }
            if !(b.mass > 0.0) {
                return Err(SimError::InvalidBody {
                    index: i,
                    reason: format!("mass {} is not positive", b.mass),
                });
            }
            store.x.push(b.x);
            store.y.push(b.y);
            store.mass.push(b.mass);
            store.coord.push(NodeCoord::of_position(b.x, b.y));
        }

        Ok(store)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Snapshot of current positions, in id order, for an external observer.
    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.x.iter().copied().zip(self.y.iter().copied()).collect()
    }

    /// The body array as the at-rest `Body` representation, for external
    /// persistence; the core itself never writes this to disk.
    pub fn to_bodies(&self) -> Vec<Body> {
        (0..self.len())
            .map(|i| Body::new(self.x[i], self.y[i], self.mass[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_position() {
        let err = BodyStore::new(&[Body::new(1.0, 0.5, 1.0)]).unwrap_err();
        assert!(matches!(err, SimError::InvalidBody { index: 0, .. }));
    }

    #[test]
    fn rejects_non_positive_mass() {
        let err = BodyStore::new(&[Body::new(0.5, 0.5, 0.0)]).unwrap_err();
        assert!(matches!(err, SimError::InvalidBody { index: 0, .. }));
    }

    #[test]
    fn accepts_well_formed_bodies_and_caches_leaf_coord() {
        let store = BodyStore::new(&[Body::new(0.25, 0.75, 2.0)]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.coord[0], NodeCoord::of_position(0.25, 0.75));
        assert_eq!(store.prev[0], SENTINEL);
        assert_eq!(store.next[0], SENTINEL);
    }
}
