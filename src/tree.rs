//! The static, depth-limited quadtree: a direct-indexed node table with
//! intrusive per-leaf body chains, and the two maintenance passes that keep
//! it in sync with moving bodies (re-bucket, then bottom-up aggregate
//! recomputation).
//!
//! The table never grows or shrinks during a run; only chain membership
//! and node aggregates change, which is what makes incremental, O(1)
//! per-moved-body maintenance possible.

use rayon::prelude::*;

use crate::body::{BodyStore, SENTINEL};
use crate::coord::{level_offset, NodeCoord, MAX_LEVEL, TABLE_LEN};
use crate::error::SimError;
use crate::torus;

/// One node of the static quadtree.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub coord: NodeCoord,
    /// Center of mass x. Meaningless (must not be read) when `mass == 0`.
    pub com_x: f64,
    /// Center of mass y. Meaningless (must not be read) when `mass == 0`.
    pub com_y: f64,
    pub mass: f64,
    /// First body in this leaf's chain, or `SENTINEL`. Only meaningful for
    /// leaves (`coord.is_leaf()`); non-leaf nodes carry no body chain.
    pub first_body: u32,
    /// Number of bodies in this node's subtree, maintained bottom-up.
    pub count: u32,
}

impl Node {
    fn empty(coord: NodeCoord) -> Self {
        Self {
            coord,
            com_x: 0.0,
            com_y: 0.0,
            mass: 0.0,
            first_body: SENTINEL,
            count: 0,
        }
    }
}

/// The fixed-size, direct-indexed quadtree table.
pub struct Quadtree {
    nodes: Vec<Node>,
}

impl Quadtree {
    /// Builds the (empty) static table: every node coordinate for levels
    /// `0..=MAX_LEVEL` gets a slot, with no bodies assigned yet.
    pub fn new() -> Self {
        let mut nodes = vec![Node::empty(NodeCoord::ROOT); TABLE_LEN];
        for level in 0..=MAX_LEVEL {
            let span = 1u32 << level;
            for i in 0..span {
                for j in 0..span {
                    let coord = NodeCoord::new(level, i, j);
                    nodes[coord.table_index()] = Node::empty(coord);
                }
            }
        }
        Self { nodes }
    }

    #[inline]
    pub fn node(&self, coord: NodeCoord) -> &Node {
        &self.nodes[coord.table_index()]
    }

    /// Looks up a node by its raw dense table index rather than its
    /// coordinate. Used by level-wide scans (density statistics) that
    /// already know a level's index range.
    #[inline]
    pub fn node_at_index(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Assigns every body in `bodies` to its current leaf chain, starting
    /// from an all-detached state. Used once at construction; the same
    /// detach/insert primitive re-bucketing uses per step.
    pub fn bootstrap(&mut self, bodies: &mut BodyStore) {
        for leaf in &mut self.nodes[level_offset(MAX_LEVEL)..] {
            leaf.first_body = SENTINEL;
        }
        for id in 0..bodies.len() as u32 {
            let coord = NodeCoord::of_position(bodies.x[id as usize], bodies.y[id as usize]);
            bodies.coord[id as usize] = coord;
            self.push_front(coord, id, bodies);
        }
    }

    /// Links `id` as the new first body of `coord`'s chain.
    fn push_front(&mut self, coord: NodeCoord, id: u32, bodies: &mut BodyStore) {
        let leaf = &mut self.nodes[coord.table_index()];
        let old_first = leaf.first_body;
        bodies.prev[id as usize] = SENTINEL;
        bodies.next[id as usize] = old_first;
        if old_first != SENTINEL {
            bodies.prev[old_first as usize] = id;
        }
        leaf.first_body = id;
    }

    /// Detaches `id` from its current leaf chain (identified by
    /// `bodies.coord[id]`), fixing up neighbors.
    fn detach(&mut self, id: u32, bodies: &mut BodyStore) {
        let coord = bodies.coord[id as usize];
        let prev = bodies.prev[id as usize];
        let next = bodies.next[id as usize];

        if prev != SENTINEL {
            bodies.next[prev as usize] = next;
        } else {
            self.nodes[coord.table_index()].first_body = next;
        }
        if next != SENTINEL {
            bodies.prev[next as usize] = prev;
        }
    }

    /// Re-buckets every body whose level-8 cell changed since the last
    /// step. Bodies whose coordinate is unchanged are O(1) no-ops. Bodies
    /// are processed in id order, so the resulting chain order per leaf is
    /// deterministic given positions.
    pub fn rebucket(&mut self, bodies: &mut BodyStore) -> Result<(), SimError> {
        for id in 0..bodies.len() as u32 {
            let old_coord = bodies.coord[id as usize];
            let new_coord = NodeCoord::of_position(
                bodies.x[id as usize],
                bodies.y[id as usize],
            );
            if new_coord == old_coord {
                continue;
            }

            if bodies.next[id as usize] == id || bodies.prev[id as usize] == id {
                return Err(SimError::SelfLink { body: id, leaf: old_coord });
            }

            self.detach(id, bodies);
            bodies.coord[id as usize] = new_coord;
            self.push_front(new_coord, id, bodies);
        }
        self.check_chain_integrity(bodies)
    }

    /// Walks every leaf chain once to verify the structural invariants:
    /// no self-links, every body appears in exactly one chain, and the
    /// total chain length equals the body count.
    fn check_chain_integrity(&self, bodies: &BodyStore) -> Result<(), SimError> {
        let mut counted = 0usize;
        for leaf in &self.nodes[level_offset(MAX_LEVEL)..] {
            let mut b = leaf.first_body;
            let mut prev = SENTINEL;
            while b != SENTINEL {
                if bodies.next[b as usize] == b || bodies.prev[b as usize] == b {
                    return Err(SimError::SelfLink { body: b, leaf: leaf.coord });
                }
                if bodies.prev[b as usize] != prev {
                    return Err(SimError::SelfLink { body: b, leaf: leaf.coord });
                }
                counted += 1;
                prev = b;
                b = bodies.next[b as usize];
            }
        }
        if counted != bodies.len() {
            return Err(SimError::BodyCountMismatch { counted, expected: bodies.len() });
        }
        Ok(())
    }

    /// Bottom-up aggregate recomputation: leaves first (from their body
    /// chains), then levels `MAX_LEVEL - 1` down to `0` (from their four
    /// children). Leaves combine under torus arithmetic centered on the
    /// leaf's own geometric center to avoid wrap artifacts; inner nodes do
    /// the same centered on their own box center.
    pub fn recompute_aggregates(&mut self, bodies: &BodyStore) {
        let leaf_start = level_offset(MAX_LEVEL);
        self.nodes[leaf_start..]
            .par_iter_mut()
            .for_each(|leaf| aggregate_leaf(leaf, bodies));

        for level in (0..MAX_LEVEL).rev() {
            let start = level_offset(level);
            let child_start = level_offset(level + 1);
            let (head, tail) = self.nodes.split_at_mut(child_start);
            let parents = &mut head[start..child_start];
            parents.par_iter_mut().for_each(|node| {
                aggregate_inner(node, tail, child_start);
            });
        }
    }
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate_leaf(leaf: &mut Node, bodies: &BodyStore) {
    let (cx, cy) = leaf.coord.center();
    let mut mass = 0.0;
    let mut wdx = 0.0;
    let mut wdy = 0.0;
    let mut count = 0u32;

    let mut b = leaf.first_body;
    while b != SENTINEL {
        let i = b as usize;
        let m = bodies.mass[i];
        mass += m;
        wdx += m * torus::delta(cx, bodies.x[i]);
        wdy += m * torus::delta(cy, bodies.y[i]);
        count += 1;
        b = bodies.next[i];
    }

    leaf.mass = mass;
    leaf.count = count;
    if mass > 0.0 {
        leaf.com_x = torus::wrap(cx + wdx / mass);
        leaf.com_y = torus::wrap(cy + wdy / mass);
    }
}

/// `tail` is the node slice starting at `child_start` (i.e. `tail[0]` is
/// the table node at index `child_start`), so a child's local index is its
/// `table_index() - child_start`.
fn aggregate_inner(node: &mut Node, tail: &[Node], child_start: usize) {
    let (cx, cy) = node.coord.center();
    let mut mass = 0.0;
    let mut wdx = 0.0;
    let mut wdy = 0.0;
    let mut count = 0u32;

    for child_coord in node.coord.children() {
        let child = &tail[child_coord.table_index() - child_start];
        count += child.count;
        if child.mass > 0.0 {
            mass += child.mass;
            wdx += child.mass * torus::delta(cx, child.com_x);
            wdy += child.mass * torus::delta(cy, child.com_y);
        }
    }

    node.mass = mass;
    node.count = count;
    if mass > 0.0 {
        node.com_x = torus::wrap(cx + wdx / mass);
        node.com_y = torus::wrap(cy + wdy / mass);
    }
}
