//! Failure modes, modeled per the error handling design: fatal integrity
//! violations abort the step they occur in; recoverable conditions (a
//! zero-mass node reached as a force source) are not represented as errors
//! at all; they are simply a branch the kernel skips.

use crate::coord::NodeCoord;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A body's next/prev pointer would link it to itself within a leaf
    /// chain. Always a maintenance bug, never user-triggerable.
    #[error("body {body} would link to itself in leaf {leaf:?}")]
    SelfLink { body: u32, leaf: NodeCoord },

    /// The number of bodies reachable by walking every leaf chain does not
    /// match the body store's length.
    #[error("leaf chains hold {counted} bodies, expected {expected}")]
    BodyCountMismatch { counted: usize, expected: usize },

    /// Two distinct bodies occupy the exact same position within a leaf,
    /// which would divide by zero in the repulsion kernel.
    #[error("bodies {a} and {b} have zero separation in leaf {leaf:?}")]
    ZeroDistance { a: u32, b: u32, leaf: NodeCoord },

    /// A body's position left `[0, 1)` after the boundary policy was
    /// applied; the policy is supposed to make this unreachable.
    #[error("body {body} has invalid position ({x}, {y}) after boundary handling")]
    InvalidPosition { body: u32, x: f64, y: f64 },

    /// A packed node coordinate fails its byte-layout invariant.
    #[error("invalid packed node coordinate at level {level}")]
    InvalidCoord { level: u8 },

    /// A configuration value is out of the range the core accepts. Rejected
    /// at the configuration boundary; prior values are retained.
    #[error("configuration value out of range: {0}")]
    InvalidConfig(String),

    /// The body store was constructed with a body outside `[0, 1)^2` or
    /// with non-positive mass.
    #[error("body {index} is invalid: {reason}")]
    InvalidBody { index: usize, reason: String },
}
