//! Error types for pliant-physics.

use thiserror::Error;

/// Errors raised while building a body from input topology.
///
/// Degenerate geometry (zero-length edges, zero-area triangles, zero-volume
/// tetrahedra) is not an error: such elements simply contribute no
/// correction during solving. Only structural problems in the input reject
/// the topology outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// An element references a particle index past the end of the
    /// position buffer.
    #[error("particle index {index} out of range for {count} particles")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of particles in the position buffer.
        count: usize,
    },

    /// The position buffer is empty.
    #[error("topology has no particles")]
    Empty,
}
