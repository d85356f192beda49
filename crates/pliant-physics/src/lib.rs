//! Real-time deformable-body simulation with XPBD constraint solving.
//!
//! Bodies are particle systems held together by compliant constraints and
//! advanced by a substepped position-based solver:
//!
//! - [`Body`] - particles plus constraints, built from a triangulated
//!   surface ([`Body::from_surface`]), a tetrahedral mesh
//!   ([`Body::from_tetrahedra`]) or the [`Body::cloth_grid`] helper
//! - [`XpbdSolver`] - the per-frame loop: predictive integration,
//!   Gauss-Seidel constraint projection, collision response and the
//!   position-derived velocity update
//! - [`CollisionResolver`] - ground plane, world bounds and
//!   particle-particle contacts, with the broad phase provided by
//!   [`pliant_spatial`]
//! - [`Grab`] - interactive pin-and-drag of a single particle
//!
//! Stiffness is expressed as compliance (inverse stiffness): zero is rigid,
//! larger values are softer, and the effective stiffness scales with the
//! substep rate.
//!
//! # Example
//!
//! ```
//! use pliant_physics::{Body, Compliances, SolverConfig, XpbdSolver};
//!
//! let mut cloth = Body::cloth_grid(10, 10, 0.05, 0.5, Compliances::default())?;
//! let config = SolverConfig::default();
//! let mut solver = XpbdSolver::new(config, cloth.particle_count(), config.thickness);
//!
//! for _ in 0..60 {
//!     solver.step(&mut cloth, 1.0 / 60.0);
//! }
//! assert!(cloth.positions().iter().all(|p| p.y < 0.5));
//! # Ok::<(), pliant_physics::TopologyError>(())
//! ```

pub mod body;
pub mod collision;
pub mod constraint;
pub mod error;
pub mod grab;
pub mod particle;
pub mod solver;

pub use body::Body;
pub use collision::CollisionResolver;
pub use constraint::{
    tet_volume, Compliances, ConstraintSet, DistanceConstraint, DistanceKind, VolumeConstraint,
};
pub use error::TopologyError;
pub use grab::Grab;
pub use particle::ParticleSystem;
pub use solver::{SolverConfig, XpbdSolver};

pub use pliant_spatial::{Aabb3, AdjacencyList, HashGrid};
