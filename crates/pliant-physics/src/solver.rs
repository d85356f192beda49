//! Substepped XPBD frame loop.

use glam::Vec3;
use pliant_spatial::{Aabb3, AdjacencyList, HashGrid};

use crate::body::Body;
use crate::collision::CollisionResolver;

// Per-substep travel is capped at this fraction of the collision
// thickness, so a pair can never tunnel through each other between
// broad-phase rebuilds.
const MAX_TRAVEL_FRACTION: f32 = 0.2;

/// Tunable solver parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Gravitational acceleration.
    pub gravity: Vec3,
    /// Substeps per frame. More substeps stiffen every compliant
    /// constraint, since compliance is scaled by the substep timestep.
    pub substeps: u32,
    /// Particle collision diameter.
    pub thickness: f32,
    /// Self-collision friction in `[0, 1]`.
    pub friction: f32,
    /// Whether particle-particle contacts are resolved.
    pub self_collision: bool,
    /// Whether the y=0 ground plane is solid.
    pub ground_collision: bool,
    /// Optional world bounds the particles are confined to.
    pub bounds: Option<Aabb3>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -10.0, 0.0),
            substeps: 10,
            thickness: 0.01,
            friction: 0.0,
            self_collision: true,
            ground_collision: true,
            bounds: None,
        }
    }
}

/// Frame-stepped XPBD solver.
///
/// Owns the broad-phase grid and adjacency scratch so their allocations
/// are reused across frames. The broad phase is rebuilt once per frame
/// with a query radius padded by the worst-case per-frame travel; inside
/// the frame every substep runs predict, constraints, collisions and the
/// velocity update in a fixed order.
#[derive(Debug)]
pub struct XpbdSolver {
    /// Solver parameters, adjustable between frames.
    pub config: SolverConfig,
    grid: HashGrid,
    adjacency: AdjacencyList,
}

impl XpbdSolver {
    /// Creates a solver sized for `capacity` particles with broad-phase
    /// cells of `cell_spacing`.
    pub fn new(config: SolverConfig, capacity: usize, cell_spacing: f32) -> Self {
        Self {
            config,
            grid: HashGrid::new(cell_spacing, capacity),
            adjacency: AdjacencyList::with_capacity(capacity),
        }
    }

    /// Advances `body` by one frame of `frame_dt` seconds.
    pub fn step(&mut self, body: &mut Body, frame_dt: f32) {
        if body.particles.is_empty() || self.config.substeps == 0 {
            return;
        }
        let sdt = frame_dt / self.config.substeps as f32;

        // With self-collision on, per-substep speed is capped so that no
        // particle outruns the frame's broad-phase query radius.
        let max_speed = if self.config.self_collision {
            MAX_TRAVEL_FRACTION * self.config.thickness / sdt
        } else {
            f32::INFINITY
        };

        if self.config.self_collision {
            let max_travel = max_speed * frame_dt;
            self.grid.build(&body.particles.positions);
            self.grid
                .query_all(&body.particles.positions, max_travel, &mut self.adjacency);
        }

        let resolver =
            CollisionResolver::new(self.config.thickness).with_friction(self.config.friction);

        for _ in 0..self.config.substeps {
            body.particles.predict(sdt, self.config.gravity, max_speed);

            if self.config.ground_collision {
                resolver.solve_ground(&mut body.particles);
            }

            body.constraints.solve(&mut body.particles, sdt);

            if self.config.self_collision {
                resolver.solve_pairs(&mut body.particles, &self.adjacency);
            }
            if let Some(bounds) = self.config.bounds {
                resolver.solve_bounds(&mut body.particles, &bounds);
            }

            body.particles.update_velocities(sdt);
        }
    }
}
