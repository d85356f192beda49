//! Position-level collision response.
//!
//! All collision handling runs after the constraint pass of each substep
//! and works directly on positions; the velocity pass then derives the
//! resulting velocities from the corrected motion.

use glam::Vec3;
use pliant_spatial::{Aabb3, AdjacencyList};

use crate::particle::ParticleSystem;

// Fraction of the penetrating displacement undone by the ground response.
const GROUND_DAMPING: f32 = 1.0;

/// Resolves ground, bounds and particle-particle contacts.
///
/// Particles are treated as spheres of diameter `thickness` for every
/// collision mode. Self-collision pairs come from a precomputed
/// [`AdjacencyList`]; the resolver itself never queries the broad phase.
#[derive(Debug, Clone, Copy)]
pub struct CollisionResolver {
    /// Particle collision diameter.
    pub thickness: f32,
    /// Self-collision friction in `[0, 1]`; 1 cancels all relative
    /// tangential motion between a colliding pair.
    pub friction: f32,
}

impl CollisionResolver {
    /// Creates a resolver with the given particle thickness and no friction.
    pub fn new(thickness: f32) -> Self {
        Self {
            thickness,
            friction: 0.0,
        }
    }

    /// Sets the self-collision friction coefficient.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Keeps every particle center at least half a thickness above y=0.
    ///
    /// A penetrating particle has its current-substep displacement undone
    /// (damped) before its height is clamped, killing the motion that
    /// carried it into the floor.
    pub fn solve_ground(&self, particles: &mut ParticleSystem) {
        let min_y = 0.5 * self.thickness;
        for i in 0..particles.len() {
            if particles.is_pinned(i) {
                continue;
            }
            if particles.positions[i].y < min_y {
                let displacement = particles.positions[i] - particles.prev_positions[i];
                particles.positions[i] -= displacement * GROUND_DAMPING;
                particles.positions[i].y = min_y;
            }
        }
    }

    /// Confines every particle to `bounds`, inset by half a thickness.
    ///
    /// Each out-of-range axis is clamped and the previous position is
    /// reflected across the wall, so the velocity pass derives the bounced
    /// velocity from the corrected motion.
    pub fn solve_bounds(&self, particles: &mut ParticleSystem, bounds: &Aabb3) {
        let radius = 0.5 * self.thickness;
        let lo = bounds.min + Vec3::splat(radius);
        let hi = bounds.max - Vec3::splat(radius);
        for i in 0..particles.len() {
            if particles.is_pinned(i) {
                continue;
            }
            let travel = particles.positions[i] - particles.prev_positions[i];
            for axis in 0..3 {
                let p = particles.positions[i][axis];
                if p < lo[axis] || p > hi[axis] {
                    let clamped = p.clamp(lo[axis], hi[axis]);
                    particles.positions[i][axis] = clamped;
                    particles.prev_positions[i][axis] = clamped + travel[axis];
                }
            }
        }
    }

    /// Resolves particle-particle contacts from the adjacency list.
    ///
    /// A pair is pushed apart only when closer than `thickness` AND closer
    /// than its rest distance. Pairs that started closer than `thickness`
    /// in the rest state (seams, folds baked into the mesh) are only
    /// separated back to that rest distance, never forced further apart.
    /// Corrections are split evenly; pairs with a pinned member are left to
    /// the constraint solver.
    pub fn solve_pairs(&self, particles: &mut ParticleSystem, adjacency: &AdjacencyList) {
        let thickness_sq = self.thickness * self.thickness;

        for i in 0..particles.len() {
            if particles.is_pinned(i) {
                continue;
            }
            for &j in adjacency.neighbors(i) {
                if particles.is_pinned(j) {
                    continue;
                }

                let delta = particles.positions[j] - particles.positions[i];
                let dist_sq = delta.length_squared();
                if dist_sq > thickness_sq || dist_sq == 0.0 {
                    continue;
                }

                let rest_sq = particles.rest_positions[i]
                    .distance_squared(particles.rest_positions[j]);
                if dist_sq > rest_sq {
                    continue;
                }

                let min_dist = if rest_sq < thickness_sq {
                    rest_sq.sqrt()
                } else {
                    self.thickness
                };

                let dist = dist_sq.sqrt();
                let correction = delta * (0.5 * (min_dist - dist) / dist);
                particles.positions[i] -= correction;
                particles.positions[j] += correction;

                if self.friction > 0.0 {
                    // Drag both displacements toward the pair average.
                    let disp_i = particles.positions[i] - particles.prev_positions[i];
                    let disp_j = particles.positions[j] - particles.prev_positions[j];
                    let avg = 0.5 * (disp_i + disp_j);
                    particles.positions[i] += (avg - disp_i) * self.friction;
                    particles.positions[j] += (avg - disp_j) * self.friction;
                }
            }
        }
    }
}
