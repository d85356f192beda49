//! Interactive grab-and-drag of a single particle.
//!
//! A grab temporarily pins the nearest particle to a world-space target so
//! the solver treats it as an immovable attachment; releasing restores the
//! saved inverse mass and hands a throw velocity back to the particle. The
//! handle is consumed on release, so a stale grab cannot touch a particle
//! twice.

use glam::Vec3;

use crate::body::Body;

/// Handle for one in-progress grab.
///
/// Returned by [`Body::start_grab`] and consumed by [`Body::end_grab`].
#[derive(Debug)]
#[must_use = "an unreleased grab leaves its particle pinned"]
pub struct Grab {
    particle: usize,
    saved_inv_mass: f32,
}

impl Grab {
    /// Index of the grabbed particle.
    pub fn particle(&self) -> usize {
        self.particle
    }
}

impl Body {
    /// Grabs the particle nearest to `target`, pinning it there.
    ///
    /// Returns `None` for an empty body. Grabbing an already pinned
    /// particle is allowed; it stays pinned after release.
    pub fn start_grab(&mut self, target: Vec3) -> Option<Grab> {
        let mut nearest = None;
        let mut nearest_d2 = f32::MAX;
        for (i, p) in self.particles.positions.iter().enumerate() {
            let d2 = p.distance_squared(target);
            if d2 < nearest_d2 {
                nearest_d2 = d2;
                nearest = Some(i);
            }
        }

        let particle = nearest?;
        let saved_inv_mass = self.particles.pin(particle);
        self.particles.positions[particle] = target;
        Some(Grab {
            particle,
            saved_inv_mass,
        })
    }

    /// Moves the grabbed particle to a new target.
    pub fn move_grab(&mut self, grab: &Grab, target: Vec3) {
        self.particles.positions[grab.particle] = target;
    }

    /// Releases the grab at `target` with the given throw velocity,
    /// restoring the particle's saved inverse mass.
    pub fn end_grab(&mut self, grab: Grab, target: Vec3, velocity: Vec3) {
        self.particles.positions[grab.particle] = target;
        self.particles.unpin(grab.particle, grab.saved_inv_mass);
        self.particles.velocities[grab.particle] = velocity;
    }
}
