//! Shared particle state buffers and the predictive integration step.

use glam::Vec3;

/// Position, velocity and mass buffers for a set of particles.
///
/// Particles are index-based: every buffer has one entry per particle and
/// all solver stages mutate the buffers in place. An inverse mass of zero
/// marks a pinned particle, which no integration, constraint or collision
/// stage will ever displace.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    /// Current positions.
    pub positions: Vec<Vec3>,
    /// Positions at the start of the current substep.
    pub prev_positions: Vec<Vec3>,
    /// Positions at construction time (undeformed state).
    pub rest_positions: Vec<Vec3>,
    /// Velocities.
    pub velocities: Vec<Vec3>,
    /// Inverse masses (0 = pinned).
    pub inv_masses: Vec<f32>,
}

impl ParticleSystem {
    /// Creates particles at the given rest positions with zero inverse mass.
    ///
    /// Inverse masses are accumulated afterwards from the incident elements
    /// of the topology (lumped-mass model); see the `Body` constructors.
    pub fn from_positions(positions: &[Vec3]) -> Self {
        Self {
            positions: positions.to_vec(),
            prev_positions: positions.to_vec(),
            rest_positions: positions.to_vec(),
            velocities: vec![Vec3::ZERO; positions.len()],
            inv_masses: vec![0.0; positions.len()],
        }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns whether `particle` is pinned.
    pub fn is_pinned(&self, particle: usize) -> bool {
        self.inv_masses[particle] == 0.0
    }

    /// Pins `particle`, returning its previous inverse mass.
    pub fn pin(&mut self, particle: usize) -> f32 {
        std::mem::replace(&mut self.inv_masses[particle], 0.0)
    }

    /// Unpins `particle` with the given inverse mass.
    pub fn unpin(&mut self, particle: usize, inv_mass: f32) {
        self.inv_masses[particle] = inv_mass.max(0.0);
    }

    /// Explicit predictive integration for one substep.
    ///
    /// For every unpinned particle: apply gravity, clamp speed to
    /// `max_speed` (bounding per-step travel so the per-frame broad phase
    /// stays conservative), cache the previous position, and advance. A
    /// particle predicted below y=0 is restored to its previous position
    /// with y clamped to the floor.
    pub fn predict(&mut self, dt: f32, gravity: Vec3, max_speed: f32) {
        for i in 0..self.len() {
            if self.inv_masses[i] == 0.0 {
                continue;
            }
            let mut v = self.velocities[i] + gravity * dt;
            let speed = v.length();
            if speed > max_speed {
                v *= max_speed / speed;
            }
            self.velocities[i] = v;
            self.prev_positions[i] = self.positions[i];
            self.positions[i] += v * dt;

            if self.positions[i].y < 0.0 {
                self.positions[i] = self.prev_positions[i];
                self.positions[i].y = 0.0;
            }
        }
    }

    /// Derives velocities from the positions moved during this substep.
    pub fn update_velocities(&mut self, dt: f32) {
        let inv_dt = 1.0 / dt;
        for i in 0..self.len() {
            if self.inv_masses[i] == 0.0 {
                continue;
            }
            self.velocities[i] = (self.positions[i] - self.prev_positions[i]) * inv_dt;
        }
    }

    /// Restores the undeformed state: rest positions, zero velocities.
    pub fn reset(&mut self) {
        self.positions.copy_from_slice(&self.rest_positions);
        self.prev_positions.copy_from_slice(&self.rest_positions);
        self.velocities.fill(Vec3::ZERO);
    }
}
