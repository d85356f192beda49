//! Compliance-weighted position constraints (XPBD).
//!
//! Constraints are built once from topology with their rest metrics
//! measured at construction, then projected every substep. Projection is
//! sequential Gauss-Seidel: each constraint reads positions already
//! corrected by the ones before it, so the solve order is part of the
//! observable convergence behavior and is kept fixed (construction order,
//! distance constraints before volume constraints).

use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::particle::ParticleSystem;

/// Per-constraint-type compliance (inverse stiffness; 0 = rigid).
///
/// The solver divides compliance by the squared substep length, so
/// stiffness is substep-size dependent by design: more substeps make the
/// same compliance value behave stiffer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Compliances {
    /// Stretch constraints along surface-mesh edges.
    pub stretch: f32,
    /// Bending constraints across surface triangle pairs.
    pub bending: f32,
    /// Edge constraints of tetrahedral meshes.
    pub edge: f32,
    /// Tetrahedral volume constraints.
    pub volume: f32,
}

impl Default for Compliances {
    fn default() -> Self {
        Self {
            stretch: 0.0,
            bending: 1.0,
            edge: 100.0,
            volume: 0.0,
        }
    }
}

/// What a distance constraint spans; determines which compliance it got
/// at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceKind {
    /// Surface-mesh edge.
    Stretch,
    /// Opposite vertices of two triangles sharing an edge.
    Bending,
    /// Tetrahedral-mesh edge.
    Edge,
}

/// Constrains two particles to their measured rest distance.
#[derive(Debug, Clone, Copy)]
pub struct DistanceConstraint {
    /// Constraint type tag.
    pub kind: DistanceKind,
    /// First particle index.
    pub a: usize,
    /// Second particle index.
    pub b: usize,
    /// Distance at construction.
    pub rest_length: f32,
    /// Compliance (inverse stiffness).
    pub compliance: f32,
}

/// Constrains four particles to their measured signed rest volume,
/// enforcing near-incompressibility of a tetrahedral element.
#[derive(Debug, Clone, Copy)]
pub struct VolumeConstraint {
    /// The tetrahedron's corner indices.
    pub particles: [usize; 4],
    /// Signed volume at construction.
    pub rest_volume: f32,
    /// Compliance (inverse stiffness).
    pub compliance: f32,
}

/// Signed volume of the tetrahedron spanned by four points.
pub fn tet_volume(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> f32 {
    (p1 - p0).cross(p2 - p0).dot(p3 - p0) / 6.0
}

/// Opposite-face vertex order used for the volume gradient of each corner.
const VOLUME_GRAD_ORDER: [[usize; 3]; 4] = [[1, 3, 2], [0, 2, 3], [0, 3, 1], [0, 1, 2]];

/// All constraints of one body, solved sequentially each substep.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    /// Distance constraints (stretch, bending, edge), in construction order.
    pub distances: Vec<DistanceConstraint>,
    /// Tetrahedral volume constraints, in construction order.
    pub volumes: Vec<VolumeConstraint>,
}

impl ConstraintSet {
    /// Total number of constraints.
    pub fn len(&self) -> usize {
        self.distances.len() + self.volumes.len()
    }

    /// Returns true if the set holds no constraints.
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty() && self.volumes.is_empty()
    }

    /// Projects every constraint once, in order.
    ///
    /// For each constraint: compute the scalar deviation `C` and its
    /// gradient per participant, form `w = sum(inv_mass * |grad|^2)`, then
    /// displace each participant by `dlambda * inv_mass * grad` with
    /// `dlambda = -C / (w + compliance / dt^2)`. Constraints whose
    /// participants are all pinned (`w == 0`) or whose geometry is
    /// degenerate (zero-length edge, zero-magnitude volume gradient)
    /// contribute no correction this step.
    pub fn solve(&self, particles: &mut ParticleSystem, dt: f32) {
        self.solve_distances(particles, dt);
        self.solve_volumes(particles, dt);
    }

    fn solve_distances(&self, particles: &mut ParticleSystem, dt: f32) {
        let inv_dt2 = 1.0 / (dt * dt);

        for c in &self.distances {
            let w0 = particles.inv_masses[c.a];
            let w1 = particles.inv_masses[c.b];
            let w = w0 + w1;
            if w == 0.0 {
                continue;
            }

            let delta = particles.positions[c.a] - particles.positions[c.b];
            let len = delta.length();
            if len == 0.0 {
                continue;
            }
            let grad = delta / len;

            let alpha = c.compliance * inv_dt2;
            let dlambda = -(len - c.rest_length) / (w + alpha);

            particles.positions[c.a] += grad * (dlambda * w0);
            particles.positions[c.b] -= grad * (dlambda * w1);
        }
    }

    fn solve_volumes(&self, particles: &mut ParticleSystem, dt: f32) {
        let inv_dt2 = 1.0 / (dt * dt);

        for c in &self.volumes {
            let ids = c.particles;
            let mut grads = [Vec3::ZERO; 4];
            let mut w = 0.0;

            for (j, order) in VOLUME_GRAD_ORDER.iter().enumerate() {
                let p0 = particles.positions[ids[order[0]]];
                let p1 = particles.positions[ids[order[1]]];
                let p2 = particles.positions[ids[order[2]]];
                grads[j] = (p1 - p0).cross(p2 - p0) / 6.0;
                w += particles.inv_masses[ids[j]] * grads[j].length_squared();
            }
            if w == 0.0 {
                continue;
            }

            let vol = tet_volume(
                particles.positions[ids[0]],
                particles.positions[ids[1]],
                particles.positions[ids[2]],
                particles.positions[ids[3]],
            );
            let alpha = c.compliance * inv_dt2;
            let dlambda = -(vol - c.rest_volume) / (w + alpha);

            for (j, grad) in grads.iter().enumerate() {
                particles.positions[ids[j]] += *grad * (dlambda * particles.inv_masses[ids[j]]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 600.0;

    fn two_free_particles(a: Vec3, b: Vec3) -> ParticleSystem {
        let mut particles = ParticleSystem::from_positions(&[a, b]);
        particles.inv_masses = vec![1.0, 1.0];
        particles
    }

    fn stretch(rest_length: f32, compliance: f32) -> ConstraintSet {
        ConstraintSet {
            distances: vec![DistanceConstraint {
                kind: DistanceKind::Stretch,
                a: 0,
                b: 1,
                rest_length,
                compliance,
            }],
            volumes: Vec::new(),
        }
    }

    #[test]
    fn test_stretch_converges_to_rest_length() {
        for initial in [0.1f32, 0.5, 2.0, 10.0] {
            let mut particles =
                two_free_particles(Vec3::ZERO, Vec3::new(initial, 0.0, 0.0));
            let set = stretch(1.0, 0.0);

            for _ in 0..20 {
                set.solve(&mut particles, DT);
            }

            let len = particles.positions[0].distance(particles.positions[1]);
            assert!(
                (len - 1.0).abs() < 1e-5,
                "from {initial}: length {len} did not converge"
            );
        }
    }

    #[test]
    fn test_stretch_preserves_midpoint_for_equal_masses() {
        let mut particles = two_free_particles(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        let before = (particles.positions[0] + particles.positions[1]) * 0.5;

        stretch(1.0, 0.0).solve(&mut particles, DT);

        let after = (particles.positions[0] + particles.positions[1]) * 0.5;
        assert!(before.distance(after) < 1e-6);
    }

    #[test]
    fn test_pinned_participant_never_moves() {
        let mut particles = two_free_particles(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        particles.inv_masses[0] = 0.0;
        let set = stretch(1.0, 0.0);

        for _ in 0..10 {
            set.solve(&mut particles, DT);
        }

        assert_eq!(particles.positions[0], Vec3::ZERO);
        let len = particles.positions[0].distance(particles.positions[1]);
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_all_pinned_is_skipped() {
        let mut particles = two_free_particles(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        particles.inv_masses = vec![0.0, 0.0];

        stretch(1.0, 0.0).solve(&mut particles, DT);

        assert_eq!(particles.positions[1], Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_length_edge_is_skipped() {
        // Coincident particles have no defined gradient; the constraint must
        // contribute nothing rather than divide by zero.
        let mut particles = two_free_particles(Vec3::ONE, Vec3::ONE);
        stretch(1.0, 0.0).solve(&mut particles, DT);

        assert!(particles.positions[0].is_finite());
        assert_eq!(particles.positions[0], Vec3::ONE);
    }

    #[test]
    fn test_compliance_softens_correction() {
        let mut rigid = two_free_particles(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        let mut soft = rigid.clone();

        stretch(1.0, 0.0).solve(&mut rigid, DT);
        stretch(1.0, 0.01).solve(&mut soft, DT);

        let rigid_err = (rigid.positions[0].distance(rigid.positions[1]) - 1.0).abs();
        let soft_err = (soft.positions[0].distance(soft.positions[1]) - 1.0).abs();
        assert!(rigid_err < soft_err);
    }

    fn unit_tet() -> (ParticleSystem, ConstraintSet) {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let mut particles = ParticleSystem::from_positions(&positions);
        particles.inv_masses = vec![1.0; 4];

        let rest_volume = tet_volume(positions[0], positions[1], positions[2], positions[3]);
        let set = ConstraintSet {
            distances: Vec::new(),
            volumes: vec![VolumeConstraint {
                particles: [0, 1, 2, 3],
                rest_volume,
                compliance: 0.0,
            }],
        };
        (particles, set)
    }

    #[test]
    fn test_tet_volume_of_unit_corner() {
        let vol = tet_volume(
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
        );
        assert!((vol - 1.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_volume_converges_to_rest() {
        let (mut particles, set) = unit_tet();

        // Squash the tet to a quarter of its height.
        for p in &mut particles.positions {
            p.y *= 0.25;
        }

        for _ in 0..50 {
            set.solve(&mut particles, DT);
        }

        let vol = tet_volume(
            particles.positions[0],
            particles.positions[1],
            particles.positions[2],
            particles.positions[3],
        );
        assert!((vol - 1.0 / 6.0).abs() < 1e-5, "volume {vol}");
    }

    #[test]
    fn test_degenerate_tet_is_skipped() {
        // All four corners coplanar: every volume gradient is well-defined
        // but a fully coincident tet has zero gradients and must be skipped.
        let positions = [Vec3::ZERO; 4];
        let mut particles = ParticleSystem::from_positions(&positions);
        particles.inv_masses = vec![1.0; 4];

        let set = ConstraintSet {
            distances: Vec::new(),
            volumes: vec![VolumeConstraint {
                particles: [0, 1, 2, 3],
                rest_volume: 1.0,
                compliance: 0.0,
            }],
        };
        set.solve(&mut particles, DT);

        for p in &particles.positions {
            assert!(p.is_finite());
            assert_eq!(*p, Vec3::ZERO);
        }
    }
}
