//! Deformable bodies built from surface or tetrahedral topology.
//!
//! A [`Body`] is the constraint-based particle-system core: particles plus
//! the constraint set derived from its topology. Cloth, soft bodies and
//! free particle sets are all the same type, differing only in which
//! constraint types their constructor produced and which collision modes
//! the solver runs; there are no per-variant classes.

use glam::Vec3;

use crate::constraint::{
    tet_volume, Compliances, ConstraintSet, DistanceConstraint, DistanceKind, VolumeConstraint,
};
use crate::error::TopologyError;
use crate::particle::ParticleSystem;

/// A deformable body: particle buffers plus the constraints that hold its
/// shape.
#[derive(Debug, Clone)]
pub struct Body {
    /// Particle state buffers.
    pub particles: ParticleSystem,
    /// Constraints derived from the topology at construction.
    pub constraints: ConstraintSet,
}

impl Body {
    /// Builds a body from a triangulated surface.
    ///
    /// One stretch constraint is created per unique mesh edge and one
    /// bending constraint per pair of triangles sharing an edge,
    /// constraining the two triangle-opposite vertices. Rest lengths are
    /// measured from `positions`. Inverse mass is lumped: every vertex
    /// accumulates `1 / (area / 3)` for each incident triangle, so heavier
    /// (larger) regions of the mesh resist correction more.
    pub fn from_surface(
        positions: &[Vec3],
        triangles: &[[usize; 3]],
        compliances: Compliances,
    ) -> Result<Self, TopologyError> {
        validate_indices(positions.len(), triangles.iter().flatten().copied())?;

        let mut particles = ParticleSystem::from_positions(positions);
        for tri in triangles {
            let e0 = positions[tri[1]] - positions[tri[0]];
            let e1 = positions[tri[2]] - positions[tri[0]];
            let area = 0.5 * e0.cross(e1).length();
            let share = if area > 0.0 { 1.0 / (area / 3.0) } else { 0.0 };
            for &v in tri {
                particles.inv_masses[v] += share;
            }
        }

        let neighbors = find_tri_neighbors(triangles);
        let mut constraints = ConstraintSet::default();

        for (i, tri) in triangles.iter().enumerate() {
            for j in 0..3 {
                let id0 = tri[j];
                let id1 = tri[(j + 1) % 3];
                let neighbor = neighbors[3 * i + j];

                // A shared edge belongs to the half-edge with ascending
                // indices; open edges always belong to their triangle.
                if neighbor < 0 || id0 < id1 {
                    constraints.distances.push(DistanceConstraint {
                        kind: DistanceKind::Stretch,
                        a: id0,
                        b: id1,
                        rest_length: positions[id0].distance(positions[id1]),
                        compliance: compliances.stretch,
                    });
                }
                if neighbor >= 0 && id0 < id1 {
                    let n = neighbor as usize;
                    let id2 = tri[(j + 2) % 3];
                    let id3 = triangles[n / 3][(n % 3 + 2) % 3];
                    constraints.distances.push(DistanceConstraint {
                        kind: DistanceKind::Bending,
                        a: id2,
                        b: id3,
                        rest_length: positions[id2].distance(positions[id3]),
                        compliance: compliances.bending,
                    });
                }
            }
        }

        Ok(Self {
            particles,
            constraints,
        })
    }

    /// Builds a body from a tetrahedral mesh.
    ///
    /// One volume constraint is created per tetrahedron (signed rest volume
    /// measured from `positions`) and one edge constraint per entry of
    /// `edges`. Inverse mass is lumped: every corner accumulates
    /// `1 / (volume / 4)` for each incident tetrahedron; inverted rest
    /// elements contribute no mass.
    pub fn from_tetrahedra(
        positions: &[Vec3],
        tetrahedra: &[[usize; 4]],
        edges: &[[usize; 2]],
        compliances: Compliances,
    ) -> Result<Self, TopologyError> {
        validate_indices(positions.len(), tetrahedra.iter().flatten().copied())?;
        validate_indices(positions.len(), edges.iter().flatten().copied())?;

        let mut particles = ParticleSystem::from_positions(positions);
        let mut constraints = ConstraintSet::default();

        for tet in tetrahedra {
            let vol = tet_volume(
                positions[tet[0]],
                positions[tet[1]],
                positions[tet[2]],
                positions[tet[3]],
            );
            let share = if vol > 0.0 { 1.0 / (vol / 4.0) } else { 0.0 };
            for &v in tet {
                particles.inv_masses[v] += share;
            }
            constraints.volumes.push(VolumeConstraint {
                particles: *tet,
                rest_volume: vol,
                compliance: compliances.volume,
            });
        }

        for edge in edges {
            constraints.distances.push(DistanceConstraint {
                kind: DistanceKind::Edge,
                a: edge[0],
                b: edge[1],
                rest_length: positions[edge[0]].distance(positions[edge[1]]),
                compliance: compliances.edge,
            });
        }

        Ok(Self {
            particles,
            constraints,
        })
    }

    /// Builds a rectangular cloth grid in the XZ plane at the given height,
    /// centered on the origin.
    ///
    /// Particle `(i, j)` has index `i * num_z + j`; each quad is split into
    /// two triangles, so the derived constraints cover grid edges, one
    /// diagonal per quad, and bending across every shared edge.
    pub fn cloth_grid(
        num_x: usize,
        num_z: usize,
        spacing: f32,
        height: f32,
        compliances: Compliances,
    ) -> Result<Self, TopologyError> {
        let mut positions = Vec::with_capacity(num_x * num_z);
        for i in 0..num_x {
            for j in 0..num_z {
                positions.push(Vec3::new(
                    (i as f32 - (num_x.saturating_sub(1)) as f32 * 0.5) * spacing,
                    height,
                    (j as f32 - (num_z.saturating_sub(1)) as f32 * 0.5) * spacing,
                ));
            }
        }

        let mut triangles = Vec::new();
        for i in 0..num_x.saturating_sub(1) {
            for j in 0..num_z.saturating_sub(1) {
                let id = i * num_z + j;
                triangles.push([id + 1, id, id + 1 + num_z]);
                triangles.push([id + 1 + num_z, id, id + num_z]);
            }
        }

        Self::from_surface(&positions, &triangles, compliances)
    }

    /// Number of particles.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Current positions, for the rendering collaborator.
    pub fn positions(&self) -> &[Vec3] {
        &self.particles.positions
    }

    /// Current velocities.
    pub fn velocities(&self) -> &[Vec3] {
        &self.particles.velocities
    }

    /// Pins the particles at the given indices.
    pub fn pin(&mut self, indices: &[usize]) {
        for &i in indices {
            if i < self.particles.len() {
                self.particles.pin(i);
            }
        }
    }

    /// Restores the rest state: rest positions, zero velocities.
    pub fn reset(&mut self) {
        self.particles.reset();
    }
}

fn validate_indices(
    count: usize,
    indices: impl IntoIterator<Item = usize>,
) -> Result<(), TopologyError> {
    if count == 0 {
        return Err(TopologyError::Empty);
    }
    for index in indices {
        if index >= count {
            return Err(TopologyError::IndexOutOfRange { index, count });
        }
    }
    Ok(())
}

/// For each half-edge `3 * tri + j`, the matching half-edge of the
/// neighboring triangle, or -1 for an open edge.
fn find_tri_neighbors(triangles: &[[usize; 3]]) -> Vec<isize> {
    let mut edges = Vec::with_capacity(triangles.len() * 3);
    for (i, tri) in triangles.iter().enumerate() {
        for j in 0..3 {
            let id0 = tri[j];
            let id1 = tri[(j + 1) % 3];
            edges.push((id0.min(id1), id0.max(id1), 3 * i + j));
        }
    }

    // Sorting brings the two half-edges of a shared edge next to each other.
    edges.sort_unstable();

    let mut neighbors = vec![-1isize; triangles.len() * 3];
    let mut k = 0;
    while k + 1 < edges.len() {
        let e0 = edges[k];
        let e1 = edges[k + 1];
        if e0.0 == e1.0 && e0.1 == e1.1 {
            neighbors[e0.2] = e1.2 as isize;
            neighbors[e1.2] = e0.2 as isize;
            k += 2;
        } else {
            k += 1;
        }
    }
    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_quad_constraints() {
        // Two triangles sharing edge (1, 2): five unique edges and one
        // bending constraint across the shared edge.
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
        ];
        let triangles = [[0, 1, 2], [1, 3, 2]];
        let body = Body::from_surface(&positions, &triangles, Compliances::default()).unwrap();

        let stretch: Vec<_> = body
            .constraints
            .distances
            .iter()
            .filter(|c| c.kind == DistanceKind::Stretch)
            .collect();
        let bending: Vec<_> = body
            .constraints
            .distances
            .iter()
            .filter(|c| c.kind == DistanceKind::Bending)
            .collect();

        assert_eq!(stretch.len(), 5);
        assert_eq!(bending.len(), 1);

        // The bending constraint spans the two triangle-opposite vertices.
        let b = bending[0];
        let (lo, hi) = (b.a.min(b.b), b.a.max(b.b));
        assert_eq!((lo, hi), (0, 3));
        assert!((b.rest_length - positions[0].distance(positions[3])).abs() < 1e-6);
    }

    #[test]
    fn test_surface_lumped_mass() {
        // A single right triangle of area 0.5: each vertex gets
        // 1 / (0.5 / 3) = 6.
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Z];
        let body =
            Body::from_surface(&positions, &[[0, 1, 2]], Compliances::default()).unwrap();

        for &w in &body.particles.inv_masses {
            assert!((w - 6.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_triangle_contributes_no_mass() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        let body =
            Body::from_surface(&positions, &[[0, 1, 2]], Compliances::default()).unwrap();

        for &w in &body.particles.inv_masses {
            assert_eq!(w, 0.0);
        }
    }

    #[test]
    fn test_surface_rejects_out_of_range_index() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Z];
        let err = Body::from_surface(&positions, &[[0, 1, 7]], Compliances::default())
            .unwrap_err();
        assert_eq!(err, TopologyError::IndexOutOfRange { index: 7, count: 3 });
    }

    #[test]
    fn test_rejects_empty_topology() {
        let err = Body::from_surface(&[], &[], Compliances::default()).unwrap_err();
        assert_eq!(err, TopologyError::Empty);
    }

    #[test]
    fn test_tetrahedral_lumped_mass_and_constraints() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let tets = [[0, 1, 2, 3]];
        let edges = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];
        let body =
            Body::from_tetrahedra(&positions, &tets, &edges, Compliances::default()).unwrap();

        assert_eq!(body.constraints.volumes.len(), 1);
        assert_eq!(body.constraints.distances.len(), 6);
        assert!((body.constraints.volumes[0].rest_volume - 1.0 / 6.0).abs() < 1e-6);

        // Each corner gets 1 / (vol / 4) = 24 for the unit corner tet.
        for &w in &body.particles.inv_masses {
            assert!((w - 24.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_tetrahedra_rejects_out_of_range_edge() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let err = Body::from_tetrahedra(
            &positions,
            &[[0, 1, 2, 3]],
            &[[0, 9]],
            Compliances::default(),
        )
        .unwrap_err();
        assert_eq!(err, TopologyError::IndexOutOfRange { index: 9, count: 4 });
    }

    #[test]
    fn test_cloth_grid_layout() {
        let body = Body::cloth_grid(4, 3, 0.1, 0.5, Compliances::default()).unwrap();
        assert_eq!(body.particle_count(), 12);

        // Laid out flat at the requested height, centered on the origin.
        let center: Vec3 =
            body.positions().iter().sum::<Vec3>() / body.particle_count() as f32;
        assert!(center.x.abs() < 1e-5 && center.z.abs() < 1e-5);
        for p in body.positions() {
            assert_eq!(p.y, 0.5);
        }
    }

    #[test]
    fn test_cloth_grid_is_constrained() {
        let body = Body::cloth_grid(3, 3, 0.1, 0.0, Compliances::default()).unwrap();

        // 4 quads: 12 grid edges + 4 diagonals stretch, bending across
        // every shared edge (4 diagonals + 4 interior grid edges).
        let stretch = body
            .constraints
            .distances
            .iter()
            .filter(|c| c.kind == DistanceKind::Stretch)
            .count();
        let bending = body
            .constraints
            .distances
            .iter()
            .filter(|c| c.kind == DistanceKind::Bending)
            .count();
        assert_eq!(stretch, 16);
        assert_eq!(bending, 8);
    }

    #[test]
    fn test_find_tri_neighbors_shared_edge() {
        let triangles = [[0, 1, 2], [1, 3, 2]];
        let neighbors = find_tri_neighbors(&triangles);

        // Edge (1, 2) is half-edge 1 of triangle 0 and half-edge 2 of
        // triangle 1; everything else is open.
        assert_eq!(neighbors[1], 5);
        assert_eq!(neighbors[5], 1);
        assert_eq!(neighbors.iter().filter(|&&n| n < 0).count(), 4);
    }
}
