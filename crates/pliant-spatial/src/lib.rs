//! Spatial acceleration structures for particle-based simulation.
//!
//! This crate provides the broad phase used by the deformable-body solver:
//!
//! - [`HashGrid`] - uniform spatial-hash grid over unbounded 3D space,
//!   rebuilt once per frame with a counting sort
//! - [`AdjacencyList`] - per-particle neighbor lists in CSR layout,
//!   produced by [`HashGrid::query_all`]
//! - [`Aabb3`] - 3D axis-aligned bounding box used for world bounds
//!
//! The grid does not filter by exact distance: [`HashGrid::query`] returns
//! every particle stored in the cells covered by the query box, so callers
//! must re-check squared distance against their radius. Distinct cells may
//! alias to the same table slot; that only adds false positives.
//!
//! # Example
//!
//! ```
//! use pliant_spatial::HashGrid;
//! use glam::Vec3;
//!
//! let positions = vec![
//!     Vec3::new(0.0, 0.0, 0.0),
//!     Vec3::new(0.05, 0.0, 0.0),
//!     Vec3::new(3.0, 0.0, 0.0),
//! ];
//!
//! let mut grid = HashGrid::new(0.1, positions.len());
//! grid.build(&positions);
//!
//! let hits = grid.query(Vec3::ZERO, 0.1);
//! assert!(hits.contains(&0) && hits.contains(&1));
//! ```

use glam::{IVec3, Vec3};

// ============================================================================
// AABB
// ============================================================================

/// 3D axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb3 {
    /// Creates a new AABB from min and max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates an AABB from center and half-extents.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Returns the center of the AABB.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the size of the AABB.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Checks if this AABB contains a point.
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

// ============================================================================
// Adjacency list
// ============================================================================

/// Per-particle neighbor lists in CSR layout.
///
/// `first(i)..first(i+1)` indexes the flat id array; each unordered pair is
/// stored exactly once, on the particle with the larger index. The backing
/// array grows by doubling when a frame produces more candidate pairs than
/// the current capacity, and is reused across frames otherwise.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyList {
    first: Vec<usize>,
    adj: Vec<usize>,
    pairs: usize,
}

impl AdjacencyList {
    /// Creates an empty adjacency list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adjacency list pre-sized for `particles` entries.
    pub fn with_capacity(particles: usize) -> Self {
        Self {
            first: vec![0; particles + 1],
            adj: vec![0; 10 * particles],
            pairs: 0,
        }
    }

    /// Returns the neighbors recorded for `particle` in the last rebuild.
    ///
    /// Every returned index is smaller than `particle`.
    pub fn neighbors(&self, particle: usize) -> &[usize] {
        &self.adj[self.first[particle]..self.first[particle + 1]]
    }

    /// Number of particles covered by the last rebuild.
    pub fn particle_count(&self) -> usize {
        self.first.len().saturating_sub(1)
    }

    /// Total number of candidate pairs recorded by the last rebuild.
    pub fn pair_count(&self) -> usize {
        self.pairs
    }
}

// ============================================================================
// Hash grid
// ============================================================================

/// Table slots per stored particle. Low bucket occupancy keeps the
/// false-positive rate of hash aliasing down.
const TABLE_SCALE: usize = 5;

// Large primes for mixing the three integer cell coordinates.
const HASH_P1: i32 = 92_837_111;
const HASH_P2: i32 = 689_287_499;
const HASH_P3: i32 = 283_923_481;

/// Uniform spatial-hash grid with O(1) amortized neighbor queries.
///
/// The grid covers unbounded space: integer cell coordinates are mixed into
/// a fixed-size table, so no world bounds are needed. [`HashGrid::build`]
/// runs a three-pass counting sort that leaves each cell's particle indices
/// contiguous in a flat entry array; all buffers are reused across frames.
#[derive(Debug, Clone)]
pub struct HashGrid {
    spacing: f32,
    table_size: usize,
    cell_start: Vec<usize>,
    entries: Vec<usize>,
    query_ids: Vec<usize>,
    len: usize,
}

impl HashGrid {
    /// Creates a grid with the given cell spacing, sized for `capacity`
    /// particles.
    ///
    /// Spacing should be on the order of the query radius; much smaller
    /// cells inflate the number of cells visited per query, much larger
    /// cells inflate the number of candidates returned.
    pub fn new(spacing: f32, capacity: usize) -> Self {
        let table_size = (TABLE_SCALE * capacity).max(1);
        Self {
            spacing,
            table_size,
            cell_start: vec![0; table_size + 1],
            entries: vec![0; capacity],
            query_ids: Vec::new(),
            len: 0,
        }
    }

    /// Returns the cell spacing.
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Number of particles stored by the last [`HashGrid::build`].
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no particles are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell_coords(&self, position: Vec3) -> IVec3 {
        (position / self.spacing).floor().as_ivec3()
    }

    fn hash_cell(&self, cell: IVec3) -> usize {
        let h = cell.x.wrapping_mul(HASH_P1)
            ^ cell.y.wrapping_mul(HASH_P2)
            ^ cell.z.wrapping_mul(HASH_P3);
        h.unsigned_abs() as usize % self.table_size
    }

    fn hash_position(&self, position: Vec3) -> usize {
        self.hash_cell(self.cell_coords(position))
    }

    /// Rebuilds the grid over `positions` with a three-pass counting sort:
    /// histogram cell occupancy, prefix-sum into start offsets, then scatter
    /// particle indices so each cell's entries are contiguous.
    ///
    /// Must be called before any query in the same frame.
    pub fn build(&mut self, positions: &[Vec3]) {
        if positions.len() > self.entries.len() {
            self.entries.resize(positions.len(), 0);
        }
        self.len = positions.len();

        self.cell_start.fill(0);
        for &p in positions {
            let h = self.hash_position(p);
            self.cell_start[h] += 1;
        }

        let mut start = 0;
        for slot in &mut self.cell_start[..self.table_size] {
            start += *slot;
            *slot = start;
        }
        self.cell_start[self.table_size] = start; // guard

        for (i, &p) in positions.iter().enumerate() {
            let h = self.hash_position(p);
            self.cell_start[h] -= 1;
            self.entries[self.cell_start[h]] = i;
        }
    }

    /// Returns the indices of all particles stored in cells covered by
    /// `position` ± `radius` on every axis.
    ///
    /// No exact distance filtering is performed; the result may contain
    /// particles farther than `radius` (cell granularity and hash aliasing),
    /// but never misses one within it. The returned slice borrows an
    /// internal scratch buffer and is valid until the next query.
    pub fn query(&mut self, position: Vec3, radius: f32) -> &[usize] {
        self.query_ids.clear();

        let lo = self.cell_coords(position - Vec3::splat(radius));
        let hi = self.cell_coords(position + Vec3::splat(radius));

        for xi in lo.x..=hi.x {
            for yi in lo.y..=hi.y {
                for zi in lo.z..=hi.z {
                    let h = self.hash_cell(IVec3::new(xi, yi, zi));
                    let start = self.cell_start[h];
                    let end = self.cell_start[h + 1];
                    self.query_ids.extend_from_slice(&self.entries[start..end]);
                }
            }
        }

        &self.query_ids
    }

    /// Rebuilds `adjacency` with every pair of particles closer than
    /// `max_travel`, deduplicated (stored on the larger index).
    ///
    /// `max_travel` must upper-bound the total displacement any particle can
    /// undergo across all substeps of the frame; a pair that is farther
    /// apart than that now cannot come into contact before the next rebuild.
    pub fn query_all(&mut self, positions: &[Vec3], max_travel: f32, adjacency: &mut AdjacencyList) {
        let count = positions.len();
        let max_d2 = max_travel * max_travel;

        adjacency.first.clear();
        adjacency.first.resize(count + 1, 0);

        let mut num = 0;
        for i in 0..count {
            adjacency.first[i] = num;
            let found = self.query(positions[i], max_travel);
            for &j in found {
                if j >= i {
                    continue;
                }
                if positions[i].distance_squared(positions[j]) > max_d2 {
                    continue;
                }
                if num == adjacency.adj.len() {
                    adjacency.adj.resize((num * 2).max(16), 0);
                }
                adjacency.adj[num] = j;
                num += 1;
            }
        }
        adjacency.first[count] = num;
        adjacency.pairs = num;
    }
}
