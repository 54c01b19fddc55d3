//! Neighborhoods of a square lattice.
//!
//! A [`Neighborhood`] is a pure coordinate generator: given a cell it yields
//! the coordinates of the adjacent cells, in a fixed order, under a fixed
//! boundary policy. Nothing is stored per cell.

use crate::error::{Error, Result};
use crate::lattice::Coord;
use serde::{Deserialize, Serialize};

/// Orthogonal offsets, enumerated row-major: N, W, E, S.
const VON_NEUMANN_OFFSETS: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];

/// Orthogonal and diagonal offsets, enumerated row-major: NW, N, NE, W, E, SW, S, SE.
const MOORE_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Which cells count as adjacent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborhoodKind {
    /// The 4 cells at Manhattan distance 1.
    #[default]
    VonNeumann,
    /// The 8 cells at Chebyshev distance 1.
    Moore,
}

/// How neighbors past the lattice edge are handled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Each axis wraps modulo the lattice length (torus). Every cell has
    /// exactly [`Neighborhood::size`] neighbors.
    #[default]
    Wrap,
    /// Out-of-range neighbors are dropped, so edge cells have fewer.
    Clip,
}

/// A neighborhood topology bound to one lattice length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood {
    kind: NeighborhoodKind,
    boundary: Boundary,
    length: usize,
}

impl Neighborhood {
    /// Create a neighborhood for a `length x length` lattice.
    ///
    /// Returns [`Error::Configuration`] if `length` is zero.
    pub fn new(kind: NeighborhoodKind, boundary: Boundary, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::Configuration(
                "neighborhood length must be at least 1".into(),
            ));
        }
        Ok(Self {
            kind,
            boundary,
            length,
        })
    }

    /// Wrapped Von Neumann neighborhood.
    pub fn von_neumann(length: usize) -> Result<Self> {
        Self::new(NeighborhoodKind::VonNeumann, Boundary::Wrap, length)
    }

    /// Wrapped Moore neighborhood.
    pub fn moore(length: usize) -> Result<Self> {
        Self::new(NeighborhoodKind::Moore, Boundary::Wrap, length)
    }

    pub fn kind(&self) -> NeighborhoodKind {
        self.kind
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of neighbors of every cell under [`Boundary::Wrap`].
    ///
    /// Under [`Boundary::Clip`] this is the count for interior cells only.
    pub fn size(&self) -> usize {
        self.offsets().len()
    }

    /// Neighbor coordinates of `coord`, in row-major offset order.
    ///
    /// On tiny wrapped lattices (length 1 or 2) the same cell may appear more
    /// than once, which keeps the count equal to [`Self::size`].
    pub fn indexes_for(&self, coord: Coord) -> impl Iterator<Item = Coord> + '_ {
        let (row, col) = coord;
        self.offsets().iter().filter_map(move |&(d_row, d_col)| {
            let row = self.resolve_axis(row, d_row)?;
            let col = self.resolve_axis(col, d_col)?;
            Some((row, col))
        })
    }

    fn offsets(&self) -> &'static [(isize, isize)] {
        match self.kind {
            NeighborhoodKind::VonNeumann => &VON_NEUMANN_OFFSETS,
            NeighborhoodKind::Moore => &MOORE_OFFSETS,
        }
    }

    fn resolve_axis(&self, val: usize, delta: isize) -> Option<usize> {
        let len = self.length as isize;
        let val = val as isize + delta;
        if (0..len).contains(&val) {
            return Some(val as usize);
        }
        match self.boundary {
            Boundary::Wrap => Some(val.rem_euclid(len) as usize),
            Boundary::Clip => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(nbh: &Neighborhood, coord: Coord) -> Vec<Coord> {
        nbh.indexes_for(coord).collect()
    }

    #[test]
    fn von_neumann_interior() {
        let nbh = Neighborhood::von_neumann(5).unwrap();
        assert_eq!(nbh.size(), 4);
        assert_eq!(collect(&nbh, (2, 2)), vec![(1, 2), (2, 1), (2, 3), (3, 2)]);
    }

    #[test]
    fn von_neumann_wraps_corner() {
        let nbh = Neighborhood::von_neumann(5).unwrap();
        assert_eq!(collect(&nbh, (0, 0)), vec![(4, 0), (0, 4), (0, 1), (1, 0)]);
    }

    #[test]
    fn moore_wraps_corner() {
        let nbh = Neighborhood::moore(4).unwrap();
        assert_eq!(
            collect(&nbh, (3, 3)),
            vec![
                (2, 2),
                (2, 3),
                (2, 0),
                (3, 2),
                (3, 0),
                (0, 2),
                (0, 3),
                (0, 0)
            ]
        );
    }

    #[test]
    fn clip_drops_outside_cells() {
        let vn = Neighborhood::new(NeighborhoodKind::VonNeumann, Boundary::Clip, 5).unwrap();
        assert_eq!(collect(&vn, (0, 0)), vec![(0, 1), (1, 0)]);
        assert_eq!(collect(&vn, (0, 2)).len(), 3);
        assert_eq!(collect(&vn, (2, 2)).len(), 4);

        let moore = Neighborhood::new(NeighborhoodKind::Moore, Boundary::Clip, 5).unwrap();
        assert_eq!(collect(&moore, (4, 4)).len(), 3);
        assert_eq!(collect(&moore, (4, 2)).len(), 5);
        assert_eq!(moore.size(), 8);
    }

    #[test]
    fn single_cell_lattice_is_its_own_neighbor() {
        let nbh = Neighborhood::moore(1).unwrap();
        assert_eq!(collect(&nbh, (0, 0)), vec![(0, 0); 8]);
    }

    #[test]
    fn zero_length_is_rejected() {
        let err = Neighborhood::von_neumann(0).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    proptest! {
        #[test]
        fn wrapped_count_is_constant(length in 1usize..40, row in 0usize..40, col in 0usize..40) {
            let coord = (row % length, col % length);
            for kind in [NeighborhoodKind::VonNeumann, NeighborhoodKind::Moore] {
                let nbh = Neighborhood::new(kind, Boundary::Wrap, length).unwrap();
                let neighbors = collect(&nbh, coord);
                prop_assert_eq!(neighbors.len(), nbh.size());
                prop_assert!(neighbors.iter().all(|&(r, c)| r < length && c < length));
            }
        }

        #[test]
        fn enumeration_is_deterministic(length in 3usize..30, row in 0usize..30, col in 0usize..30) {
            let coord = (row % length, col % length);
            let nbh = Neighborhood::moore(length).unwrap();
            prop_assert_eq!(collect(&nbh, coord), collect(&nbh, coord));
            prop_assert!(!collect(&nbh, coord).contains(&coord));
        }
    }
}
