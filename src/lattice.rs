//! Square lattice of agents.

use crate::agent::{Agent, LatticeAgent};
use crate::error::{Error, Result};
use crate::neighborhood::Neighborhood;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use std::collections::VecDeque;

/// Cell coordinate `(row, col)`.
pub type Coord = (usize, usize);

/// A `length x length` grid holding exactly one agent per cell.
///
/// Cells are stored row-major; `length` is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice<A> {
    length: usize,
    cells: Vec<A>,
}

impl<A> Lattice<A> {
    /// Build a lattice by calling `f` once per coordinate, row-major.
    pub fn from_fn<F>(length: usize, mut f: F) -> Self
    where
        F: FnMut(Coord) -> A,
    {
        let cells = coords(length).map(&mut f).collect();
        Self { length, cells }
    }

    /// Fallible version of [`Lattice::from_fn`]; stops at the first error.
    pub fn try_from_fn<F>(length: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(Coord) -> Result<A>,
    {
        let cells = coords(length).map(&mut f).collect::<Result<_>>()?;
        Ok(Self { length, cells })
    }

    /// Build a lattice from nested rows, which must form a non-empty square.
    pub fn from_rows(rows: Vec<Vec<A>>) -> Result<Self> {
        let length = rows.len();
        if length == 0 {
            return Err(Error::Configuration("lattice must not be empty".into()));
        }
        if let Some(i_row) = rows.iter().position(|row| row.len() != length) {
            return Err(Error::Configuration(format!(
                "lattice must be square ({length}x{length}), but row {i_row} has {} cells",
                rows[i_row].len()
            )));
        }
        let cells = rows.into_iter().flatten().collect();
        Ok(Self { length, cells })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false`: construction rejects empty lattices.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Coordinates of this lattice in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + use<A> {
        coords(self.length)
    }

    pub fn get(&self, coord: Coord) -> Option<&A> {
        let (row, col) = coord;
        if row >= self.length || col >= self.length {
            return None;
        }
        self.cells.get(row * self.length + col)
    }

    /// Agent at `coord`.
    ///
    /// # Panics
    /// If `coord` lies outside the lattice.
    pub fn at(&self, coord: Coord) -> &A {
        &self.cells[self.index(coord)]
    }

    /// Mutable agent at `coord`.
    ///
    /// # Panics
    /// If `coord` lies outside the lattice.
    pub fn at_mut(&mut self, coord: Coord) -> &mut A {
        let idx = self.index(coord);
        &mut self.cells[idx]
    }

    /// Replace the agent at `coord`.
    pub fn set(&mut self, coord: Coord, agent: A) {
        *self.at_mut(coord) = agent;
    }

    /// Exchange the agents at `a` and `b`.
    pub fn swap(&mut self, a: Coord, b: Coord) {
        let (i_a, i_b) = (self.index(a), self.index(b));
        self.cells.swap(i_a, i_b);
    }

    /// Mutable access to two distinct cells at once; `None` if `a == b`.
    pub fn pair_mut(&mut self, a: Coord, b: Coord) -> Option<(&mut A, &mut A)> {
        let (i_a, i_b) = (self.index(a), self.index(b));
        if i_a == i_b {
            return None;
        }
        let (low, high) = (i_a.min(i_b), i_a.max(i_b));
        let (head, tail) = self.cells.split_at_mut(high);
        let (low, high) = (&mut head[low], &mut tail[0]);
        Some(if i_a < i_b { (low, high) } else { (high, low) })
    }

    /// Agents paired with their coordinates, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &A)> {
        self.coords().zip(self.cells.iter())
    }

    /// Apply `f` to every cell, producing nested rows.
    pub fn rows<B, F>(&self, mut f: F) -> Vec<Vec<B>>
    where
        F: FnMut(Coord, &A) -> B,
    {
        self.cells
            .chunks(self.length)
            .enumerate()
            .map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(col, agent)| f((row, col), agent))
                    .collect()
            })
            .collect()
    }

    /// Apply `f` to every cell, producing a flat row-major vector.
    pub fn flatten<B, F>(&self, mut f: F) -> Vec<B>
    where
        F: FnMut(Coord, &A) -> B,
    {
        self.iter().map(|(coord, agent)| f(coord, agent)).collect()
    }

    fn index(&self, coord: Coord) -> usize {
        let (row, col) = coord;
        assert!(
            row < self.length && col < self.length,
            "coordinate {coord:?} outside lattice of length {}",
            self.length
        );
        row * self.length + col
    }
}

impl<A: LatticeAgent> Lattice<A> {
    /// Type tags as nested rows.
    pub fn types(&self) -> Vec<Vec<usize>> {
        self.rows(|_, agent| agent.agent_type())
    }

    /// Number of agents carrying `agent_type`.
    pub fn count_type(&self, agent_type: usize) -> usize {
        self.cells.iter().filter(|a| a.is_type(agent_type)).count()
    }

    /// Count the neighbors of `coord` whose type equals `agent_type`
    /// (the cell's own type if `None`), plus one if `count_myself`.
    pub fn similar_neighbors_amount(
        &self,
        neighborhood: &Neighborhood,
        coord: Coord,
        agent_type: Option<usize>,
        count_myself: bool,
    ) -> usize {
        let target = agent_type.unwrap_or_else(|| self.at(coord).agent_type());
        let similar = neighborhood
            .indexes_for(coord)
            .filter(|&nb| self.at(nb).is_type(target))
            .count();
        if count_myself { similar + 1 } else { similar }
    }

    /// Sizes of the connected components formed by cells of `agent_type`,
    /// largest first. Connectivity follows `neighborhood`.
    pub fn cluster_sizes(&self, neighborhood: &Neighborhood, agent_type: usize) -> Vec<usize> {
        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        let mut sizes = Vec::new();

        for start in self.coords() {
            let i_start = self.index(start);
            if visited[i_start] || !self.at(start).is_type(agent_type) {
                continue;
            }
            visited[i_start] = true;
            queue.push_back(start);

            let mut size = 0;
            while let Some(coord) = queue.pop_front() {
                size += 1;
                for nb in neighborhood.indexes_for(coord) {
                    let i_nb = self.index(nb);
                    if !visited[i_nb] && self.at(nb).is_type(agent_type) {
                        visited[i_nb] = true;
                        queue.push_back(nb);
                    }
                }
            }
            sizes.push(size);
        }

        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

impl Lattice<Agent> {
    /// Wrap a raw type matrix into base agents.
    pub fn from_types(types: &[Vec<usize>]) -> Result<Self> {
        let rows = types
            .iter()
            .map(|row| row.iter().copied().map(Agent::new).collect())
            .collect();
        Self::from_rows(rows)
    }
}

/// Row-major coordinates of a `length x length` lattice.
pub fn coords(length: usize) -> impl Iterator<Item = Coord> {
    (0..length).flat_map(move |row| (0..length).map(move |col| (row, col)))
}

/// Type matrix with every cell drawn uniformly from `0..agent_types`.
pub fn random_types<R: Rng>(
    length: usize,
    agent_types: usize,
    rng: &mut R,
) -> Result<Vec<Vec<usize>>> {
    let type_dist = Uniform::new(0, agent_types)
        .map_err(|e| Error::Configuration(format!("invalid number of agent types: {e}")))?;
    let types = (0..length)
        .map(|_| (0..length).map(|_| type_dist.sample(rng)).collect())
        .collect();
    Ok(types)
}

/// Type matrix with each cell set to 1 with the given probability, 0 otherwise.
pub fn types_with_probability<R: Rng>(
    length: usize,
    probability: f64,
    rng: &mut R,
) -> Result<Vec<Vec<usize>>> {
    let dist = Bernoulli::new(probability)
        .map_err(|e| Error::Configuration(format!("invalid probability {probability}: {e}")))?;
    let types = (0..length)
        .map(|_| (0..length).map(|_| usize::from(dist.sample(rng))).collect())
        .collect();
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighborhood::{Boundary, NeighborhoodKind};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn lattice(types: &[&[usize]]) -> Lattice<Agent> {
        let types: Vec<Vec<usize>> = types.iter().map(|row| row.to_vec()).collect();
        Lattice::from_types(&types).unwrap()
    }

    #[test]
    fn rows_and_flatten_are_row_major() {
        let lat = lattice(&[&[0, 1], &[2, 3]]);
        assert_eq!(lat.types(), vec![vec![0, 1], vec![2, 3]]);
        assert_eq!(lat.flatten(|_, a| a.agent_type()), vec![0, 1, 2, 3]);
        assert_eq!(lat.coords().collect::<Vec<_>>(), vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn from_rows_rejects_bad_shapes() {
        assert!(Lattice::<Agent>::from_rows(vec![]).is_err());
        let err = Lattice::from_types(&[vec![0, 1], vec![0]]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn get_is_bounds_checked() {
        let lat = lattice(&[&[0, 1], &[1, 0]]);
        assert_eq!(lat.get((1, 0)), Some(&Agent::new(1)));
        assert_eq!(lat.get((2, 0)), None);
    }

    #[test]
    fn swap_exchanges_agents() {
        let mut lat = lattice(&[&[0, 1], &[2, 3]]);
        lat.swap((0, 0), (1, 1));
        assert_eq!(lat.types(), vec![vec![3, 1], vec![2, 0]]);
    }

    #[test]
    fn pair_mut_keeps_argument_order() {
        let mut lat = lattice(&[&[0, 1], &[2, 3]]);
        let (a, b) = lat.pair_mut((1, 1), (0, 1)).unwrap();
        assert_eq!((a.agent_type(), b.agent_type()), (3, 1));
        a.set_agent_type(5);
        assert_eq!(lat.types(), vec![vec![0, 1], vec![2, 5]]);
        assert!(lat.pair_mut((0, 0), (0, 0)).is_none());
    }

    #[test]
    fn similar_neighbors() {
        let lat = lattice(&[&[1, 1, 0], &[0, 1, 0], &[0, 1, 1]]);
        let nbh = Neighborhood::von_neumann(3).unwrap();
        // (1,1): N=1, W=0, E=0, S=1
        assert_eq!(lat.similar_neighbors_amount(&nbh, (1, 1), None, false), 2);
        assert_eq!(lat.similar_neighbors_amount(&nbh, (1, 1), None, true), 3);
        assert_eq!(lat.similar_neighbors_amount(&nbh, (1, 1), Some(0), false), 2);
        // (0,0) wraps to N=(2,0), W=(0,2); an explicit type 0 is not the cell's own.
        assert_eq!(lat.similar_neighbors_amount(&nbh, (0, 0), None, false), 1);
        assert_eq!(lat.similar_neighbors_amount(&nbh, (0, 0), Some(0), false), 3);
    }

    #[test]
    fn clusters_follow_neighborhood() {
        let lat = lattice(&[
            &[1, 1, 0, 0],
            &[0, 1, 0, 0],
            &[0, 0, 0, 1],
            &[0, 0, 0, 0],
        ]);
        let clip = Neighborhood::new(NeighborhoodKind::VonNeumann, Boundary::Clip, 4).unwrap();
        assert_eq!(lat.cluster_sizes(&clip, 1), vec![3, 1]);
        let moore = Neighborhood::new(NeighborhoodKind::Moore, Boundary::Clip, 4).unwrap();
        assert_eq!(lat.cluster_sizes(&moore, 1), vec![3, 1]);
        // Wrapping adds no bridge between the two groups.
        let wrap = Neighborhood::moore(4).unwrap();
        assert_eq!(lat.cluster_sizes(&wrap, 1), vec![3, 1]);
        assert_eq!(lat.cluster_sizes(&wrap, 0), vec![12]);
    }

    #[test]
    fn random_types_stay_in_range() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let types = random_types(12, 3, &mut rng).unwrap();
        assert_eq!(types.len(), 12);
        assert!(types.iter().all(|row| row.len() == 12 && row.iter().all(|&t| t < 3)));
        assert!(random_types(4, 0, &mut rng).is_err());
    }

    #[test]
    fn probability_extremes() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let all = types_with_probability(5, 1.0, &mut rng).unwrap();
        assert!(all.iter().flatten().all(|&t| t == 1));
        let none = types_with_probability(5, 0.0, &mut rng).unwrap();
        assert!(none.iter().flatten().all(|&t| t == 0));
        assert!(types_with_probability(5, 1.5, &mut rng).is_err());
    }

    proptest! {
        #[test]
        fn neighbor_count_is_bounded(seed in any::<u64>(), length in 1usize..12, moore in any::<bool>()) {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let lat = Lattice::from_types(&random_types(length, 2, &mut rng).unwrap()).unwrap();
            let nbh = if moore {
                Neighborhood::moore(length).unwrap()
            } else {
                Neighborhood::von_neumann(length).unwrap()
            };
            for coord in lat.coords() {
                let without = lat.similar_neighbors_amount(&nbh, coord, None, false);
                let with = lat.similar_neighbors_amount(&nbh, coord, None, true);
                prop_assert!(with <= nbh.size() + 1);
                prop_assert_eq!(with, without + 1);
            }
        }
    }
}
