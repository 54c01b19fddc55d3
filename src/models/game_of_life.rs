//! Conway's Game of Life.
//!
//! Without seeds the lattice starts uniformly random. With seeds it starts
//! dead and every seed pattern is stamped at its offset, wrapping around
//! the edges.

use crate::agent::{Agent, LatticeAgent};
use crate::engine::{Rule, Setup, Sweep, TypeGenerator, Update};
use crate::error::{Error, Result};
use crate::lattice::{self, Coord};
use crate::neighborhood::NeighborhoodKind;
use crate::series::{Observation, Sample, SeriesDescriptor, agent_types_lattice};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

pub const DEAD: usize = 0;
pub const ALIVE: usize = 1;

/// Shape stamped by a [`Seed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Three cells in a row; period 2.
    Blinker,
    /// Two by two square; still life.
    Block,
    /// Moves one cell down and right every 4 steps.
    Glider,
    /// Arbitrary rows of [`DEAD`] and [`ALIVE`] cells.
    Cells(Vec<Vec<usize>>),
}

impl Pattern {
    pub fn cells(&self) -> Vec<Vec<usize>> {
        match self {
            Self::Blinker => vec![vec![ALIVE; 3]],
            Self::Block => vec![vec![ALIVE; 2]; 2],
            Self::Glider => vec![
                vec![DEAD, ALIVE, DEAD],
                vec![DEAD, DEAD, ALIVE],
                vec![ALIVE, ALIVE, ALIVE],
            ],
            Self::Cells(cells) => cells.clone(),
        }
    }
}

/// A pattern placed with its top-left corner at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Seed {
    pub pattern: Pattern,
    #[serde(default)]
    pub offset: Coord,
}

impl Seed {
    pub fn new(pattern: Pattern, offset: Coord) -> Self {
        Self { pattern, offset }
    }

    fn check(&self, length: usize) -> Result<()> {
        let cells = self.pattern.cells();
        let width = cells.iter().map(Vec::len).max().unwrap_or(0);
        if cells.len() > length || width > length {
            return Err(Error::Configuration(format!(
                "seed pattern of {}x{width} cells does not fit a lattice of length {length}",
                cells.len()
            )));
        }
        if let Some(cell) = cells.iter().flatten().find(|&&cell| cell > ALIVE) {
            return Err(Error::Configuration(format!(
                "seed cells must be {DEAD} or {ALIVE}, but one is {cell}"
            )));
        }
        Ok(())
    }

    /// Mark the live cells of the pattern on `types`.
    fn stamp(&self, types: &mut [Vec<usize>]) {
        let length = types.len();
        let (row0, col0) = self.offset;
        for (row, cells) in self.pattern.cells().iter().enumerate() {
            for (col, _) in cells.iter().enumerate().filter(|&(_, &cell)| cell == ALIVE) {
                types[(row0 + row) % length][(col0 + col) % length] = ALIVE;
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameOfLifeParams {
    pub seeds: Vec<Seed>,
}

/// Live cells survive with 2 or 3 live neighbors; dead cells come alive
/// with exactly 3.
#[derive(Debug, Clone)]
pub struct GameOfLife {
    seeds: Vec<Seed>,
}

impl GameOfLife {
    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }
}

impl Rule for GameOfLife {
    const NAME: &'static str = "GameOfLife";
    type Agent = Agent;
    type Params = GameOfLifeParams;

    fn new(params: GameOfLifeParams, setup: &Setup) -> Result<Self> {
        if setup.neighborhood().kind() != NeighborhoodKind::Moore {
            return Err(Error::Configuration(
                "the game of life needs a moore neighborhood".into(),
            ));
        }
        for seed in &params.seeds {
            seed.check(setup.length())?;
        }
        Ok(Self {
            seeds: params.seeds,
        })
    }

    fn update(&self) -> Update {
        Update::Simultaneous
    }

    fn initial_types(&self) -> Option<TypeGenerator<Self>> {
        Some(seeded_or_random)
    }

    fn step(&mut self, coord: Coord, sweep: &mut Sweep<'_, Agent>) -> Result<()> {
        let agent_type = sweep.agent(coord).agent_type();
        let alive = sweep.similar_neighbors_amount(coord, Some(ALIVE), false);
        let next = match agent_type {
            ALIVE if alive == 2 || alive == 3 => ALIVE,
            DEAD if alive == 3 => ALIVE,
            ALIVE | DEAD => DEAD,
            _ => return Err(Error::UnknownAgentType { agent_type, coord }),
        };
        sweep.agent_mut(coord).set_agent_type(next);
        Ok(())
    }

    fn series() -> Vec<SeriesDescriptor<Self>> {
        vec![
            SeriesDescriptor::new("agent_types_lattice", agent_types_lattice::<Self>),
            SeriesDescriptor::scalar("alive_fraction", alive_fraction).equilibrium_target(),
        ]
    }
}

fn seeded_or_random(
    rule: &GameOfLife,
    setup: &Setup,
    rng: &mut ChaCha12Rng,
) -> Result<Vec<Vec<usize>>> {
    let length = setup.length();
    if rule.seeds.is_empty() {
        return lattice::random_types(length, setup.agent_types(), rng);
    }
    let mut types = vec![vec![DEAD; length]; length];
    for seed in &rule.seeds {
        seed.stamp(&mut types);
    }
    Ok(types)
}

fn alive_fraction(_: &GameOfLife, obs: &Observation<'_, Agent>) -> Result<Sample> {
    let lattice = obs.lattice();
    Ok(Sample::Scalar(
        lattice.count_type(ALIVE) as f64 / lattice.len() as f64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LatticeModel;
    use crate::experiment::ExperimentParameters;

    fn model(configuration: Vec<Vec<usize>>) -> LatticeModel<GameOfLife> {
        let params = ExperimentParameters::new()
            .with("length", configuration.len())
            .unwrap()
            .with("configuration", configuration)
            .unwrap()
            .with("neighborhood", "moore")
            .unwrap()
            .with("seed", 0)
            .unwrap();
        let mut model = LatticeModel::from_parameters(&params).unwrap();
        model.initialize().unwrap();
        model
    }

    #[test]
    fn blinker_oscillates() {
        let horizontal = vec![
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0],
            vec![0, 1, 1, 1, 0],
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0],
        ];
        let vertical = vec![
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 1, 0, 0],
            vec![0, 0, 1, 0, 0],
            vec![0, 0, 1, 0, 0],
            vec![0, 0, 0, 0, 0],
        ];
        let mut model = model(horizontal.clone());
        model.run_step().unwrap();
        assert_eq!(model.lattice().unwrap().types(), vertical);
        model.run_step().unwrap();
        assert_eq!(model.lattice().unwrap().types(), horizontal);
    }

    #[test]
    fn block_is_still() {
        let block = vec![
            vec![0, 0, 0, 0],
            vec![0, 1, 1, 0],
            vec![0, 1, 1, 0],
            vec![0, 0, 0, 0],
        ];
        let mut model = model(block.clone());
        model.run_step().unwrap();
        assert_eq!(model.lattice().unwrap().types(), block);
    }

    fn seeded(length: usize, seeds: Vec<Seed>) -> LatticeModel<GameOfLife> {
        let params = ExperimentParameters::new()
            .with("length", length)
            .unwrap()
            .with("neighborhood", "moore")
            .unwrap()
            .with("seeds", seeds)
            .unwrap();
        let mut model = LatticeModel::from_parameters(&params).unwrap();
        model.initialize().unwrap();
        model
    }

    #[test]
    fn seeds_are_stamped_on_a_dead_lattice() {
        let model = seeded(
            5,
            vec![
                Seed::new(Pattern::Blinker, (2, 1)),
                Seed::new(Pattern::Cells(vec![vec![1]]), (0, 0)),
            ],
        );
        assert_eq!(
            model.lattice().unwrap().types(),
            vec![
                vec![1, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 0],
                vec![0, 1, 1, 1, 0],
                vec![0, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 0],
            ]
        );
    }

    #[test]
    fn seeds_wrap_around_the_edges() {
        let model = seeded(4, vec![Seed::new(Pattern::Block, (3, 3))]);
        assert_eq!(
            model.lattice().unwrap().types(),
            vec![
                vec![1, 0, 0, 1],
                vec![0, 0, 0, 0],
                vec![0, 0, 0, 0],
                vec![1, 0, 0, 1],
            ]
        );
    }

    #[test]
    fn glider_moves_diagonally() {
        let mut model = seeded(8, vec![Seed::new(Pattern::Glider, (1, 1))]);
        let start = model.lattice().unwrap().types();
        for _ in 0..4 {
            model.run_step().unwrap();
        }
        let moved: Vec<Vec<usize>> = (0..8)
            .map(|row| (0..8).map(|col| start[(row + 7) % 8][(col + 7) % 8]).collect())
            .collect();
        assert_eq!(model.lattice().unwrap().types(), moved);
    }

    #[test]
    fn unseeded_lattices_start_random() {
        let params = ExperimentParameters::new()
            .with("length", 12)
            .unwrap()
            .with("neighborhood", "moore")
            .unwrap()
            .with("seed", 3)
            .unwrap();
        let mut model = LatticeModel::<GameOfLife>::from_parameters(&params).unwrap();
        model.initialize().unwrap();
        let alive = model.lattice().unwrap().count_type(ALIVE);
        assert!(alive > 0 && alive < 144);
    }

    #[test]
    fn bad_seeds_are_rejected() {
        let params = |seeds: Vec<Seed>| {
            ExperimentParameters::new()
                .with("length", 2)
                .unwrap()
                .with("neighborhood", "moore")
                .unwrap()
                .with("seeds", seeds)
                .unwrap()
        };
        let too_big = params(vec![Seed::new(Pattern::Glider, (0, 0))]);
        assert!(LatticeModel::<GameOfLife>::from_parameters(&too_big).is_err());
        let not_binary = params(vec![Seed::new(Pattern::Cells(vec![vec![2]]), (0, 0))]);
        assert!(LatticeModel::<GameOfLife>::from_parameters(&not_binary).is_err());
    }

    #[test]
    fn von_neumann_is_rejected() {
        let params = ExperimentParameters::new().with("length", 4).unwrap();
        assert!(LatticeModel::<GameOfLife>::from_parameters(&params).is_err());
    }
}
