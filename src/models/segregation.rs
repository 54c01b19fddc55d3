//! Schelling-style segregation by tolerance-based swapping.

use crate::agent::{Agent, LatticeAgent};
use crate::engine::{Rule, Setup, Sweep};
use crate::error::{Error, Result};
use crate::lattice::Coord;
use crate::series::{Observation, Sample, SeriesDescriptor, agent_types_lattice};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegregationParams {
    /// Minimum number of same-type neighbors an agent needs to be satisfied.
    pub tolerance: usize,
}

/// Each cell visit picks two random cells and swaps their agents if they
/// differ in type and both are satisfied at their new positions.
#[derive(Debug, Clone)]
pub struct Segregation {
    tolerance: usize,
}

impl Segregation {
    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    fn is_satisfied(&self, similar: usize) -> bool {
        similar >= self.tolerance
    }
}

impl Rule for Segregation {
    const NAME: &'static str = "Segregation";
    type Agent = Agent;
    type Params = SegregationParams;

    fn new(params: SegregationParams, setup: &Setup) -> Result<Self> {
        let size = setup.neighborhood().size();
        let tolerance = params.tolerance;
        if tolerance <= 1 || tolerance > size {
            return Err(Error::Configuration(format!(
                "tolerance must be in the range (1, {size}], but is {tolerance}"
            )));
        }
        Ok(Self { tolerance })
    }

    fn step(&mut self, _coord: Coord, sweep: &mut Sweep<'_, Agent>) -> Result<()> {
        let first = sweep.random_coord();
        let second = sweep.random_coord();
        if sweep.agent(first).same_type(sweep.agent(second)) {
            return Ok(());
        }

        sweep.swap(first, second);
        let satisfied = [first, second]
            .into_iter()
            .all(|coord| self.is_satisfied(sweep.similar_neighbors_amount(coord, None, false)));
        if !satisfied {
            sweep.swap(first, second);
        }
        Ok(())
    }

    fn series() -> Vec<SeriesDescriptor<Self>> {
        vec![
            SeriesDescriptor::new("agent_types_lattice", agent_types_lattice::<Self>),
            SeriesDescriptor::new("satisfaction_level_lattice", satisfaction_level_lattice),
            SeriesDescriptor::new("dissatisfaction_lattice", dissatisfaction_lattice),
            SeriesDescriptor::scalar(
                "total_average_satisfaction_level",
                total_average_satisfaction_level,
            )
            .equilibrium_target()
            .with_dependencies(&["satisfaction_level_lattice"]),
        ]
    }
}

/// Same-type neighbor count of every cell.
fn satisfaction_level_lattice(_: &Segregation, obs: &Observation<'_, Agent>) -> Result<Sample> {
    let levels = obs
        .lattice()
        .rows(|coord, _| obs.similar_neighbors_amount(coord, None, false));
    Ok(Sample::Discrete(levels))
}

/// 1 where the agent is below tolerance, 0 elsewhere.
fn dissatisfaction_lattice(rule: &Segregation, obs: &Observation<'_, Agent>) -> Result<Sample> {
    let flags = obs.lattice().rows(|coord, _| {
        let similar = obs.similar_neighbors_amount(coord, None, false);
        usize::from(!rule.is_satisfied(similar))
    });
    Ok(Sample::Discrete(flags))
}

fn total_average_satisfaction_level(
    _: &Segregation,
    obs: &Observation<'_, Agent>,
) -> Result<Sample> {
    let levels = obs.captured("satisfaction_level_lattice")?;
    Ok(Sample::Scalar(levels.mean()))
}
