//! Percolation-like condensation on a two-state lattice.

use crate::agent::{Agent, LatticeAgent};
use crate::engine::{Rule, Setup, Sweep, TypeGenerator, Update};
use crate::error::{Error, Result};
use crate::lattice::{Coord, types_with_probability};
use crate::series::{Observation, Sample, SeriesDescriptor, agent_types_lattice};
use rand_chacha::ChaCha12Rng;
use serde::Deserialize;

pub const EVAPORATED: usize = 0;
pub const CONDENSED: usize = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CondensationParams {
    /// Probability that a cell starts condensed.
    pub probability: f64,
    /// Condensed count (self included) at which a cell condenses.
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

fn default_threshold() -> usize {
    4
}

/// A cell condenses when its condensed neighbors plus itself reach the
/// threshold, and evaporates when they fall below it. All cells update
/// together.
#[derive(Debug, Clone)]
pub struct Condensation {
    probability: f64,
    threshold: usize,
}

impl Condensation {
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Rule for Condensation {
    const NAME: &'static str = "Condensation";
    type Agent = Agent;
    type Params = CondensationParams;

    fn new(params: CondensationParams, setup: &Setup) -> Result<Self> {
        if !(0.0..=1.0).contains(&params.probability) {
            return Err(Error::Configuration(format!(
                "probability must be in the range 0.0..=1.0, but is {}",
                params.probability
            )));
        }
        let max_threshold = setup.neighborhood().size() + 1;
        if params.threshold == 0 || params.threshold > max_threshold {
            return Err(Error::Configuration(format!(
                "threshold must be in the range 1..={max_threshold}, but is {}",
                params.threshold
            )));
        }
        Ok(Self {
            probability: params.probability,
            threshold: params.threshold,
        })
    }

    fn update(&self) -> Update {
        Update::Simultaneous
    }

    fn initial_types(&self) -> Option<TypeGenerator<Self>> {
        Some(condensed_at_random)
    }

    fn step(&mut self, coord: Coord, sweep: &mut Sweep<'_, Agent>) -> Result<()> {
        let agent_type = sweep.agent(coord).agent_type();
        let condensed = sweep.similar_neighbors_amount(coord, Some(CONDENSED), false)
            + usize::from(agent_type == CONDENSED);

        match agent_type {
            EVAPORATED if condensed >= self.threshold => {
                sweep.agent_mut(coord).set_agent_type(CONDENSED);
            }
            CONDENSED if condensed < self.threshold => {
                sweep.agent_mut(coord).set_agent_type(EVAPORATED);
            }
            EVAPORATED | CONDENSED => {}
            _ => return Err(Error::UnknownAgentType { agent_type, coord }),
        }
        Ok(())
    }

    fn series() -> Vec<SeriesDescriptor<Self>> {
        vec![
            SeriesDescriptor::new("agent_types_lattice", agent_types_lattice::<Self>),
            SeriesDescriptor::scalar("condensed_fraction", condensed_fraction).equilibrium_target(),
            SeriesDescriptor::scalar("maximum_cluster_size", maximum_cluster_size),
        ]
    }
}

fn condensed_at_random(
    rule: &Condensation,
    setup: &Setup,
    rng: &mut ChaCha12Rng,
) -> Result<Vec<Vec<usize>>> {
    types_with_probability(setup.length(), rule.probability, rng)
}

fn condensed_fraction(_: &Condensation, obs: &Observation<'_, Agent>) -> Result<Sample> {
    let lattice = obs.lattice();
    Ok(Sample::Scalar(
        lattice.count_type(CONDENSED) as f64 / lattice.len() as f64,
    ))
}

/// Size of the largest connected group of condensed cells; isolated cells
/// do not count as a cluster.
fn maximum_cluster_size(_: &Condensation, obs: &Observation<'_, Agent>) -> Result<Sample> {
    let sizes = obs.lattice().cluster_sizes(obs.neighborhood(), CONDENSED);
    let largest = sizes.first().copied().filter(|&size| size > 1).unwrap_or(0);
    Ok(Sample::Scalar(largest as f64))
}
