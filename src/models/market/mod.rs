//! Consumers and producers trading on a lattice.
//!
//! Every step each consumer buys one unit from the cheapest neighboring
//! producer, then each producer checks its books against its profit
//! expectation. Prices seen by consumers are those from before the step.

mod consumer;
mod producer;

pub use consumer::{Consumer, cheapest};
pub use producer::{ProfitExpectation, Producer};

use crate::agent::{Agent, LatticeAgent};
use crate::engine::{AgentFactory, Rule, Setup, Sweep, SweepOrder, TypeGenerator, Update};
use crate::error::{Error, Result};
use crate::lattice::{Coord, Lattice, types_with_probability};
use crate::series::{Observation, Sample, SeriesDescriptor, agent_types_lattice};
use rand_chacha::ChaCha12Rng;
use serde::Deserialize;

/// Units bought by a consumer per step.
const UNITS_PER_PURCHASE: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum MarketAgent {
    Consumer(Consumer),
    Producer(Producer),
    /// A base agent the market never assigned a role.
    Unassigned(Agent),
}

impl MarketAgent {
    pub fn price(&self) -> Option<f64> {
        match self {
            Self::Consumer(consumer) => Some(consumer.price()),
            Self::Producer(producer) => Some(producer.price()),
            Self::Unassigned(_) => None,
        }
    }
}

impl LatticeAgent for MarketAgent {
    fn agent_type(&self) -> usize {
        match self {
            Self::Consumer(_) => Consumer::TYPE,
            Self::Producer(_) => Producer::TYPE,
            Self::Unassigned(agent) => agent.agent_type(),
        }
    }
}

impl From<Agent> for MarketAgent {
    fn from(agent: Agent) -> Self {
        Self::Unassigned(agent)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketParams {
    pub capital: f64,
    pub stock: u32,
    pub price: f64,
    pub earn: f64,
    pub within_days: u32,
    pub delta_price: f64,
    pub min_earnings: f64,
    /// Probability that a cell starts as a producer.
    pub producer_probability: f64,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            capital: 1_000_000.0,
            stock: 5000,
            price: 100.0,
            earn: 0.1,
            within_days: 10,
            delta_price: 0.015,
            min_earnings: ProfitExpectation::DEFAULT_MIN_EARNINGS,
            producer_probability: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Market {
    params: MarketParams,
}

impl Market {
    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    fn new_producer(&self) -> Producer {
        let p = &self.params;
        Producer::new(
            p.capital,
            p.stock,
            p.price,
            ProfitExpectation::with_min_earnings(
                p.capital,
                p.earn,
                p.within_days,
                p.delta_price,
                p.min_earnings,
            ),
        )
    }

    fn serve(&self, coord: Coord, sweep: &mut Sweep<'_, MarketAgent>) -> Result<()> {
        let offers: Vec<(Coord, f64)> = sweep
            .neighbors(coord)
            .filter_map(|nb| match sweep.agent(nb) {
                MarketAgent::Producer(producer) => Some((nb, producer.price())),
                _ => None,
            })
            .collect();
        let Some(idx) = cheapest(offers.iter().map(|&(_, price)| price)) else {
            return Ok(());
        };

        let (seller, _) = offers[idx];
        if let Some((MarketAgent::Consumer(consumer), MarketAgent::Producer(producer))) =
            sweep.pair_mut(coord, seller)
        {
            consumer.buy(producer, UNITS_PER_PURCHASE)?;
        }
        Ok(())
    }
}

impl Rule for Market {
    const NAME: &'static str = "Market";
    type Agent = MarketAgent;
    type Params = MarketParams;

    fn new(params: MarketParams, setup: &Setup) -> Result<Self> {
        if setup.agent_types() != 2 {
            return Err(Error::Configuration(format!(
                "the market has exactly 2 agent types, but {} were requested",
                setup.agent_types()
            )));
        }
        if !(0.0..=1.0).contains(&params.producer_probability) {
            return Err(Error::Configuration(format!(
                "producer probability must be in the range 0.0..=1.0, but is {}",
                params.producer_probability
            )));
        }
        Ok(Self { params })
    }

    fn update(&self) -> Update {
        Update::Simultaneous
    }

    fn sweep_order(&self) -> SweepOrder {
        SweepOrder::ByAgentType
    }

    fn initial_types(&self) -> Option<TypeGenerator<Self>> {
        Some(producers_at_random)
    }

    fn agent_factory(&self) -> Option<AgentFactory<Self>> {
        Some(create_agent)
    }

    fn step(&mut self, coord: Coord, sweep: &mut Sweep<'_, MarketAgent>) -> Result<()> {
        match sweep.agent(coord) {
            MarketAgent::Consumer(_) => self.serve(coord, sweep),
            MarketAgent::Producer(_) => {
                if let MarketAgent::Producer(producer) = sweep.agent_mut(coord) {
                    producer.balance_check();
                }
                Ok(())
            }
            MarketAgent::Unassigned(agent) => Err(Error::UnknownAgentType {
                agent_type: agent.agent_type(),
                coord,
            }),
        }
    }

    fn series() -> Vec<SeriesDescriptor<Self>> {
        vec![
            SeriesDescriptor::new("agent_types_lattice", agent_types_lattice::<Self>),
            SeriesDescriptor::new("price_lattice", price_lattice),
            SeriesDescriptor::scalar("average_price", average_price)
                .equilibrium_target()
                .with_dependencies(&["price_lattice"]),
            SeriesDescriptor::scalar("average_consumer_price", average_consumer_price),
            SeriesDescriptor::scalar("average_producer_price", average_producer_price),
        ]
    }
}

fn producers_at_random(
    market: &Market,
    setup: &Setup,
    rng: &mut ChaCha12Rng,
) -> Result<Vec<Vec<usize>>> {
    types_with_probability(setup.length(), market.params.producer_probability, rng)
}

fn create_agent(
    market: &Market,
    _setup: &Setup,
    base: &Lattice<Agent>,
    coord: Coord,
) -> Result<MarketAgent> {
    match base.at(coord).agent_type() {
        Consumer::TYPE => Ok(MarketAgent::Consumer(Consumer::new())),
        Producer::TYPE => Ok(MarketAgent::Producer(market.new_producer())),
        agent_type => Err(Error::UnknownAgentType { agent_type, coord }),
    }
}

fn price_lattice(_: &Market, obs: &Observation<'_, MarketAgent>) -> Result<Sample> {
    let prices = obs
        .lattice()
        .rows(|_, agent| agent.price().unwrap_or_default());
    Ok(Sample::Continuous(prices))
}

fn average_price(_: &Market, obs: &Observation<'_, MarketAgent>) -> Result<Sample> {
    let prices = obs.captured("price_lattice")?;
    Ok(Sample::Scalar(prices.mean()))
}

/// Mean price over agents of one type; 0 when there are none.
fn average_price_of(obs: &Observation<'_, MarketAgent>, agent_type: usize) -> Sample {
    let (sum, n) = obs
        .lattice()
        .iter()
        .filter(|(_, agent)| agent.is_type(agent_type))
        .filter_map(|(_, agent)| agent.price())
        .fold((0.0, 0usize), |(sum, n), price| (sum + price, n + 1));
    Sample::Scalar(if n == 0 { 0.0 } else { sum / n as f64 })
}

fn average_consumer_price(_: &Market, obs: &Observation<'_, MarketAgent>) -> Result<Sample> {
    Ok(average_price_of(obs, Consumer::TYPE))
}

fn average_producer_price(_: &Market, obs: &Observation<'_, MarketAgent>) -> Result<Sample> {
    Ok(average_price_of(obs, Producer::TYPE))
}
