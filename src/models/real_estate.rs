//! Households trading homes whose price follows the neighborhood.
//!
//! The price of a home rises with the number of like neighbors:
//! `price_slope * (similar - distinct) + base_price`, where `similar` counts
//! the household itself and `distinct` covers the rest of the neighborhood.
//! A household's utility is `capital^alpha * price^(1 - alpha)`.

use crate::agent::{Agent, LatticeAgent};
use crate::engine::{AgentFactory, Rule, Setup, Sweep};
use crate::error::{Error, Result};
use crate::lattice::{Coord, Lattice};
use crate::neighborhood::Neighborhood;
use crate::series::{Observation, Sample, SeriesDescriptor, agent_types_lattice};
use serde::Deserialize;

/// Capital every household starts with unless configured otherwise.
pub const INITIAL_CAPITAL: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Household {
    agent_type: usize,
    capital: f64,
    utility: f64,
}

impl Household {
    pub fn new(agent_type: usize, capital: f64, utility: f64) -> Self {
        Self {
            agent_type,
            capital,
            utility,
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    /// Utility from the last time the household was evaluated.
    pub fn utility(&self) -> f64 {
        self.utility
    }
}

impl LatticeAgent for Household {
    fn agent_type(&self) -> usize {
        self.agent_type
    }
}

impl From<Agent> for Household {
    fn from(agent: Agent) -> Self {
        Self::new(agent.agent_type(), INITIAL_CAPITAL, 0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealEstateParams {
    /// Weight of capital against home price in the utility.
    pub alpha: f64,
    pub price_slope: f64,
    pub base_price: f64,
    /// Utility below which a household counts as dissatisfied.
    pub utility_tolerance: f64,
    pub initial_capital: f64,
}

impl Default for RealEstateParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            price_slope: 1.0 / 16.0,
            base_price: 0.5,
            utility_tolerance: 0.85,
            initial_capital: INITIAL_CAPITAL,
        }
    }
}

/// Each cell visit picks two random households of different type. Each one
/// values the other's home at the price it would have once moved in, and
/// the trade settles at the average of both valuations. Homes change hands
/// only if both households can cover their share and both end up with
/// strictly more utility than they hold now.
#[derive(Debug, Clone)]
pub struct RealEstate {
    params: RealEstateParams,
}

impl RealEstate {
    pub fn params(&self) -> &RealEstateParams {
        &self.params
    }

    pub fn utility(&self, capital: f64, price: f64) -> f64 {
        capital.powf(self.params.alpha) * price.powf(1.0 - self.params.alpha)
    }

    /// Price of a home given the like neighbors of its owner, the owner
    /// included.
    fn property_price(&self, neighborhood: &Neighborhood, similar: usize) -> f64 {
        let distinct = (neighborhood.size() + 1).saturating_sub(similar);
        self.params.price_slope * (similar as f64 - distinct as f64) + self.params.base_price
    }

    /// Price of the home at `coord` for the agent living there.
    pub fn price_at<A: LatticeAgent>(
        &self,
        lattice: &Lattice<A>,
        neighborhood: &Neighborhood,
        coord: Coord,
    ) -> f64 {
        let similar = lattice.similar_neighbors_amount(neighborhood, coord, None, true);
        self.property_price(neighborhood, similar)
    }

    /// Price the home at `coord` would have for a household of
    /// `agent_type` moving in, with the current neighbors staying put.
    pub fn target_price<A: LatticeAgent>(
        &self,
        lattice: &Lattice<A>,
        neighborhood: &Neighborhood,
        coord: Coord,
        agent_type: usize,
    ) -> f64 {
        let similar = lattice.similar_neighbors_amount(neighborhood, coord, Some(agent_type), true);
        self.property_price(neighborhood, similar)
    }

    fn utility_at(
        &self,
        lattice: &Lattice<Household>,
        neighborhood: &Neighborhood,
        coord: Coord,
    ) -> f64 {
        let price = self.price_at(lattice, neighborhood, coord);
        self.utility(lattice.at(coord).capital, price)
    }

    /// Capital and utility of `household` after trading into a home it
    /// values at `own_target` for one the counterpart values at
    /// `other_target`. The sale closes at the average of both valuations.
    ///
    /// Returns `None` if the household cannot cover its share or would not
    /// gain utility over the one it holds.
    pub fn settle(
        &self,
        household: &Household,
        own_target: f64,
        other_target: f64,
    ) -> Option<(f64, f64)> {
        let average = (own_target + other_target) / 2.0;
        if own_target - average - household.capital >= 0.0 {
            return None;
        }
        let capital = household.capital + other_target - average;
        let utility = self.utility(capital, own_target);
        (utility > household.utility).then_some((capital, utility))
    }
}

impl Rule for RealEstate {
    const NAME: &'static str = "RealEstate";
    type Agent = Household;
    type Params = RealEstateParams;

    fn new(params: RealEstateParams, setup: &Setup) -> Result<Self> {
        if !(0.0..=1.0).contains(&params.alpha) {
            return Err(Error::Configuration(format!(
                "alpha must be in the range 0.0..=1.0, but is {}",
                params.alpha
            )));
        }
        if params.price_slope.is_nan() || params.price_slope < 0.0 {
            return Err(Error::Configuration(format!(
                "price slope must not be negative, but is {}",
                params.price_slope
            )));
        }
        let size = setup.neighborhood().size() as f64;
        let cheapest = params.base_price - params.price_slope * size;
        if cheapest.is_nan() || cheapest <= 0.0 {
            return Err(Error::Configuration(format!(
                "base price {} is too low: a home among {size} distinct neighbors would cost {cheapest}",
                params.base_price
            )));
        }
        if params.initial_capital.is_nan() || params.initial_capital < 0.0 {
            return Err(Error::Configuration(format!(
                "initial capital must not be negative, but is {}",
                params.initial_capital
            )));
        }
        Ok(Self { params })
    }

    fn agent_factory(&self) -> Option<AgentFactory<Self>> {
        Some(create_household)
    }

    fn step(&mut self, _coord: Coord, sweep: &mut Sweep<'_, Household>) -> Result<()> {
        let first = sweep.random_coord();
        let second = sweep.random_coord();
        if sweep.agent(first).same_type(sweep.agent(second)) {
            return Ok(());
        }

        let (lattice, neighborhood) = (sweep.current(), sweep.neighborhood());
        let (buyer, seller) = (lattice.at(first), lattice.at(second));
        let first_target = self.target_price(lattice, neighborhood, second, buyer.agent_type);
        let second_target = self.target_price(lattice, neighborhood, first, seller.agent_type);

        let (Some(moved_first), Some(moved_second)) = (
            self.settle(buyer, first_target, second_target),
            self.settle(seller, second_target, first_target),
        ) else {
            return Ok(());
        };

        sweep.swap(first, second);
        // The household from `first` now lives at `second`.
        for (coord, (capital, utility)) in [(second, moved_first), (first, moved_second)] {
            let household = sweep.agent_mut(coord);
            household.capital = capital;
            household.utility = utility;
        }
        Ok(())
    }

    fn series() -> Vec<SeriesDescriptor<Self>> {
        vec![
            SeriesDescriptor::new("agent_types_lattice", agent_types_lattice::<Self>),
            SeriesDescriptor::new("utility_level_lattice", utility_level_lattice),
            SeriesDescriptor::new("capital_level_lattice", capital_level_lattice),
            SeriesDescriptor::new("dissatisfaction_lattice", dissatisfaction_lattice),
            SeriesDescriptor::scalar("total_average_utility_level", total_average_utility_level)
                .equilibrium_target()
                .with_dependencies(&["utility_level_lattice"]),
            SeriesDescriptor::scalar("total_average_capital_level", total_average_capital_level)
                .with_dependencies(&["capital_level_lattice"]),
        ]
    }
}

fn create_household(
    rule: &RealEstate,
    setup: &Setup,
    base: &Lattice<Agent>,
    coord: Coord,
) -> Result<Household> {
    let capital = rule.params.initial_capital;
    let price = rule.price_at(base, setup.neighborhood(), coord);
    Ok(Household::new(
        base.at(coord).agent_type(),
        capital,
        rule.utility(capital, price),
    ))
}

fn utility_level_lattice(rule: &RealEstate, obs: &Observation<'_, Household>) -> Result<Sample> {
    let levels = obs
        .lattice()
        .rows(|coord, _| rule.utility_at(obs.lattice(), obs.neighborhood(), coord));
    Ok(Sample::Continuous(levels))
}

fn capital_level_lattice(_: &RealEstate, obs: &Observation<'_, Household>) -> Result<Sample> {
    Ok(Sample::Continuous(
        obs.lattice().rows(|_, household| household.capital),
    ))
}

/// 1 where utility is below the tolerance, 0 elsewhere.
fn dissatisfaction_lattice(rule: &RealEstate, obs: &Observation<'_, Household>) -> Result<Sample> {
    let flags = obs.lattice().rows(|coord, _| {
        let utility = rule.utility_at(obs.lattice(), obs.neighborhood(), coord);
        usize::from(utility < rule.params.utility_tolerance)
    });
    Ok(Sample::Discrete(flags))
}

fn total_average_utility_level(_: &RealEstate, obs: &Observation<'_, Household>) -> Result<Sample> {
    Ok(Sample::Scalar(obs.captured("utility_level_lattice")?.mean()))
}

fn total_average_capital_level(_: &RealEstate, obs: &Observation<'_, Household>) -> Result<Sample> {
    Ok(Sample::Scalar(obs.captured("capital_level_lattice")?.mean()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::WithoutCriterion;
    use crate::engine::LatticeModel;
    use crate::experiment::ExperimentParameters;

    const CONFIG: [[usize; 3]; 3] = [[0, 0, 1], [0, 0, 1], [1, 1, 1]];

    fn params() -> ExperimentParameters {
        let configuration: Vec<Vec<usize>> = CONFIG.iter().map(|row| row.to_vec()).collect();
        ExperimentParameters::new()
            .with("length", 3)
            .unwrap()
            .with("configuration", configuration)
            .unwrap()
            .with("seed", 21)
            .unwrap()
    }

    fn rule() -> RealEstate {
        RealEstate {
            params: RealEstateParams::default(),
        }
    }

    #[test]
    fn price_follows_like_neighbors() {
        let mut model = LatticeModel::<RealEstate>::from_parameters(&params()).unwrap();
        model.initialize().unwrap();
        let lattice = model.lattice().unwrap();
        let rule = model.rule();
        // (0,0): like neighbors S and E plus itself, unlike N and W.
        assert_eq!(rule.price_at(lattice, model.neighborhood(), (0, 0)), 0.5625);
        // (2,2): surrounded by its own type.
        assert_eq!(rule.price_at(lattice, model.neighborhood(), (2, 2)), 0.8125);
    }

    #[test]
    fn households_start_with_their_utility() {
        let mut model = LatticeModel::<RealEstate>::from_parameters(&params()).unwrap();
        model.initialize().unwrap();
        let household = model.lattice().unwrap().at((0, 0));
        assert_eq!(household.capital(), 1.0);
        assert!((household.utility() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn target_price_uses_the_newcomer_type() {
        let mut model = LatticeModel::<RealEstate>::from_parameters(&params()).unwrap();
        model.initialize().unwrap();
        let lattice = model.lattice().unwrap();
        let nbh = model.neighborhood();
        let rule = model.rule();
        // A type-0 household moving to (2,2) would have no like neighbors.
        assert_eq!(rule.target_price(lattice, nbh, (2, 2), 0), 0.3125);
        // A type-1 household moving to (0,0) would have N and W alike.
        assert_eq!(rule.target_price(lattice, nbh, (0, 0), 1), 0.5625);
        assert_eq!(
            rule.target_price(lattice, nbh, (2, 2), 1),
            rule.price_at(lattice, nbh, (2, 2))
        );
    }

    #[test]
    fn trades_settle_at_the_average_price() {
        let rule = rule();
        let household = Household::new(0, 1.0, 0.75);
        let (capital, utility) = rule.settle(&household, 0.8125, 0.6875).unwrap();
        assert_eq!(capital, 0.9375);
        assert!((utility - (0.9375f64 * 0.8125).sqrt()).abs() < 1e-12);

        // The counterpart gets the difference back.
        let other = Household::new(1, 1.0, 0.75);
        let (capital, _) = rule.settle(&other, 0.6875, 0.8125).unwrap();
        assert_eq!(capital, 1.0625);
    }

    #[test]
    fn trades_must_be_affordable_and_better() {
        let rule = rule();
        let poor = Household::new(0, 0.1, 0.0);
        assert_eq!(rule.settle(&poor, 0.8125, 0.3125), None);

        // Gain is measured against the stored utility, not a fresh one.
        let content = Household::new(0, 1.0, 0.9);
        assert_eq!(rule.settle(&content, 0.8125, 0.6875), None);
        let stale = Household::new(0, 1.0, 0.5);
        assert!(rule.settle(&stale, 0.8125, 0.6875).is_some());
    }

    #[test]
    fn trades_conserve_capital() {
        let mut model = LatticeModel::<RealEstate>::from_parameters(&params()).unwrap();
        model.initialize().unwrap();
        let before = model.lattice().unwrap().clone();
        for _ in 0..3 {
            model.run_step().unwrap();
        }
        let after = model.lattice().unwrap();
        assert_eq!(after.count_type(0), before.count_type(0));
        let total = |lattice: &Lattice<Household>| {
            lattice.iter().map(|(_, household)| household.capital()).sum::<f64>()
        };
        assert!((total(after) - total(&before)).abs() < 1e-9);
    }

    #[test]
    fn dissatisfaction_and_averages() {
        let mut model = LatticeModel::<RealEstate>::from_parameters(&params()).unwrap();
        model.run(0, &WithoutCriterion).unwrap();
        let series = model.series();

        let flags = series.last("dissatisfaction_lattice").unwrap();
        let flags = flags.as_discrete().unwrap();
        assert_eq!(flags[0][0], 1);
        assert_eq!(flags[2][2], 0);
        assert_eq!(series.scalars("total_average_capital_level").unwrap(), vec![1.0]);
        let utility = series.scalars("total_average_utility_level").unwrap()[0];
        assert!(utility > 0.0 && utility < 1.0);
    }

    #[test]
    fn trading_keeps_types_and_solvency() {
        let params = ExperimentParameters::new()
            .with("length", 10)
            .unwrap()
            .with("seed", 8)
            .unwrap();
        let mut model = LatticeModel::<RealEstate>::from_parameters(&params).unwrap();
        model.initialize().unwrap();
        let zeros = model.lattice().unwrap().count_type(0);

        for _ in 0..5 {
            model.run_step().unwrap();
        }
        let lattice = model.lattice().unwrap();
        assert_eq!(lattice.count_type(0), zeros);
        assert!(lattice.iter().all(|(_, household)| household.capital() >= 0.0));
    }

    #[test]
    fn prices_must_stay_positive() {
        let cheap = params().with("base_price", 0.2).unwrap();
        assert!(LatticeModel::<RealEstate>::from_parameters(&cheap).is_err());
        let skewed = params().with("alpha", 1.5).unwrap();
        assert!(LatticeModel::<RealEstate>::from_parameters(&skewed).is_err());
    }
}
