use crate::agent::{Agent, LatticeAgent};
use crate::criterion::EquilibriumCriterion;
use crate::error::{Error, Result};
use crate::experiment::ExperimentParameters;
use crate::lattice::{self, Coord, Lattice};
use crate::neighborhood::{Boundary, Neighborhood, NeighborhoodKind};
use crate::series::{Series, SeriesDescriptor, SeriesHistory, SeriesRegistry};
use log::{debug, info, trace};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;

/// How writes made during a sweep become visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Writes land in the live lattice; later cells see earlier writes.
    Sequential,
    /// Writes land in a shadow copy that replaces the lattice after the sweep.
    Simultaneous,
}

/// Order in which a sweep visits the cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOrder {
    RowMajor,
    Reverse,
    /// Grouped by type tag, ascending; row-major within each type.
    ByAgentType,
}

/// Generates the initial type matrix.
pub type TypeGenerator<R> = fn(&R, &Setup, &mut ChaCha12Rng) -> Result<Vec<Vec<usize>>>;

/// Turns the base agent at one coordinate into the model's own agent.
pub type AgentFactory<R> = fn(&R, &Setup, &Lattice<Agent>, Coord) -> Result<<R as Rule>::Agent>;

/// The per-cell transition rule and everything else a concrete model supplies.
pub trait Rule: Sized {
    /// Model name used in messages.
    const NAME: &'static str;

    type Agent: LatticeAgent + From<Agent>;

    /// Model-specific parameters, deserialized from the experiment
    /// parameters that the engine does not consume itself.
    type Params: DeserializeOwned;

    fn new(params: Self::Params, setup: &Setup) -> Result<Self>;

    fn update(&self) -> Update {
        Update::Sequential
    }

    fn sweep_order(&self) -> SweepOrder {
        SweepOrder::RowMajor
    }

    /// Custom initial lattice; uniform random types when `None`.
    fn initial_types(&self) -> Option<TypeGenerator<Self>> {
        None
    }

    /// Per-cell enrichment; base agents are converted with `From` when `None`.
    fn agent_factory(&self) -> Option<AgentFactory<Self>> {
        None
    }

    /// Apply the rule once at `coord`.
    fn step(&mut self, coord: Coord, sweep: &mut Sweep<'_, Self::Agent>) -> Result<()>;

    fn series() -> Vec<SeriesDescriptor<Self>>;
}

/// Lattice geometry shared by the engine and the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setup {
    neighborhood: Neighborhood,
    agent_types: usize,
}

impl Setup {
    pub fn new(
        length: usize,
        kind: NeighborhoodKind,
        boundary: Boundary,
        agent_types: usize,
    ) -> Result<Self> {
        if agent_types == 0 {
            return Err(Error::Configuration(
                "there must be at least one agent type".into(),
            ));
        }
        let neighborhood = Neighborhood::new(kind, boundary, length)?;
        Ok(Self {
            neighborhood,
            agent_types,
        })
    }

    pub fn length(&self) -> usize {
        self.neighborhood.length()
    }

    pub fn neighborhood(&self) -> &Neighborhood {
        &self.neighborhood
    }

    pub fn agent_types(&self) -> usize {
        self.agent_types
    }
}

/// Access to the lattice during one sweep.
///
/// Reads go to [`Sweep::current`]: the pre-sweep state for simultaneous
/// rules, the live state for sequential ones. Writes go to the shadow copy
/// when there is one.
pub struct Sweep<'a, A> {
    live: &'a mut Lattice<A>,
    shadow: Option<&'a mut Lattice<A>>,
    neighborhood: &'a Neighborhood,
    rng: &'a mut ChaCha12Rng,
}

impl<'a, A: LatticeAgent> Sweep<'a, A> {
    pub fn current(&self) -> &Lattice<A> {
        &*self.live
    }

    fn target(&mut self) -> &mut Lattice<A> {
        match self.shadow.as_deref_mut() {
            Some(shadow) => shadow,
            None => &mut *self.live,
        }
    }

    pub fn length(&self) -> usize {
        self.live.length()
    }

    pub fn neighborhood(&self) -> &'a Neighborhood {
        self.neighborhood
    }

    pub fn agent(&self, coord: Coord) -> &A {
        self.current().at(coord)
    }

    pub fn agent_mut(&mut self, coord: Coord) -> &mut A {
        self.target().at_mut(coord)
    }

    pub fn set(&mut self, coord: Coord, agent: A) {
        self.target().set(coord, agent);
    }

    pub fn swap(&mut self, a: Coord, b: Coord) {
        self.target().swap(a, b);
    }

    /// Mutable access to two distinct cells of the write target.
    pub fn pair_mut(&mut self, a: Coord, b: Coord) -> Option<(&mut A, &mut A)> {
        self.target().pair_mut(a, b)
    }

    pub fn similar_neighbors_amount(
        &self,
        coord: Coord,
        agent_type: Option<usize>,
        count_myself: bool,
    ) -> usize {
        self.current()
            .similar_neighbors_amount(self.neighborhood, coord, agent_type, count_myself)
    }

    pub fn neighbors(&self, coord: Coord) -> impl Iterator<Item = Coord> + use<'a, A> {
        self.neighborhood.indexes_for(coord)
    }

    /// A uniformly random coordinate.
    pub fn random_coord(&mut self) -> Coord {
        let length = self.length();
        (
            self.rng.random_range(0..length),
            self.rng.random_range(0..length),
        )
    }

    pub fn rng(&mut self) -> &mut ChaCha12Rng {
        &mut *self.rng
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps taken after the initial snapshot.
    pub steps: usize,
    /// Whether the criterion stopped the run before `max_steps`.
    pub converged: bool,
}

/// Parameters consumed by the engine rather than the rule.
const BASE_PARAMETERS: [&str; 6] = [
    "length",
    "configuration",
    "neighborhood",
    "boundary",
    "agent_types",
    "seed",
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BaseParameters {
    length: usize,
    #[serde(default)]
    configuration: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    neighborhood: NeighborhoodKind,
    #[serde(default)]
    boundary: Boundary,
    #[serde(default = "default_agent_types")]
    agent_types: usize,
    #[serde(default)]
    seed: Option<u64>,
}

fn default_agent_types() -> usize {
    2
}

/// Lattice simulation engine.
///
/// Owns the lattice, the random number generator and the recorded series,
/// and runs the sweep loop; the per-cell behavior comes from `R`.
pub struct LatticeModel<R: Rule> {
    rule: R,
    setup: Setup,
    configuration: Option<Vec<Vec<usize>>>,
    registry: SeriesRegistry<R>,
    lattice: Option<Lattice<R::Agent>>,
    series: Series,
    series_history: SeriesHistory,
    runs: Vec<RunSummary>,
    parameters: ExperimentParameters,
    rng: ChaCha12Rng,
}

impl<R: Rule> LatticeModel<R> {
    /// Create a model from an already built rule.
    ///
    /// `configuration` fixes the initial type matrix for every run; `seed`
    /// makes runs reproducible, otherwise the OS supplies the seed.
    pub fn new(
        rule: R,
        setup: Setup,
        configuration: Option<Vec<Vec<usize>>>,
        seed: Option<u64>,
    ) -> Result<Self> {
        if let Some(types) = &configuration {
            check_configuration(types, &setup)?;
        }
        let registry = SeriesRegistry::new(R::series())?;
        let series = Series::new(registry.names());
        let rng = match seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng().map_err(|e| Error::Entropy(e.to_string()))?,
        };
        Ok(Self {
            rule,
            setup,
            configuration,
            registry,
            lattice: None,
            series,
            series_history: SeriesHistory::default(),
            runs: Vec::new(),
            parameters: ExperimentParameters::new(),
            rng,
        })
    }

    /// Create a model from named parameters.
    ///
    /// `length`, `configuration`, `neighborhood`, `boundary`, `agent_types`
    /// and `seed` configure the engine; every other name must be a field of
    /// `R::Params`.
    pub fn from_parameters(parameters: &ExperimentParameters) -> Result<Self> {
        let (base, own) = parameters.split(&BASE_PARAMETERS);
        let base: BaseParameters = base.deserialize_into().map_err(mismatch::<R>)?;
        let own: R::Params = own.deserialize_into().map_err(mismatch::<R>)?;

        let setup = Setup::new(
            base.length,
            base.neighborhood,
            base.boundary,
            base.agent_types,
        )?;
        let rule = R::new(own, &setup)?;

        let mut model = Self::new(rule, setup, base.configuration, base.seed)?;
        model.parameters = parameters.clone();
        Ok(model)
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    pub fn length(&self) -> usize {
        self.setup.length()
    }

    pub fn neighborhood(&self) -> &Neighborhood {
        self.setup.neighborhood()
    }

    pub fn agent_types(&self) -> usize {
        self.setup.agent_types()
    }

    pub fn registry(&self) -> &SeriesRegistry<R> {
        &self.registry
    }

    /// Series of the current (or last) run.
    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn series_history(&self) -> &SeriesHistory {
        &self.series_history
    }

    /// Summaries of every run so far, oldest first.
    pub fn runs(&self) -> &[RunSummary] {
        &self.runs
    }

    pub fn parameters(&self) -> &ExperimentParameters {
        &self.parameters
    }

    /// `name=value` label built from the given parameter names.
    pub fn label(&self, names: &[&str]) -> String {
        self.parameters.label(names)
    }

    /// Current lattice; fails before the first initialization.
    pub fn lattice(&self) -> Result<&Lattice<R::Agent>> {
        self.lattice.as_ref().ok_or(Error::NotInitialized)
    }

    pub fn similar_neighbors_amount(
        &self,
        coord: Coord,
        agent_type: Option<usize>,
        count_myself: bool,
    ) -> Result<usize> {
        let lattice = self.lattice()?;
        Ok(lattice.similar_neighbors_amount(
            self.setup.neighborhood(),
            coord,
            agent_type,
            count_myself,
        ))
    }

    /// Build a fresh lattice and clear the current series.
    pub fn initialize(&mut self) -> Result<()> {
        let types = match (&self.configuration, self.rule.initial_types()) {
            (Some(types), _) => types.clone(),
            (None, Some(generate)) => generate(&self.rule, &self.setup, &mut self.rng)?,
            (None, None) => lattice::random_types(
                self.setup.length(),
                self.setup.agent_types(),
                &mut self.rng,
            )?,
        };
        check_configuration(&types, &self.setup)?;

        let base = Lattice::from_types(&types)?;
        let lattice = match self.rule.agent_factory() {
            Some(create) => Lattice::try_from_fn(base.length(), |coord| {
                create(&self.rule, &self.setup, &base, coord)
            })?,
            None => Lattice::from_fn(base.length(), |coord| R::Agent::from(*base.at(coord))),
        };

        debug!(
            "initialized {} lattice: length = {}, agents = {}, series = {:?}",
            R::NAME,
            lattice.length(),
            lattice.len(),
            self.registry.names().collect::<Vec<_>>()
        );

        self.lattice = Some(lattice);
        self.series = Series::new(self.registry.names());
        Ok(())
    }

    fn take_snapshot(&mut self) -> Result<()> {
        let lattice = self.lattice.as_ref().ok_or(Error::NotInitialized)?;
        let frame = self.registry.capture(&self.rule, lattice, &self.setup)?;
        self.series.record(frame);
        Ok(())
    }

    /// One sweep in the rule's own order.
    pub fn run_step(&mut self) -> Result<()> {
        let order = self.rule.sweep_order();
        self.run_step_with(order)
    }

    /// One sweep visiting the cells in `order`.
    pub fn run_step_with(&mut self, order: SweepOrder) -> Result<()> {
        let lattice = self.lattice.as_mut().ok_or(Error::NotInitialized)?;
        let coords = sweep_coords(lattice, order);

        match self.rule.update() {
            Update::Sequential => {
                let mut sweep = Sweep {
                    live: lattice,
                    shadow: None,
                    neighborhood: self.setup.neighborhood(),
                    rng: &mut self.rng,
                };
                for coord in coords {
                    self.rule.step(coord, &mut sweep)?;
                }
            }
            Update::Simultaneous => {
                let mut shadow = lattice.clone();
                let mut sweep = Sweep {
                    live: &mut *lattice,
                    shadow: Some(&mut shadow),
                    neighborhood: self.setup.neighborhood(),
                    rng: &mut self.rng,
                };
                for coord in coords {
                    self.rule.step(coord, &mut sweep)?;
                }
                *lattice = shadow;
            }
        }

        Ok(())
    }

    /// Run until `max_steps` or equilibrium, with no series saved to history.
    pub fn run(
        &mut self,
        max_steps: usize,
        criterion: &dyn EquilibriumCriterion,
    ) -> Result<RunSummary> {
        self.run_with::<&str>(max_steps, criterion, &[])
    }

    /// Run from a fresh lattice until `max_steps` or equilibrium, then append
    /// the `saving_series` of this run to the history.
    pub fn run_with<S: AsRef<str>>(
        &mut self,
        max_steps: usize,
        criterion: &dyn EquilibriumCriterion,
        saving_series: &[S],
    ) -> Result<RunSummary> {
        self.initialize()?;
        self.take_snapshot()?;

        let mut summary = RunSummary {
            steps: 0,
            converged: false,
        };
        while summary.steps < max_steps {
            self.run_step()?;
            self.take_snapshot()?;
            summary.steps += 1;
            trace!("{} step {}", R::NAME, summary.steps);

            if criterion.in_equilibrium(&self.series)? {
                info!(
                    "{} reached equilibrium on {:?} at step {}",
                    R::NAME,
                    criterion.series_name().unwrap_or_default(),
                    summary.steps
                );
                summary.converged = true;
                break;
            }
        }
        if !summary.converged {
            debug!("{} stopped at max_steps = {max_steps}", R::NAME);
        }

        self.series_history.save(&self.series, saving_series)?;
        self.runs.push(summary);
        Ok(summary)
    }
}

fn mismatch<R: Rule>(error: impl Display) -> Error {
    Error::Configuration(format!(
        "{error}. Check the parameters in the ExperimentParametersSet instance. \
         They should be named equal to the names expected by the {} model.",
        R::NAME
    ))
}

fn check_configuration(types: &[Vec<usize>], setup: &Setup) -> Result<()> {
    let length = setup.length();
    if types.len() != length || types.iter().any(|row| row.len() != length) {
        return Err(Error::Configuration(format!(
            "configuration must be a {length}x{length} matrix"
        )));
    }
    let agent_types = setup.agent_types();
    for (row, types) in types.iter().enumerate() {
        if let Some(col) = types.iter().position(|&t| t >= agent_types) {
            return Err(Error::Configuration(format!(
                "configuration holds type {} at {:?}, but there are only {agent_types} agent types",
                types[col],
                (row, col)
            )));
        }
    }
    Ok(())
}

fn sweep_coords<A: LatticeAgent>(lattice: &Lattice<A>, order: SweepOrder) -> Vec<Coord> {
    let mut coords: Vec<_> = lattice.coords().collect();
    match order {
        SweepOrder::RowMajor => {}
        SweepOrder::Reverse => coords.reverse(),
        SweepOrder::ByAgentType => coords.sort_by_key(|&coord| lattice.at(coord).agent_type()),
    }
    coords
}
