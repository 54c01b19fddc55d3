//! Named series recorded once per snapshot, and their history across runs.
//!
//! Models declare their series statically as a list of [`SeriesDescriptor`]s.
//! The [`SeriesRegistry`] orders them so that every dependency is captured
//! before the series that reads it.

use crate::agent::LatticeAgent;
use crate::engine::{Rule, Setup};
use crate::error::{Error, Result};
use crate::lattice::{Coord, Lattice};
use crate::neighborhood::Neighborhood;
use crate::stats::{Accumulator, AccumulatorReport};
use indexmap::IndexMap;
use std::collections::HashSet;

/// One recorded value: a scalar or a whole-lattice snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Scalar(f64),
    Discrete(Vec<Vec<usize>>),
    Continuous(Vec<Vec<f64>>),
}

impl Sample {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(val) => Some(*val),
            _ => None,
        }
    }

    pub fn as_discrete(&self) -> Option<&[Vec<usize>]> {
        match self {
            Self::Discrete(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn as_continuous(&self) -> Option<&[Vec<f64>]> {
        match self {
            Self::Continuous(rows) => Some(rows),
            _ => None,
        }
    }

    /// Mean over all cells of a lattice sample; a scalar is its own mean.
    pub fn mean(&self) -> f64 {
        fn mean_of(vals: impl Iterator<Item = f64>) -> f64 {
            let (sum, n) = vals.fold((0.0, 0usize), |(sum, n), val| (sum + val, n + 1));
            if n == 0 { f64::NAN } else { sum / n as f64 }
        }
        match self {
            Self::Scalar(val) => *val,
            Self::Discrete(rows) => mean_of(rows.iter().flatten().map(|&v| v as f64)),
            Self::Continuous(rows) => mean_of(rows.iter().flatten().copied()),
        }
    }
}

/// Computes one sample from the rule and the current lattice.
pub type Producer<R> = fn(&R, &Observation<'_, <R as Rule>::Agent>) -> Result<Sample>;

/// Static declaration of one series.
pub struct SeriesDescriptor<R: Rule> {
    pub name: &'static str,
    pub producer: Producer<R>,
    /// Whether every sample is a [`Sample::Scalar`].
    pub is_scalar: bool,
    /// Whether this is the series an equilibrium criterion should watch.
    pub is_equilibrium_target: bool,
    /// Series that must be captured earlier in the same snapshot.
    pub depends_on: &'static [&'static str],
}

impl<R: Rule> SeriesDescriptor<R> {
    /// A lattice-valued series.
    pub fn new(name: &'static str, producer: Producer<R>) -> Self {
        Self {
            name,
            producer,
            is_scalar: false,
            is_equilibrium_target: false,
            depends_on: &[],
        }
    }

    /// A series producing one number per snapshot.
    pub fn scalar(name: &'static str, producer: Producer<R>) -> Self {
        Self {
            is_scalar: true,
            ..Self::new(name, producer)
        }
    }

    pub fn equilibrium_target(mut self) -> Self {
        self.is_equilibrium_target = true;
        self
    }

    pub fn with_dependencies(mut self, depends_on: &'static [&'static str]) -> Self {
        self.depends_on = depends_on;
        self
    }
}

/// Samples captured so far within one snapshot.
#[derive(Debug, Default)]
pub struct Frame {
    samples: IndexMap<&'static str, Sample>,
}

impl Frame {
    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.samples.get(name)
    }
}

/// What a producer sees: the lattice, its topology and earlier samples.
pub struct Observation<'a, A> {
    lattice: &'a Lattice<A>,
    setup: &'a Setup,
    frame: &'a Frame,
}

impl<'a, A: LatticeAgent> Observation<'a, A> {
    pub fn lattice(&self) -> &'a Lattice<A> {
        self.lattice
    }

    pub fn neighborhood(&self) -> &'a Neighborhood {
        self.setup.neighborhood()
    }

    pub fn agent_types(&self) -> usize {
        self.setup.agent_types()
    }

    /// A sample captured earlier in this snapshot.
    ///
    /// Only declared dependencies are guaranteed to be present.
    pub fn captured(&self, name: &str) -> Result<&'a Sample> {
        self.frame
            .get(name)
            .ok_or_else(|| Error::UnknownSeries(name.to_string()))
    }

    pub fn similar_neighbors_amount(
        &self,
        coord: Coord,
        agent_type: Option<usize>,
        count_myself: bool,
    ) -> usize {
        self.lattice
            .similar_neighbors_amount(self.neighborhood(), coord, agent_type, count_myself)
    }
}

/// Type tag of every cell; shared by all bundled models.
pub fn agent_types_lattice<R: Rule>(_rule: &R, obs: &Observation<'_, R::Agent>) -> Result<Sample> {
    Ok(Sample::Discrete(obs.lattice().types()))
}

/// Series descriptors of one model, in capture order.
pub struct SeriesRegistry<R: Rule> {
    descriptors: Vec<SeriesDescriptor<R>>,
}

impl<R: Rule> SeriesRegistry<R> {
    /// Validate names and dependencies, then order the descriptors so that
    /// dependencies come first. Independent series keep their declared order.
    pub fn new(descriptors: Vec<SeriesDescriptor<R>>) -> Result<Self> {
        let mut names = HashSet::new();
        for desc in &descriptors {
            if !names.insert(desc.name) {
                return Err(Error::Configuration(format!(
                    "series '{}' of the {} model is declared twice",
                    desc.name,
                    R::NAME
                )));
            }
        }
        for desc in &descriptors {
            if desc.is_equilibrium_target && !desc.is_scalar {
                return Err(Error::Configuration(format!(
                    "equilibrium target '{}' of the {} model is not scalar",
                    desc.name,
                    R::NAME
                )));
            }
            if let Some(dep) = desc.depends_on.iter().find(|dep| !names.contains(*dep)) {
                return Err(Error::Configuration(format!(
                    "series '{}' depends on unknown series '{dep}'",
                    desc.name
                )));
            }
        }

        let n_desc = descriptors.len();
        let mut pending: Vec<_> = descriptors.into_iter().map(Some).collect();
        let mut placed = HashSet::new();
        let mut ordered = Vec::with_capacity(n_desc);
        while ordered.len() < n_desc {
            let n_placed = ordered.len();
            for slot in pending.iter_mut() {
                let ready = slot
                    .as_ref()
                    .is_some_and(|desc| desc.depends_on.iter().all(|dep| placed.contains(dep)));
                if let Some(desc) = slot.take_if(|_| ready) {
                    placed.insert(desc.name);
                    ordered.push(desc);
                }
            }
            if ordered.len() == n_placed {
                let stuck: Vec<_> = pending.iter().flatten().map(|desc| desc.name).collect();
                return Err(Error::Configuration(format!(
                    "cyclic series dependencies among {stuck:?}"
                )));
            }
        }

        Ok(Self {
            descriptors: ordered,
        })
    }

    /// Names in capture order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|desc| desc.name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.iter().any(|desc| desc.name == name)
    }

    /// Whether `name` is registered as a scalar series.
    pub fn is_scalar(&self, name: &str) -> bool {
        self.descriptors
            .iter()
            .any(|desc| desc.name == name && desc.is_scalar)
    }

    /// The series flagged as equilibrium target, if any.
    pub fn equilibrium_target(&self) -> Option<&'static str> {
        self.descriptors
            .iter()
            .find(|desc| desc.is_equilibrium_target)
            .map(|desc| desc.name)
    }

    /// Run every producer once, in order.
    pub fn capture(&self, rule: &R, lattice: &Lattice<R::Agent>, setup: &Setup) -> Result<Frame> {
        let mut frame = Frame::default();
        for desc in &self.descriptors {
            let sample = {
                let obs = Observation {
                    lattice,
                    setup,
                    frame: &frame,
                };
                (desc.producer)(rule, &obs)?
            };
            if desc.is_scalar && sample.as_scalar().is_none() {
                return Err(Error::NonScalarSeries(desc.name.to_string()));
            }
            frame.samples.insert(desc.name, sample);
        }
        Ok(frame)
    }
}

/// Name to recorded samples, one sample per snapshot for every name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    values: IndexMap<String, Vec<Sample>>,
}

impl Series {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let values = names
            .into_iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Self { values }
    }

    pub(crate) fn record(&mut self, frame: Frame) {
        for (name, sample) in frame.samples {
            self.values.entry(name.to_string()).or_default().push(sample);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Sample]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn last(&self, name: &str) -> Option<&Sample> {
        self.values.get(name)?.last()
    }

    /// Values of a scalar series.
    pub fn scalars(&self, name: &str) -> Result<Vec<f64>> {
        let samples = self
            .get(name)
            .ok_or_else(|| Error::UnknownSeries(name.to_string()))?;
        samples
            .iter()
            .map(|sample| {
                sample
                    .as_scalar()
                    .ok_or_else(|| Error::NonScalarSeries(name.to_string()))
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Sample])> {
        self.values
            .iter()
            .map(|(name, samples)| (name.as_str(), samples.as_slice()))
    }

    /// Number of snapshots recorded.
    pub fn len(&self) -> usize {
        self.values.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(String, Vec<Sample>)> for Series {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Sample>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Saved series of repeated runs: name to one sample sequence per run.
///
/// Runs may have different lengths when they converge at different steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesHistory {
    runs: IndexMap<String, Vec<Vec<Sample>>>,
}

impl SeriesHistory {
    /// Append the named series of one run; nothing is saved if a name is unknown.
    pub(crate) fn save<S: AsRef<str>>(&mut self, series: &Series, names: &[S]) -> Result<()> {
        let selected = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let samples = series
                    .get(name)
                    .ok_or_else(|| Error::UnknownSeries(name.to_string()))?;
                Ok((name, samples))
            })
            .collect::<Result<Vec<_>>>()?;
        for (name, samples) in selected {
            self.runs
                .entry(name.to_string())
                .or_default()
                .push(samples.to_vec());
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[Vec<Sample>]> {
        self.runs.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.runs.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Every run of `name` cut to the length of the shortest one.
    pub fn truncated(&self, name: &str) -> Result<Vec<&[Sample]>> {
        let runs = self
            .get(name)
            .ok_or_else(|| Error::UnknownSeries(name.to_string()))?;
        let shortest = runs.iter().map(Vec::len).min().unwrap_or(0);
        Ok(runs.iter().map(|run| &run[..shortest]).collect())
    }

    /// Per-step mean and standard deviation of a scalar series across runs.
    pub fn average(&self, name: &str) -> Result<Vec<AccumulatorReport>> {
        let runs = self.truncated(name)?;
        let n_steps = runs.first().map_or(0, |run| run.len());
        (0..n_steps)
            .map(|step| {
                runs.iter()
                    .map(|run| scalar(&run[step], name))
                    .collect::<Result<Accumulator>>()
                    .map(|acc| acc.report())
            })
            .collect()
    }

    /// Mean and standard deviation of the last value of each run.
    pub fn final_report(&self, name: &str) -> Result<AccumulatorReport> {
        let runs = self
            .get(name)
            .ok_or_else(|| Error::UnknownSeries(name.to_string()))?;
        let acc = runs
            .iter()
            .filter_map(|run| run.last())
            .map(|sample| scalar(sample, name))
            .collect::<Result<Accumulator>>()?;
        Ok(acc.report())
    }
}

fn scalar(sample: &Sample, name: &str) -> Result<f64> {
    sample
        .as_scalar()
        .ok_or_else(|| Error::NonScalarSeries(name.to_string()))
}
