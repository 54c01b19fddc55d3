use crate::criterion::{EquilibriumCriterion, WindowedRelativeChange, WithoutCriterion};
use crate::engine::Rule;
use crate::experiment::ExperimentParametersSet;
use crate::runner::Runner;
use crate::series::SeriesRegistry;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_value::Value;
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Bundled model to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Segregation,
    Condensation,
    Market,
    RealEstate,
    GameOfLife,
}

/// How runs decide they have settled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionConfig {
    /// Stop once the relative changes of one scalar series stay small.
    Windowed {
        /// Watched series; the model's equilibrium target when omitted.
        #[serde(default)]
        series: Option<String>,
        #[serde(default = "default_window_size")]
        window_size: usize,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// Always run for `max_steps`.
    None,
}

impl Default for CriterionConfig {
    fn default() -> Self {
        Self::Windowed {
            series: None,
            window_size: default_window_size(),
            tolerance: default_tolerance(),
        }
    }
}

fn default_window_size() -> usize {
    WindowedRelativeChange::DEFAULT_WINDOW_SIZE
}

fn default_tolerance() -> f64 {
    WindowedRelativeChange::DEFAULT_TOLERANCE
}

fn default_times() -> usize {
    1
}

/// Experiment configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Model to run.
    pub model: ModelKind,

    /// Maximum number of steps per run.
    pub max_steps: usize,
    /// Number of runs of the single experiment.
    #[serde(default = "default_times")]
    pub times: usize,
    /// Series saved into the history of every run.
    #[serde(default)]
    pub saving_series: Vec<String>,

    /// Equilibrium criterion.
    #[serde(default)]
    pub criterion: CriterionConfig,

    /// Candidate values of every parameter; each must be a list.
    pub parameters: IndexMap<String, Value>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let text = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&text)
    }

    /// Parse and validate a [`Config`] from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.max_steps, 1..=1_000_000).context("invalid maximum number of steps")?;
        check_num(self.times, 1..=10_000).context("invalid number of runs")?;

        if let CriterionConfig::Windowed {
            series,
            window_size,
            tolerance,
        } = &self.criterion
        {
            if series.as_deref().is_some_and(str::is_empty) {
                bail!("criterion series name must not be empty");
            }
            check_num(*window_size, 1..=100_000).context("invalid criterion window size")?;
            check_num(*tolerance, 0.0..1.0).context("invalid criterion tolerance")?;
        }

        if !self.parameters.contains_key("length") {
            bail!("parameters must include the lattice length");
        }
        for (name, candidates) in &self.parameters {
            let Value::Seq(candidates) = candidates else {
                bail!("parameter '{name}' must be a list of candidate values");
            };
            if candidates.is_empty() {
                bail!("parameter '{name}' has no candidate values");
            }
        }

        Ok(())
    }

    /// Criterion for model `R`, falling back to its equilibrium target.
    pub fn criterion<R: Rule>(&self) -> Result<Box<dyn EquilibriumCriterion>> {
        let CriterionConfig::Windowed {
            series,
            window_size,
            tolerance,
        } = &self.criterion
        else {
            return Ok(Box::new(WithoutCriterion));
        };

        let registry = SeriesRegistry::new(R::series())?;
        let series = match series {
            Some(series) if !registry.contains(series) => {
                bail!("the {} model has no series named '{series}'", R::NAME)
            }
            Some(series) if !registry.is_scalar(series) => {
                bail!("series '{series}' of the {} model is not scalar", R::NAME)
            }
            Some(series) => series.clone(),
            None => registry
                .equilibrium_target()
                .with_context(|| format!("the {} model has no equilibrium target", R::NAME))?
                .to_string(),
        };
        let criterion = WindowedRelativeChange::new(series, *window_size, *tolerance)?;
        Ok(Box::new(criterion))
    }

    /// Build the runner for model `R`, constructing every experiment.
    pub fn build_runner<R: Rule>(&self) -> Result<Runner<R>> {
        let set = ExperimentParametersSet::from_values(self.parameters.clone())
            .context("invalid experiment parameters")?;
        let criterion = self.criterion::<R>().context("invalid criterion")?;

        let runner = Runner::new(set, criterion, self.max_steps)
            .with_context(|| format!("failed to construct {} experiments", R::NAME))?;

        if self.times > 1 || !self.saving_series.is_empty() {
            return runner
                .repeated(self.times, self.saving_series.clone())
                .context("invalid repeat mode");
        }
        Ok(runner)
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
