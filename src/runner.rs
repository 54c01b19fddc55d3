use crate::criterion::EquilibriumCriterion;
use crate::engine::{LatticeModel, Rule};
use crate::error::{Error, Result};
use crate::experiment::ExperimentParametersSet;
use log::info;

/// Builds one model per parameter combination and runs them in turn.
pub struct Runner<R: Rule> {
    parameters_set: ExperimentParametersSet,
    experiments: Vec<LatticeModel<R>>,
    criterion: Box<dyn EquilibriumCriterion>,
    max_steps: usize,
    times: usize,
    saving_series: Vec<String>,
}

impl<R: Rule> Runner<R> {
    /// Construct every experiment up front, so parameter mistakes surface
    /// before anything runs.
    pub fn new(
        parameters_set: ExperimentParametersSet,
        criterion: Box<dyn EquilibriumCriterion>,
        max_steps: usize,
    ) -> Result<Self> {
        let experiments = parameters_set
            .combinations()
            .iter()
            .map(LatticeModel::<R>::from_parameters)
            .collect::<Result<Vec<_>>>()?;
        info!("built {} {} experiments", experiments.len(), R::NAME);

        Ok(Self {
            parameters_set,
            experiments,
            criterion,
            max_steps,
            times: 1,
            saving_series: Vec::new(),
        })
    }

    /// Run the experiment `times` times, saving `saving_series` of every run
    /// into its history.
    ///
    /// Only allowed when the parameter set holds a single combination.
    pub fn repeated(mut self, times: usize, saving_series: Vec<String>) -> Result<Self> {
        if self.parameters_set.len() != 1 {
            return Err(Error::Configuration(format!(
                "repeated runs need exactly one parameter combination, but there are {}",
                self.parameters_set.len()
            )));
        }
        if times == 0 {
            return Err(Error::Configuration("times must be at least 1".into()));
        }
        self.times = times;
        self.saving_series = saving_series;
        Ok(self)
    }

    /// Run every experiment, `times` times each.
    pub fn start(&mut self) -> Result<()> {
        let names = self.parameters_set.parameters_to_vary();
        for (i_exp, model) in self.experiments.iter_mut().enumerate() {
            let label = model.label(&names);
            info!("starting experiment {i_exp} ({label})");

            for i_run in 0..self.times {
                let summary =
                    model.run_with(self.max_steps, self.criterion.as_ref(), &self.saving_series)?;
                info!(
                    "experiment {i_exp} run {i_run} finished after {} steps (converged = {})",
                    summary.steps, summary.converged
                );
            }
        }
        Ok(())
    }

    pub fn experiments(&self) -> &[LatticeModel<R>] {
        &self.experiments
    }

    pub fn parameters_set(&self) -> &ExperimentParametersSet {
        &self.parameters_set
    }

    pub fn parameters_to_vary(&self) -> Vec<&str> {
        self.parameters_set.parameters_to_vary()
    }

    pub fn times(&self) -> usize {
        self.times
    }

    pub fn saving_series(&self) -> &[String] {
        &self.saving_series
    }
}
