//! Equilibrium criteria deciding when a run may stop early.

use crate::error::{Error, Result};
use crate::series::Series;

/// Decides whether the recorded series have settled.
pub trait EquilibriumCriterion {
    fn in_equilibrium(&self, series: &Series) -> Result<bool>;

    /// Name of the watched series, if any.
    fn series_name(&self) -> Option<&str> {
        None
    }
}

/// Converged once the last `window_size` relative changes of one scalar
/// series all stay below `tolerance`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedRelativeChange {
    series_name: String,
    window_size: usize,
    tolerance: f64,
}

impl WindowedRelativeChange {
    pub const DEFAULT_WINDOW_SIZE: usize = 20;
    pub const DEFAULT_TOLERANCE: f64 = 0.001;

    /// Watch `series_name`, which must not be empty.
    pub fn new(
        series_name: impl Into<String>,
        window_size: usize,
        tolerance: f64,
    ) -> Result<Self> {
        let series_name = series_name.into();
        if series_name.is_empty() {
            return Err(Error::MissingSeriesName);
        }
        if window_size == 0 {
            return Err(Error::Configuration("window size must be at least 1".into()));
        }
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(Error::Configuration(format!(
                "tolerance must be non-negative, but is {tolerance}"
            )));
        }
        Ok(Self {
            series_name,
            window_size,
            tolerance,
        })
    }

    /// Watch `series_name` with the default window and tolerance.
    pub fn with_defaults(series_name: impl Into<String>) -> Result<Self> {
        Self::new(
            series_name,
            Self::DEFAULT_WINDOW_SIZE,
            Self::DEFAULT_TOLERANCE,
        )
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Check a raw sequence of values.
    ///
    /// A zero previous value yields an infinite or NaN change, which never
    /// counts as converged.
    pub fn converged(&self, values: &[f64]) -> bool {
        if values.len() <= self.window_size {
            return false;
        }
        values[values.len() - self.window_size - 1..]
            .windows(2)
            .all(|pair| ((pair[1] - pair[0]) / pair[0]).abs() < self.tolerance)
    }
}

impl EquilibriumCriterion for WindowedRelativeChange {
    fn in_equilibrium(&self, series: &Series) -> Result<bool> {
        let values = series.scalars(&self.series_name)?;
        Ok(self.converged(&values))
    }

    fn series_name(&self) -> Option<&str> {
        Some(&self.series_name)
    }
}

/// Never converges; runs always take `max_steps` steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WithoutCriterion;

impl EquilibriumCriterion for WithoutCriterion {
    fn in_equilibrium(&self, _series: &Series) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sample;

    const SETTLED: [f64; 12] = [
        1.0, 2.99, 3.00, 3.01, 3.00, 3.01, 3.01, 3.02, 3.03, 3.02, 3.01, 3.02,
    ];

    fn series(name: &str, values: &[f64]) -> Series {
        let samples = values.iter().map(|&v| Sample::Scalar(v)).collect();
        [(name.to_string(), samples)].into_iter().collect()
    }

    fn criterion(window_size: usize, tolerance: f64) -> WindowedRelativeChange {
        WindowedRelativeChange::new("x", window_size, tolerance).unwrap()
    }

    #[test]
    fn short_series_never_converge() {
        let crit = criterion(10, 0.01);
        for len in [0, 1, 2, 10] {
            let constant = vec![5.0; len];
            assert!(!crit.converged(&constant), "length {len}");
        }
    }

    #[test]
    fn window_boundary() {
        let crit = criterion(3, 0.01);
        assert!(crit.converged(&[2.0, 2.0, 2.0, 2.0]));
        assert!(!crit.converged(&[2.0, 2.0, 2.0]));
        // Only the last three pairs are inspected.
        assert!(crit.converged(&[100.0, 2.0, 2.0, 2.0, 2.0]));
        assert!(!crit.converged(&[100.0, 2.0, 2.0, 2.0]));
    }

    #[test]
    fn settled_tail_converges() {
        assert!(criterion(10, 0.01).converged(&SETTLED));
    }

    #[test]
    fn growing_series_does_not_converge() {
        let growing: Vec<f64> = (1..=12).map(f64::from).collect();
        assert!(!criterion(10, 0.01).converged(&growing));
    }

    #[test]
    fn one_large_step_breaks_convergence() {
        let mut values = SETTLED.to_vec();
        values[7] = 3.5;
        assert!(!criterion(10, 0.01).converged(&values));
    }

    #[test]
    fn zero_values_never_converge() {
        assert!(!criterion(2, 0.5).converged(&[0.0, 0.0, 0.0]));
    }

    #[test]
    fn looks_up_the_named_series() {
        let crit = criterion(10, 0.01);
        assert!(crit.in_equilibrium(&series("x", &SETTLED)).unwrap());

        let err = crit.in_equilibrium(&series("y", &SETTLED)).unwrap_err();
        assert!(matches!(err, Error::UnknownSeries(name) if name == "x"));

        let lattice: Series = [("x".to_string(), vec![Sample::Discrete(vec![vec![0]])])]
            .into_iter()
            .collect();
        assert!(matches!(
            crit.in_equilibrium(&lattice),
            Err(Error::NonScalarSeries(_))
        ));
    }

    #[test]
    fn a_series_name_is_required() {
        assert!(matches!(
            WindowedRelativeChange::with_defaults(""),
            Err(Error::MissingSeriesName)
        ));
        let crit = WindowedRelativeChange::with_defaults("x").unwrap();
        assert_eq!(crit.window_size(), 20);
        assert_eq!(crit.tolerance(), 0.001);
        assert!(WindowedRelativeChange::new("x", 0, 0.1).is_err());
    }

    #[test]
    fn without_criterion_never_converges() {
        let constant = series("x", &[1.0; 50]);
        assert!(!WithoutCriterion.in_equilibrium(&constant).unwrap());
        assert!(!WithoutCriterion.in_equilibrium(&Series::default()).unwrap());
    }
}
