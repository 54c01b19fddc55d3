//! Experiment parameters and their cartesian product.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;
use serde_value::Value;
use std::collections::BTreeMap;

/// One combination of named parameter values, handed to a model constructor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentParameters {
    values: IndexMap<String, Value>,
}

impl ExperimentParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, serializing `value` into a dynamic value.
    pub fn with<T: Serialize>(mut self, name: &str, value: T) -> Result<Self> {
        let value = serde_value::to_value(value)
            .map_err(|e| Error::Configuration(format!("invalid value for '{name}': {e}")))?;
        self.insert(name, value);
        Ok(self)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Split into two maps: the parameters named in `names`, and the rest.
    pub(crate) fn split(&self, names: &[&str]) -> (Value, Value) {
        let mut selected = BTreeMap::new();
        let mut rest = BTreeMap::new();
        for (name, value) in &self.values {
            let target = if names.contains(&name.as_str()) {
                &mut selected
            } else {
                &mut rest
            };
            target.insert(Value::String(name.clone()), value.clone());
        }
        (Value::Map(selected), Value::Map(rest))
    }

    /// Human-readable `name=value` pairs for the given names, in the order given.
    ///
    /// Names that are not set are skipped.
    pub fn label(&self, names: &[&str]) -> String {
        names
            .iter()
            .filter_map(|&name| {
                let value = self.values.get(name)?;
                Some(format!("{name}={}", render(value)))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Candidate values per parameter; iterating yields every combination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentParametersSet {
    candidates: IndexMap<String, Vec<Value>>,
}

impl ExperimentParametersSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from dynamic values, each of which must be a non-empty list.
    pub fn from_values(values: IndexMap<String, Value>) -> Result<Self> {
        let mut set = Self::new();
        for (name, value) in values {
            let Value::Seq(candidates) = value else {
                return Err(Error::Configuration(format!(
                    "Experiment parameters should be passed using lists, but '{name}' is not a list."
                )));
            };
            set.insert(name, candidates)?;
        }
        Ok(set)
    }

    /// Add a parameter with its candidate values.
    pub fn with<T, I>(mut self, name: &str, candidates: I) -> Result<Self>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let candidates = candidates
            .into_iter()
            .map(serde_value::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Configuration(format!("invalid value for '{name}': {e}")))?;
        self.insert(name.to_string(), candidates)?;
        Ok(self)
    }

    fn insert(&mut self, name: String, candidates: Vec<Value>) -> Result<()> {
        if candidates.is_empty() {
            return Err(Error::Configuration(format!(
                "parameter '{name}' has no candidate values"
            )));
        }
        self.candidates.insert(name, candidates);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.candidates.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.candidates.keys().map(String::as_str)
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.candidates.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names with more than one candidate, used to label experiments.
    pub fn parameters_to_vary(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .filter(|(_, candidates)| candidates.len() > 1)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every combination, varying the last parameter fastest.
    pub fn combinations(&self) -> Vec<ExperimentParameters> {
        let mut combos = vec![ExperimentParameters::new()];
        for (name, candidates) in &self.candidates {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    candidates.iter().map(move |value| {
                        let mut combo = combo.clone();
                        combo.insert(name.clone(), value.clone());
                        combo
                    })
                })
                .collect();
        }
        combos
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Unit | Value::Option(None) => "none".into(),
        Value::Option(Some(v)) | Value::Newtype(v) => render(v),
        Value::Seq(vs) => format!("[{}]", vs.iter().map(render).collect::<Vec<_>>().join(", ")),
        Value::Map(map) => {
            let entries: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", render(k), render(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Bytes(v) => format!("{v:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> ExperimentParametersSet {
        ExperimentParametersSet::new()
            .with("length", [20, 30])
            .unwrap()
            .with("tolerance", [4, 5, 6])
            .unwrap()
            .with("neighborhood", ["moore"])
            .unwrap()
    }

    #[test]
    fn cartesian_product() {
        let set = set();
        assert_eq!(set.len(), 6);
        let combos = set.combinations();
        assert_eq!(combos.len(), 6);

        let pairs: Vec<_> = combos
            .iter()
            .map(|p| p.label(&["length", "tolerance"]))
            .collect();
        assert_eq!(
            pairs,
            vec![
                "length=20, tolerance=4",
                "length=20, tolerance=5",
                "length=20, tolerance=6",
                "length=30, tolerance=4",
                "length=30, tolerance=5",
                "length=30, tolerance=6",
            ]
        );
        assert!(combos.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn parameters_to_vary_skips_fixed_ones() {
        assert_eq!(set().parameters_to_vary(), vec!["length", "tolerance"]);
    }

    #[test]
    fn values_must_be_lists() {
        let mut values = IndexMap::new();
        values.insert("length".to_string(), Value::I64(10));
        let err = ExperimentParametersSet::from_values(values).unwrap_err();
        assert!(err.to_string().contains("should be passed using lists"));

        let mut values = IndexMap::new();
        values.insert("length".to_string(), Value::Seq(vec![]));
        assert!(ExperimentParametersSet::from_values(values).is_err());
    }

    #[test]
    fn split_separates_named_parameters() {
        let params = ExperimentParameters::new()
            .with("length", 10)
            .unwrap()
            .with("tolerance", 3)
            .unwrap();
        let (base, rest) = params.split(&["length", "seed"]);
        let Value::Map(base) = base else { panic!() };
        let Value::Map(rest) = rest else { panic!() };
        assert_eq!(base.len(), 1);
        assert!(base.contains_key(&Value::String("length".into())));
        assert!(rest.contains_key(&Value::String("tolerance".into())));
    }

    #[test]
    fn label_renders_nested_values() {
        let params = ExperimentParameters::new()
            .with("configuration", vec![vec![0, 1], vec![1, 0]])
            .unwrap()
            .with("probability", 0.25)
            .unwrap();
        assert_eq!(
            params.label(&["probability", "configuration", "missing"]),
            "probability=0.25, configuration=[[0, 1], [1, 0]]"
        );
    }
}
