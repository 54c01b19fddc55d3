//! Lattice-based agent simulations.
//!
//! A model is a [`Rule`] plugged into the [`LatticeModel`] engine, which owns
//! the lattice, runs the sweeps and records named series. A [`Runner`]
//! builds one model per combination of an [`ExperimentParametersSet`].

pub mod agent;
pub mod config;
pub mod criterion;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod lattice;
pub mod models;
pub mod neighborhood;
pub mod runner;
pub mod series;
pub mod stats;

pub use agent::{Agent, LatticeAgent};
pub use criterion::{EquilibriumCriterion, WindowedRelativeChange, WithoutCriterion};
pub use engine::{LatticeModel, Rule, RunSummary, Setup, Sweep, SweepOrder, Update};
pub use error::{Error, Result};
pub use experiment::{ExperimentParameters, ExperimentParametersSet};
pub use lattice::{Coord, Lattice};
pub use neighborhood::{Boundary, Neighborhood, NeighborhoodKind};
pub use runner::Runner;
pub use series::{Sample, Series, SeriesDescriptor, SeriesHistory, SeriesRegistry};
