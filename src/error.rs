//! Error types shared by the engine, the runner and the bundled models.

use crate::lattice::Coord;

/// Errors raised while building or running lattice models.
///
/// Every error is fatal for the run that raised it: nothing is retried and no
/// partially swept step is kept.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parameters, explicit configurations or series declarations are invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A per-cell rule met an agent type it does not handle.
    #[error("unexpected agent type {agent_type} at {coord:?}")]
    UnknownAgentType {
        /// The offending type tag.
        agent_type: usize,
        /// Where it was found.
        coord: Coord,
    },

    /// A series name was requested that no model registered.
    #[error("there is no series named '{0}'")]
    UnknownSeries(String),

    /// The equilibrium criterion was pointed at a lattice series.
    #[error("series '{0}' does not hold scalar values")]
    NonScalarSeries(String),

    /// The windowed criterion was built without a series name.
    #[error("an equilibrium criterion needs the name of the series to watch")]
    MissingSeriesName,

    /// A producer was asked to sell more than it holds.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Units requested.
        requested: u32,
        /// Units in stock.
        available: u32,
    },

    /// The lattice was read before the first run initialized it.
    #[error("the model has not been initialized yet")]
    NotInitialized,

    /// The operating system could not provide a seed.
    #[error("failed to seed random number generator: {0}")]
    Entropy(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
