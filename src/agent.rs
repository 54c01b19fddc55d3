//! Lattice agents.

use serde::{Deserialize, Serialize};

/// Capability shared by every agent a lattice can hold.
///
/// The type tag is the only thing the engine looks at; models attach any
/// extra state (capital, price, utility) by composition.
pub trait LatticeAgent: Clone {
    /// Discrete type tag of the agent.
    fn agent_type(&self) -> usize;

    /// Whether the agent carries the given type tag.
    fn is_type(&self, agent_type: usize) -> bool {
        self.agent_type() == agent_type
    }

    /// Whether both agents carry the same type tag.
    fn same_type<B: LatticeAgent>(&self, other: &B) -> bool {
        self.agent_type() == other.agent_type()
    }
}

/// Base agent of the simulation: a bare type tag.
///
/// Equality and ordering follow the type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Agent {
    agent_type: usize,
}

impl Agent {
    /// Create a new agent with a given type.
    pub fn new(agent_type: usize) -> Self {
        Self { agent_type }
    }

    /// Change the type of the agent in place.
    pub fn set_agent_type(&mut self, agent_type: usize) {
        self.agent_type = agent_type;
    }

    /// Agent whose type is shifted by `delta`, or `None` below zero.
    pub fn shifted(self, delta: isize) -> Option<Self> {
        self.agent_type.checked_add_signed(delta).map(Self::new)
    }

    /// Signed distance between two type tags.
    pub fn type_difference(&self, other: &Self) -> isize {
        self.agent_type as isize - other.agent_type as isize
    }
}

impl LatticeAgent for Agent {
    fn agent_type(&self) -> usize {
        self.agent_type
    }
}
