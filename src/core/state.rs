//! Agent lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle state of an agent
///
/// `Init → Inactive → Active → {Inactive | Dead}`. `Inactive` blocks until a
/// wake signal arrives; `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    /// Registered but no life task has run yet
    Init,

    /// Sleeping until an environment message wakes the agent
    Inactive,

    /// Running plan/act cycles
    Active,

    /// Closed; the life task has exited or will exit
    Dead,
}

impl LifeState {
    /// Check if the agent can never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifeState::Dead)
    }

    /// Check if the agent is inside the plan/act loop
    pub fn is_active(&self) -> bool {
        matches!(self, LifeState::Active)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: LifeState) -> bool {
        use LifeState::*;
        matches!(
            (self, next),
            (Init, Inactive)
                | (Init, Active)
                | (Inactive, Active)
                | (Active, Inactive)
                | (Init, Dead)
                | (Inactive, Dead)
                | (Active, Dead)
        )
    }
}

impl Default for LifeState {
    fn default() -> Self {
        LifeState::Init
    }
}

impl std::fmt::Display for LifeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifeState::Init => write!(f, "Init"),
            LifeState::Inactive => write!(f, "Inactive"),
            LifeState::Active => write!(f, "Active"),
            LifeState::Dead => write!(f, "Dead"),
        }
    }
}
