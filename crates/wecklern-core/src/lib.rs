//! Gemeinsame Typen und Traits für wecklern.
//!
//! Ein [`Learner`] liest das zuletzt beobachtete [`Outcome`] aus einem
//! [`OutcomeStore`], lernt daraus und veröffentlicht die nächste Weckmelodie.

pub mod error;
pub mod event;
pub mod melody;
pub mod state;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{CoreError, Result};
pub use melody::{MelodyDescriptor, Palette, Token, DEFAULT_PALETTE, REST};
pub use state::StateKey;
pub use store::{OutcomeStore, SharedOutcomeStore, StoreState};

/// Index into the melody palette.
pub type Action = usize;

/// The most recent alarm dismissal: how long the sleeper needed and what was playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub snooze_seconds: u32,
    pub melody_used: MelodyDescriptor,
}

impl Outcome {
    pub fn new(snooze_seconds: u32, melody_used: MelodyDescriptor) -> Self {
        Self {
            snooze_seconds,
            melody_used,
        }
    }
}

/// Result of one training step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub state_key: StateKey,
    /// Action whose value estimate was updated.
    pub action: Action,
    /// Action the published melody was generated from.
    pub melody_action: Action,
    pub reward: f64,
    pub next_state_key: StateKey,
    pub melody: MelodyDescriptor,
    /// Exploration rate after decay.
    pub exploration_rate: f64,
    pub explored: bool,
    /// `true` when no dismissal had been recorded and defaults were used.
    pub cold_start: bool,
    pub why: String,
}

pub trait Learner {
    type Error: std::error::Error;

    fn step(&mut self, store: &dyn OutcomeStore) -> StepReport;
    fn snapshot(&self) -> Value;
    fn load(&mut self, snapshot: Value) -> std::result::Result<(), Self::Error>;
}
