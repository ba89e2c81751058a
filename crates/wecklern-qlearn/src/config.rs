//! Construction parameters of a [`MelodyAgent`](crate::MelodyAgent).

use crate::error::{QLearnError, Result};
use serde::{Deserialize, Serialize};
use wecklern_core::Palette;

/// All fields are optional in serialized form and fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Informational only; the value table is keyed dynamically.
    pub state_size: usize,
    pub action_size: usize,
    /// α in (0, 1].
    pub learning_rate: f64,
    /// γ in [0, 1].
    pub discount_factor: f64,
    /// Initial ε in [0, 1].
    pub exploration_rate: f64,
    /// Multiplied into ε after every step, in (0, 1].
    pub exploration_decay: f64,
    /// Snooze duration at which the reward reaches zero.
    pub max_snooze_seconds: u32,
    /// Snooze duration assumed when no dismissal has been recorded.
    pub default_snooze_seconds: u32,
    pub palette: Palette,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_size: 10,
            action_size: 5,
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 1.0,
            exploration_decay: 0.995,
            max_snooze_seconds: 60,
            default_snooze_seconds: 60,
            palette: Palette::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(QLearnError::InvalidConfig(msg()))
            }
        }

        check(self.action_size >= 1, || "action_size must be at least 1".into())?;
        check(
            self.learning_rate > 0.0 && self.learning_rate <= 1.0,
            || format!("learning_rate {} not in (0, 1]", self.learning_rate),
        )?;
        check((0.0..=1.0).contains(&self.discount_factor), || {
            format!("discount_factor {} not in [0, 1]", self.discount_factor)
        })?;
        check((0.0..=1.0).contains(&self.exploration_rate), || {
            format!("exploration_rate {} not in [0, 1]", self.exploration_rate)
        })?;
        check(
            self.exploration_decay > 0.0 && self.exploration_decay <= 1.0,
            || format!("exploration_decay {} not in (0, 1]", self.exploration_decay),
        )?;
        check(self.max_snooze_seconds >= 1, || {
            "max_snooze_seconds must be at least 1".into()
        })?;
        check(!self.palette.is_empty(), || "palette is empty".into())
    }
}
