#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Tabellarisches Q-Learning für Weckmelodien.
//!
//! Der [`MelodyAgent`] implementiert das [`Learner`](wecklern_core::Learner)-Trait:
//! Er liest die letzte Schlummerdauer aus dem Store, bewertet sie mit
//! [`reward`], aktualisiert seine [`QTable`] und veröffentlicht die nächste
//! Melodie. Die Aktion wählt er ε-greedy; ε zerfällt nach jedem Schritt.

pub mod agent;
pub mod config;
pub mod env;
mod error;
pub mod policy;
pub mod reward;
pub mod table;

pub use agent::{MelodyAgent, SNAPSHOT_VERSION};
pub use config::AgentConfig;
pub use error::{QLearnError, Result};
pub use policy::{greedy_action, select_action, Selection};
pub use reward::{next_state, reward, MAX_SNOOZE_SECONDS};
pub use table::QTable;
