//! Der Lern-Agent: ein Trainingsschritt pro ausgeschaltetem Wecker.

use crate::config::AgentConfig;
use crate::error::{QLearnError, Result};
use crate::policy::{select_action, Selection};
use crate::reward::{next_state, reward};
use crate::table::QTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use wecklern_core::{
    Action, Learner, MelodyDescriptor, Outcome, OutcomeStore, StateKey, StepReport,
};

/// Version des Snapshot-Formats; ändert sich mit dem Schlüsselformat.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct AgentSnapshot {
    version: u32,
    config: AgentConfig,
    exploration_rate: f64,
    steps: u64,
    table: QTable,
}

/// Tabellarischer Q-Learner über der Melodie-Palette.
///
/// Die Zufallsquelle ist injizierbar, damit Tests mit festem Seed exakte
/// Aktionsfolgen prüfen können.
#[derive(Debug)]
pub struct MelodyAgent<R = StdRng> {
    config: AgentConfig,
    table: QTable,
    exploration_rate: f64,
    steps: u64,
    rng: R,
}

impl MelodyAgent<StdRng> {
    pub fn new(config: AgentConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: AgentConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MelodyAgent<R> {
    pub fn with_rng(config: AgentConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table: QTable::new(config.action_size),
            exploration_rate: config.exploration_rate,
            steps: 0,
            config,
            rng,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Anzahl abgeschlossener Trainingsschritte.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// ε-greedy-Auswahl für `key`, ohne die Tabelle zu verändern.
    pub fn select_action(&mut self, key: &StateKey) -> Selection {
        select_action(
            self.table.row(key),
            self.exploration_rate,
            self.config.action_size,
            &mut self.rng,
        )
    }

    /// Beste bekannte Aktion für `key`, ohne Exploration.
    pub fn greedy_action(&self, key: &StateKey) -> Action {
        crate::policy::greedy_action(self.table.row(key))
    }

    /// Ein kompletter Trainingsschritt ohne Store-Zugriff. Fehlt das
    /// Outcome, wird mit Standard-Schlummerdauer und leerer Melodie gelernt.
    pub fn train(&mut self, outcome: Option<&Outcome>) -> StepReport {
        let cold_start = outcome.is_none();
        let state_key = match outcome {
            Some(outcome) => StateKey::from_outcome(outcome),
            None => {
                warn!(
                    default_snooze_seconds = self.config.default_snooze_seconds,
                    "no dismissal recorded yet, training on defaults"
                );
                StateKey::encode(self.config.default_snooze_seconds, "")
            }
        };
        let snooze_seconds = outcome
            .map(|o| o.snooze_seconds)
            .unwrap_or(self.config.default_snooze_seconds);

        let selection = self.select_action(&state_key);
        let r = reward(snooze_seconds, self.config.max_snooze_seconds);
        let next_state_key = next_state(&state_key, selection.action);

        if let Err(err) = self.table.update(
            &state_key,
            selection.action,
            r,
            &next_state_key,
            self.config.learning_rate,
            self.config.discount_factor,
        ) {
            // select_action bleibt unter action_size, das ist nicht erreichbar.
            error!(%err, "value update skipped");
        }

        // Melodie frisch auswählen, auf der gerade aktualisierten Zeile.
        // Ohne Outcome bleibt es beim Primer.
        let melody_selection = self.select_action(&state_key);
        let melody = if cold_start {
            MelodyDescriptor::default_primer()
        } else {
            self.config.palette.melody_for(melody_selection.action)
        };

        self.exploration_rate *= self.config.exploration_decay;
        self.steps += 1;

        debug!(
            state = %state_key,
            action = selection.action,
            melody_action = melody_selection.action,
            reward = r,
            epsilon = self.exploration_rate,
            "training step"
        );

        StepReport {
            state_key,
            action: selection.action,
            melody_action: melody_selection.action,
            reward: r,
            next_state_key,
            melody,
            exploration_rate: self.exploration_rate,
            explored: selection.explored,
            cold_start,
            why: selection.why().into(),
        }
    }
}

impl<R: Rng> Learner for MelodyAgent<R> {
    type Error = QLearnError;

    /// Liest das Outcome und veröffentlicht die neue Melodie unter einer Sperre.
    fn step(&mut self, store: &dyn OutcomeStore) -> StepReport {
        let mut report = None;
        store.exchange(&mut |outcome| {
            let step = self.train(outcome);
            let melody = step.melody.clone();
            report = Some(step);
            melody
        });

        match report {
            Some(report) => report,
            None => {
                // Store hat den Callback nicht aufgerufen: einfach lesen und schreiben.
                let outcome = store.latest_outcome();
                let report = self.train(outcome.as_ref());
                store.set_next_melody(report.melody.clone());
                report
            }
        }
    }

    /// Konfiguration, aktuelles ε, Schrittzähler und die gesamte Tabelle als JSON.
    fn snapshot(&self) -> Value {
        serde_json::to_value(AgentSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            exploration_rate: self.exploration_rate,
            steps: self.steps,
            table: self.table.clone(),
        })
        .unwrap_or_else(|err| {
            // Alle Felder sind Zahlen, Strings und Vecs; to_value scheitert hier nicht.
            error!(%err, "agent snapshot could not be serialized");
            Value::Null
        })
    }

    /// Stellt einen Snapshot wieder her. Bei Fehlern bleibt der Agent unverändert.
    fn load(&mut self, snapshot: Value) -> Result<()> {
        let snap: AgentSnapshot = serde_json::from_value(snapshot)?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(QLearnError::SnapshotVersion(snap.version));
        }
        snap.config.validate()?;
        if snap.table.action_size() != snap.config.action_size {
            return Err(QLearnError::InvalidConfig(format!(
                "table action_size {} does not match config action_size {}",
                snap.table.action_size(),
                snap.config.action_size
            )));
        }
        snap.table.validate()?;
        if !(0.0..=1.0).contains(&snap.exploration_rate) {
            return Err(QLearnError::InvalidConfig(format!(
                "exploration_rate {} not in [0, 1]",
                snap.exploration_rate
            )));
        }

        self.config = snap.config;
        self.table = snap.table;
        self.exploration_rate = snap.exploration_rate;
        self.steps = snap.steps;
        Ok(())
    }
}
