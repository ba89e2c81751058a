use std::io::{self, Read};

use serde::Serialize;
use wecklern_core::{Learner, SharedOutcomeStore, StepReport};
use wecklern_qlearn::{AgentConfig, MelodyAgent};

#[derive(Serialize)]
struct StepRecord {
    learner: String,
    step: StepReport,
}

/// Reads an optional snooze time (seconds) from stdin and runs one training step.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let store = SharedOutcomeStore::new();
    if !input.trim().is_empty() {
        store.record_dismissal(input.trim().parse()?);
    }

    let mut agent = MelodyAgent::new(AgentConfig::default())?;
    let record = StepRecord {
        learner: "wecklern-qlearn".to_string(),
        step: agent.step(&store),
    };

    serde_json::to_writer_pretty(io::stdout(), &record)?;
    println!();

    Ok(())
}
