use std::time::Instant;
use wecklern_core::{Learner, SharedOutcomeStore};
use wecklern_qlearn::{AgentConfig, MelodyAgent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let iterations: u32 = 1_000_000;
    let store = SharedOutcomeStore::new();
    let mut agent = MelodyAgent::seeded(AgentConfig::default(), 7)?;

    // Warmup
    for s in 0..1000 {
        store.record_dismissal(s % 61);
        agent.step(&store);
    }

    let start = Instant::now();
    for s in 0..iterations {
        store.record_dismissal(s % 61);
        agent.step(&store);
    }
    let duration = start.elapsed();

    println!("{} steps took: {:?}", iterations, duration);
    println!("Average per step: {:?}", duration / iterations);
    println!("Known states: {}", agent.table().len());

    Ok(())
}
