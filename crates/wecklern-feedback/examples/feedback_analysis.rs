//! Example demonstrating episode analysis and exploration proposals.
//!
//! Shows how a history of training steps is analyzed retrospectively and
//! turned into a proposal, without touching the agent itself.
//!
//! Run with: cargo run -p wecklern-feedback --example feedback_analysis

use std::error::Error;
use wecklern_feedback::{EpisodeAnalyzer, EpisodeRecord};

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== wecklern: Episode Analysis ===\n");

    // Two weeks of alarms: action 4 gets the sleeper up quickly, the rest drag on.
    let mut episodes = Vec::new();
    for day in 0..14u32 {
        let action = (day as usize * 3) % 5;
        let snooze = if action == 4 { 4 + day % 3 } else { 40 + day };
        episodes.push(create_episode(action, snooze, day < 10));
    }
    for day in 0..6u32 {
        episodes.push(create_episode(4, 3 + day % 2, true));
    }

    println!("📊 Analyzing {} episodes...\n", episodes.len());

    let analyzer = EpisodeAnalyzer::default();

    println!("📈 Statistics by action:");
    for (action, stats) in analyzer.aggregate_by_action(&episodes) {
        println!(
            "  action {} → {} steps, mean snooze {:.1}s, mean reward {:.2}, explored {:.0}%",
            action,
            stats.total,
            stats.average_snooze_seconds(),
            stats.average_reward(),
            stats.exploration_share() * 100.0
        );
    }
    println!();

    println!("🔍 Identified patterns:");
    let patterns = analyzer.analyze_patterns(&episodes);
    if patterns.is_empty() {
        println!("  (none detected with current thresholds)");
    } else {
        for pattern in &patterns {
            println!("  • {pattern}");
        }
    }
    println!();

    match analyzer.propose_adjustment("melody-agent", &episodes) {
        Some(proposal) => {
            println!("💡 Proposal (confidence {:.2}):", proposal.confidence);
            println!("{}", serde_json::to_string_pretty(&proposal)?);
        }
        None => println!("💡 No proposal: not enough evidence."),
    }

    Ok(())
}

fn create_episode(action: usize, snooze_seconds: u32, explored: bool) -> EpisodeRecord {
    EpisodeRecord {
        ts: "2026-10-19T06:30:00Z".to_string(),
        action,
        melody_action: Some(action),
        snooze_seconds,
        reward: (1.0 - snooze_seconds as f32 / 60.0).max(0.0),
        explored,
        cold_start: false,
    }
}
