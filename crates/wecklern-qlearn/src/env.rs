//! Simulated sleeper for offline training runs.
//!
//! Stands in for the real alarm: given the melody that was played, it
//! answers with a snooze time. The further the melody's pitches are from
//! the sleeper's preferred pitch, the longer it takes to get up.

use crate::agent::MelodyAgent;
use rand::Rng;
use serde::{Deserialize, Serialize};
use wecklern_core::{Learner, MelodyDescriptor, SharedOutcomeStore, StepReport, Token};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedSleeper {
    pub preferred_pitch: Token,
    /// Snooze time for a melody right on the preferred pitch, before noise.
    pub base_seconds: u32,
    pub seconds_per_semitone: u32,
    /// Uniform jitter added on top, `0..=noise_seconds`.
    pub noise_seconds: u32,
    /// The alarm gives up after this long.
    pub max_seconds: u32,
}

impl Default for SimulatedSleeper {
    fn default() -> Self {
        Self {
            preferred_pitch: 67,
            base_seconds: 5,
            seconds_per_semitone: 6,
            noise_seconds: 4,
            max_seconds: 60,
        }
    }
}

impl SimulatedSleeper {
    /// Snooze seconds for `melody`. A melody without pitches runs out the clock.
    pub fn respond<R: Rng + ?Sized>(&self, melody: &MelodyDescriptor, rng: &mut R) -> u32 {
        let pitches: Vec<i64> = melody.pitches().map(i64::from).collect();
        if pitches.is_empty() {
            return self.max_seconds;
        }
        let count = i64::try_from(pitches.len()).unwrap_or(i64::MAX);
        let mean = pitches.iter().sum::<i64>() / count;
        let distance = u32::try_from((mean - i64::from(self.preferred_pitch)).abs())
            .unwrap_or(u32::MAX);

        let noise = if self.noise_seconds == 0 {
            0
        } else {
            rng.gen_range(0..=self.noise_seconds)
        };
        self.base_seconds
            .saturating_add(distance.saturating_mul(self.seconds_per_semitone))
            .saturating_add(noise)
            .min(self.max_seconds)
    }
}

/// One simulated alarm: what was played, how the sleeper reacted, what the agent learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub played: MelodyDescriptor,
    pub snooze_seconds: u32,
    pub report: StepReport,
}

/// Plays `episodes` alarms: the sleeper dismisses the offered melody, the
/// agent trains on that dismissal and publishes the next melody.
pub fn run_episodes<A: Rng, S: Rng + ?Sized>(
    agent: &mut MelodyAgent<A>,
    sleeper: &SimulatedSleeper,
    store: &SharedOutcomeStore,
    episodes: usize,
    rng: &mut S,
) -> Vec<Episode> {
    (0..episodes)
        .map(|_| {
            let played = store.offered_melody();
            let snooze_seconds = sleeper.respond(&played, rng);
            store.record_dismissal(snooze_seconds);
            let report = agent.step(store);
            Episode {
                played,
                snooze_seconds,
                report,
            }
        })
        .collect()
}
