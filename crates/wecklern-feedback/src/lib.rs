#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Episode analysis and exploration tuning.
//!
//! Looks back over recorded training episodes (one per alarm) and proposes
//! changes to the agent's exploration parameters. It follows the principle:
//! **analysis proposes, it never modifies a live agent**.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use wecklern_core::{Action, StepReport};

// Confidence calculation constants
/// Sample size at which confidence plateaus (smaller = more generous)
const CONFIDENCE_SAMPLE_SIZE_PLATEAU: f32 = 50.0;
/// Confidence level when 2+ patterns detected (high confidence)
const CONFIDENCE_HIGH_PATTERN: f32 = 0.7;
/// Confidence level when <2 patterns detected (moderate confidence)
const CONFIDENCE_LOW_PATTERN: f32 = 0.5;
/// Weight for sample size component in confidence calculation
const CONFIDENCE_SAMPLE_WEIGHT: f32 = 0.4;
/// Weight for pattern count component in confidence calculation
const CONFIDENCE_PATTERN_WEIGHT: f32 = 0.6;

// Pattern detection thresholds
/// Minimum number of episodes for a specific action before analyzing patterns
const PATTERN_MIN_EPISODES_PER_ACTION: usize = 5;
/// Mean snooze (seconds) above which an action is flagged as slow to wake
const PATTERN_SLOW_SNOOZE_SECONDS: f32 = 45.0;
/// Mean reward below which overall performance is flagged
const PATTERN_POOR_MEAN_REWARD: f32 = 0.3;
/// Lead of the best action's mean reward over the overall mean that counts as dominant
const PATTERN_DOMINANT_MARGIN: f32 = 0.2;
/// Share of explored episodes above which exploration is considered high
const PATTERN_HIGH_EXPLORATION_SHARE: f32 = 0.5;

// Adjustment deltas
/// Exploration change when one action clearly dominates
const ADJUSTMENT_EXPLOIT_DELTA: f32 = -0.05;
/// Exploration change when nothing works yet
const ADJUSTMENT_EXPLORE_DELTA: f32 = 0.05;

// Fallback constants
/// Fallback timestamp when formatting fails
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// One training step as recorded in the episode history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Timestamp when the step ran
    pub ts: String,
    /// Action whose value estimate was updated
    pub action: Action,
    /// Action the published melody came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melody_action: Option<Action>,
    /// Snooze time the step learned from
    pub snooze_seconds: u32,
    /// Reward derived from the snooze time
    pub reward: f32,
    /// Whether the action was a random exploration
    pub explored: bool,
    /// Whether the step ran on defaults because nothing had been recorded
    #[serde(default)]
    pub cold_start: bool,
}

impl EpisodeRecord {
    /// Builds a record from a finished step, stamped with the current time.
    #[must_use]
    pub fn from_step(report: &StepReport, snooze_seconds: u32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let reward = report.reward as f32;
        Self {
            ts: iso8601_now(),
            action: report.action,
            melody_action: Some(report.melody_action),
            snooze_seconds,
            reward,
            explored: report.explored,
            cold_start: report.cold_start,
        }
    }
}

/// Evidence supporting an exploration proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Number of episodes analyzed
    pub episodes_analyzed: usize,
    /// Mean reward over all analyzed episodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_reward_before: Option<f32>,
    /// Mean reward if the best action had been played every time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_reward_best_action: Option<f32>,
    /// Action with the highest mean reward
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_action: Option<Action>,
    /// Identified patterns that led to this proposal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
}

/// Proposed parameter adjustments based on episode analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationProposal {
    /// Version of the proposal format
    pub version: String,
    /// Identifier of the agent being analyzed
    pub basis_agent: String,
    /// Timestamp when the proposal was generated
    pub ts: String,
    /// Proposed parameter adjustments as key-value pairs
    pub deltas: HashMap<String, DeltaValue>,
    /// Confidence in the proposed adjustments (0.0 to 1.0)
    pub confidence: f32,
    /// Evidence supporting the proposal
    pub evidence: Evidence,
    /// Human-readable explanations for the adjustments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<String>>,
    /// Current status of this proposal
    #[serde(default)]
    pub status: ProposalStatus,
}

/// Value type for parameter deltas, tagged with their kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DeltaValue {
    /// Absolute numeric adjustment
    #[serde(rename = "absolute")]
    Absolute { value: f32 },
}

/// Status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Proposed,
}

/// Statistics aggregated from episodes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EpisodeStatistics {
    pub total: usize,
    pub explored: usize,
    pub total_reward: f32,
    pub total_snooze_seconds: u64,
}

impl EpisodeStatistics {
    fn add(&mut self, episode: &EpisodeRecord) {
        self.total += 1;
        if episode.explored {
            self.explored += 1;
        }
        if episode.reward.is_finite() {
            self.total_reward += episode.reward;
        }
        self.total_snooze_seconds += u64::from(episode.snooze_seconds);
    }

    /// Calculate average reward.
    #[must_use]
    pub fn average_reward(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_reward / self.total as f32
        }
    }

    /// Calculate average snooze time in seconds.
    #[must_use]
    pub fn average_snooze_seconds(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_snooze_seconds as f32 / self.total as f32
        }
    }

    /// Share of episodes that explored (0.0 to 1.0).
    #[must_use]
    pub fn exploration_share(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.explored as f32 / self.total as f32
        }
    }
}

/// Analyzes episodes and generates exploration proposals.
#[derive(Debug)]
pub struct EpisodeAnalyzer {
    /// Minimum number of episodes required before proposing adjustments
    min_episodes: usize,
    /// Minimum confidence threshold for proposals
    min_confidence: f32,
}

impl Default for EpisodeAnalyzer {
    fn default() -> Self {
        Self {
            min_episodes: 10,
            min_confidence: 0.5,
        }
    }
}

impl EpisodeAnalyzer {
    /// Create a new analyzer with custom thresholds.
    #[must_use]
    pub fn new(min_episodes: usize, min_confidence: f32) -> Self {
        Self {
            min_episodes,
            min_confidence: min_confidence.clamp(0.0, 1.0),
        }
    }

    /// Aggregate episodes by the action each step updated.
    ///
    /// Cold-start episodes carry no information about an action and are skipped.
    #[must_use]
    pub fn aggregate_by_action(
        &self,
        episodes: &[EpisodeRecord],
    ) -> BTreeMap<Action, EpisodeStatistics> {
        let mut stats: BTreeMap<Action, EpisodeStatistics> = BTreeMap::new();
        for episode in episodes.iter().filter(|e| !e.cold_start) {
            stats.entry(episode.action).or_default().add(episode);
        }
        stats
    }

    fn summarize(&self, episodes: &[EpisodeRecord]) -> EpisodeStatistics {
        let mut stats = EpisodeStatistics::default();
        for episode in episodes {
            stats.add(episode);
        }
        stats
    }

    fn best_action(by_action: &BTreeMap<Action, EpisodeStatistics>) -> Option<(Action, f32)> {
        by_action
            .iter()
            .filter(|(_, s)| s.total >= PATTERN_MIN_EPISODES_PER_ACTION)
            .map(|(a, s)| (*a, s.average_reward()))
            .fold(None, |best, (a, r)| match best {
                Some((_, best_r)) if best_r >= r => best,
                _ => Some((a, r)),
            })
    }

    /// Analyze episodes and identify patterns worth acting on.
    ///
    /// This is a heuristic-based analysis.
    #[must_use]
    pub fn analyze_patterns(&self, episodes: &[EpisodeRecord]) -> Vec<String> {
        let mut patterns = Vec::new();

        if episodes.len() < self.min_episodes {
            return patterns;
        }

        let by_action = self.aggregate_by_action(episodes);
        let overall = self.summarize(episodes);

        // Pattern 1: actions that keep people in bed
        for (action, stats) in &by_action {
            if stats.total >= PATTERN_MIN_EPISODES_PER_ACTION
                && stats.average_snooze_seconds() > PATTERN_SLOW_SNOOZE_SECONDS
            {
                patterns.push(format!(
                    "Slow wake-up ({:.1}s mean snooze) for action {}",
                    stats.average_snooze_seconds(),
                    action
                ));
            }
        }

        // Pattern 2: overall poor reward
        if overall.average_reward() < PATTERN_POOR_MEAN_REWARD {
            patterns.push(format!(
                "Overall mean reward is low ({:.2})",
                overall.average_reward()
            ));
        }

        // Pattern 3: one action dominates while exploration is still high
        if let Some((action, best_reward)) = Self::best_action(&by_action) {
            if best_reward - overall.average_reward() >= PATTERN_DOMINANT_MARGIN
                && overall.exploration_share() > PATTERN_HIGH_EXPLORATION_SHARE
            {
                patterns.push(format!(
                    "Action {} dominates ({:.2} vs {:.2}) while {:.1}% of steps explore",
                    action,
                    best_reward,
                    overall.average_reward(),
                    overall.exploration_share() * 100.0
                ));
            }
        }

        patterns
    }

    /// Generate an exploration proposal based on analyzed episodes.
    ///
    /// Returns `None` if data is insufficient, nothing stands out, or
    /// confidence is too low.
    #[must_use]
    pub fn propose_adjustment(
        &self,
        basis_agent: &str,
        episodes: &[EpisodeRecord],
    ) -> Option<ExplorationProposal> {
        if episodes.len() < self.min_episodes {
            return None;
        }

        let patterns = self.analyze_patterns(episodes);
        if patterns.is_empty() {
            return None;
        }

        let overall = self.summarize(episodes);
        let by_action = self.aggregate_by_action(episodes);
        let best = Self::best_action(&by_action);

        #[allow(clippy::cast_precision_loss)]
        let confidence = {
            let sample_confidence =
                (episodes.len() as f32 / CONFIDENCE_SAMPLE_SIZE_PLATEAU).min(1.0);
            let pattern_confidence = if patterns.len() >= 2 {
                CONFIDENCE_HIGH_PATTERN
            } else {
                CONFIDENCE_LOW_PATTERN
            };
            (sample_confidence * CONFIDENCE_SAMPLE_WEIGHT
                + pattern_confidence * CONFIDENCE_PATTERN_WEIGHT)
                .clamp(0.0, 1.0)
        };

        if confidence < self.min_confidence {
            return None;
        }

        let mut deltas = HashMap::new();
        let mut reasoning = Vec::new();

        let dominant = best
            .is_some_and(|(_, r)| r - overall.average_reward() >= PATTERN_DOMINANT_MARGIN);
        if dominant {
            deltas.insert(
                "exploration_rate".to_string(),
                DeltaValue::Absolute {
                    value: ADJUSTMENT_EXPLOIT_DELTA,
                },
            );
            reasoning.push("Reduce exploration, one melody clearly works best".to_string());
        } else if overall.average_reward() < PATTERN_POOR_MEAN_REWARD {
            deltas.insert(
                "exploration_rate".to_string(),
                DeltaValue::Absolute {
                    value: ADJUSTMENT_EXPLORE_DELTA,
                },
            );
            reasoning.push("Increase exploration, no melody works well yet".to_string());
        }

        Some(ExplorationProposal {
            version: "0.1.0".to_string(),
            basis_agent: basis_agent.to_string(),
            ts: iso8601_now(),
            deltas,
            confidence,
            evidence: Evidence {
                episodes_analyzed: episodes.len(),
                mean_reward_before: Some(overall.average_reward()),
                mean_reward_best_action: best.map(|(_, r)| r),
                best_action: best.map(|(a, _)| a),
                patterns: Some(patterns),
            },
            reasoning: Some(reasoning),
            status: ProposalStatus::Proposed,
        })
    }
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}
