//! End-to-end training steps through the shared outcome store.

use rand::rngs::StdRng;
use rand::SeedableRng;
use wecklern_core::{
    Learner, MelodyDescriptor, Outcome, OutcomeStore, Palette, SharedOutcomeStore, StateKey,
    REST,
};
use wecklern_qlearn::{next_state, reward, AgentConfig, MelodyAgent, MAX_SNOOZE_SECONDS};

fn greedy_agent() -> MelodyAgent {
    let config = AgentConfig {
        action_size: 5,
        learning_rate: 0.1,
        discount_factor: 0.9,
        exploration_rate: 0.0,
        ..AgentConfig::default()
    };
    MelodyAgent::seeded(config, 17).expect("valid config")
}

fn store_with(snooze_seconds: u32, melody: &str) -> SharedOutcomeStore {
    let store = SharedOutcomeStore::new();
    store.record_outcome(Outcome::new(
        snooze_seconds,
        melody.parse().expect("valid melody"),
    ));
    store
}

#[test]
fn first_step_writes_alpha_times_reward() {
    let store = store_with(30, "60,-2,62,-2");
    let mut agent = greedy_agent();

    let report = agent.step(&store);

    assert!(!report.cold_start);
    assert_eq!(report.state_key, StateKey::encode(30, "60, -2, 62, -2"));
    assert!((report.reward - 0.5).abs() < 1e-12);
    assert_eq!(report.action, 0, "greedy on an all-zero row picks index 0");
    assert_eq!(report.next_state_key, next_state(&report.state_key, 0));
    assert_ne!(report.state_key, report.next_state_key);

    let table = agent.table();
    assert_eq!(table.len(), 2);
    assert!((table.value(&report.state_key, report.action) - 0.05).abs() < 1e-12);
    assert_eq!(table.row(&report.next_state_key), Some(&[0.0; 5][..]));

    // The updated row now favours action 0, so the greedy melody uses palette[0].
    assert_eq!(report.melody_action, 0);
    assert_eq!(report.melody, Palette::default().melody_for(0));
    assert_eq!(store.next_melody(), Some(report.melody));
}

#[test]
#[allow(clippy::float_cmp)]
fn instant_dismissal_earns_full_reward() {
    let mut agent = greedy_agent();
    let report = agent.step(&store_with(0, "60, -2"));
    assert_eq!(report.reward, 1.0);
}

#[test]
#[allow(clippy::float_cmp)]
fn overlong_snooze_is_clamped_to_zero() {
    let mut agent = greedy_agent();
    let report = agent.step(&store_with(90, "60, -2"));
    assert_eq!(report.reward, 0.0);
    assert_eq!(reward(90, MAX_SNOOZE_SECONDS), 0.0);
}

#[test]
fn cold_start_publishes_the_default_primer() {
    for seed in [0, 1, 2, 7] {
        let store = SharedOutcomeStore::new();
        let mut agent =
            MelodyAgent::seeded(AgentConfig::default(), seed).expect("valid config");

        let report = agent.step(&store);

        assert!(report.cold_start);
        assert_eq!(report.melody, MelodyDescriptor::default_primer());
        assert_eq!(store.next_melody(), Some(MelodyDescriptor::default_primer()));
        assert_eq!(agent.steps(), 1);
    }
}

#[test]
fn melody_for_action_two_uses_third_pitch() {
    let palette = Palette::default();
    let melody = palette.melody_for(2);
    assert_eq!(melody.len(), 8);
    for (i, token) in melody.tokens().iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(*token, palette.pitches()[2]);
        } else {
            assert_eq!(*token, REST);
        }
    }
}

#[test]
fn exploration_decays_geometrically() {
    let config = AgentConfig {
        exploration_rate: 1.0,
        exploration_decay: 0.9,
        ..AgentConfig::default()
    };
    let mut agent = MelodyAgent::seeded(config, 1).expect("valid config");
    let store = SharedOutcomeStore::new();

    let mut previous = agent.exploration_rate();
    for n in 1..=25 {
        store.record_dismissal(20);
        agent.step(&store);
        let rate = agent.exploration_rate();
        assert!(rate <= previous);
        assert!((rate - 0.9_f64.powi(n)).abs() < 1e-12);
        previous = rate;
    }
}

#[test]
fn seeded_agents_replay_identically() {
    let run = || {
        let config = AgentConfig {
            exploration_rate: 0.5,
            ..AgentConfig::default()
        };
        let mut agent = MelodyAgent::with_rng(config, StdRng::seed_from_u64(2024))
            .expect("valid config");
        let store = SharedOutcomeStore::new();
        [12, 40, 3, 60, 25, 8]
            .into_iter()
            .map(|snooze| {
                store.record_dismissal(snooze);
                let report = agent.step(&store);
                (report.action, report.melody_action, report.explored)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn rows_keep_action_size_and_never_disappear() {
    let config = AgentConfig {
        exploration_rate: 0.7,
        exploration_decay: 0.97,
        ..AgentConfig::default()
    };
    let mut agent = MelodyAgent::seeded(config, 99).expect("valid config");
    let store = SharedOutcomeStore::new();
    let mut seen: Vec<StateKey> = Vec::new();

    for snooze in (0..60).step_by(7).chain((0..60).step_by(11)) {
        store.record_dismissal(snooze);
        let report = agent.step(&store);
        seen.push(report.state_key);
        seen.push(report.next_state_key);

        for key in &seen {
            let row = agent.table().row(key).expect("row never evicted");
            assert_eq!(row.len(), 5);
        }
    }
}

#[test]
fn foreign_melody_outcome_is_learned_like_any_other() {
    let store = SharedOutcomeStore::new();
    store.record_outcome(Outcome::new(15, MelodyDescriptor::default()));
    let mut agent = greedy_agent();

    let report = agent.step(&store);
    assert_eq!(report.state_key, StateKey::encode(15, ""));
    assert!((report.reward - 0.75).abs() < 1e-12);
}
