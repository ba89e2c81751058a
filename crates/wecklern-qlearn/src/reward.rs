//! Reward signal and the simulated successor state.

use tracing::debug;
use wecklern_core::state::fingerprint;
use wecklern_core::{Action, StateKey};

/// Default snooze duration at which the reward bottoms out.
pub const MAX_SNOOZE_SECONDS: u32 = 60;

/// `max(0, 1 − snooze / max_snooze)`: 1.0 for an immediate dismissal, 0.0 at
/// or beyond `max_snooze_seconds`. A zero maximum yields 0.0.
pub fn reward(snooze_seconds: u32, max_snooze_seconds: u32) -> f64 {
    if max_snooze_seconds == 0 {
        return 0.0;
    }
    (1.0 - f64::from(snooze_seconds) / f64::from(max_snooze_seconds)).max(0.0)
}

/// Successor of `current` under `action`: snooze reduced by `action` seconds
/// (floored at 0) and the melody fingerprint perturbed by `action`.
///
/// Keys that do not parse are returned unchanged.
pub fn next_state(current: &StateKey, action: Action) -> StateKey {
    let Some((snooze_seconds, melody_fp)) = current.parts() else {
        debug!(key = %current, "unparseable state key, keeping it as successor");
        return current.clone();
    };
    let step = u32::try_from(action).unwrap_or(u32::MAX);
    let perturbed = fingerprint(&melody_fp.wrapping_add(action as u64).to_le_bytes());
    StateKey::from_parts(snooze_seconds.saturating_sub(step), perturbed)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn reward_endpoints() {
        assert_eq!(reward(0, MAX_SNOOZE_SECONDS), 1.0);
        assert_eq!(reward(30, MAX_SNOOZE_SECONDS), 0.5);
        assert_eq!(reward(60, MAX_SNOOZE_SECONDS), 0.0);
        assert_eq!(reward(90, MAX_SNOOZE_SECONDS), 0.0);
        assert_eq!(reward(u32::MAX, MAX_SNOOZE_SECONDS), 0.0);
        assert_eq!(reward(5, 0), 0.0);
    }

    #[test]
    fn reward_is_bounded_and_non_increasing() {
        let mut previous = f64::INFINITY;
        for s in 0..=120 {
            let r = reward(s, MAX_SNOOZE_SECONDS);
            assert!((0.0..=1.0).contains(&r), "reward({s}) = {r}");
            assert!(r <= previous);
            previous = r;
        }
    }

    #[test]
    fn next_state_reduces_snooze_and_floors_at_zero() {
        let key = StateKey::from_parts(3, 0xabc);
        let (snooze, fp) = next_state(&key, 2).parts().expect("well-formed");
        assert_eq!(snooze, 1);
        assert_ne!(fp, 0xabc);

        let (snooze, _) = next_state(&key, 7).parts().expect("well-formed");
        assert_eq!(snooze, 0);
    }

    #[test]
    fn next_state_is_deterministic_and_action_dependent() {
        let key = StateKey::encode(30, "60, -2, 62, -2");
        assert_eq!(next_state(&key, 1), next_state(&key, 1));
        assert_ne!(next_state(&key, 1), next_state(&key, 2));
        // Even the zero action moves to a fresh melody fingerprint.
        assert_ne!(next_state(&key, 0), key);
    }

    #[test]
    fn malformed_key_is_returned_unchanged() {
        for raw in ["garbage", "30_-4792048", "v1:30_nothex", ""] {
            let key = StateKey::from_raw(raw);
            assert_eq!(next_state(&key, 3), key);
        }
    }
}
