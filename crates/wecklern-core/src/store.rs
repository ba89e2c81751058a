//! Holder of the single most recent dismissal outcome and the next melody to offer.
//!
//! The dismissal flow writes, the learner reads and publishes. Both sides go
//! through one lock so a step never observes a half-written outcome.

use crate::{MelodyDescriptor, Outcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub latest_outcome: Option<Outcome>,
    #[serde(default)]
    pub next_melody: Option<MelodyDescriptor>,
}

pub trait OutcomeStore {
    /// `None` until the first dismissal has been recorded.
    fn latest_outcome(&self) -> Option<Outcome>;

    /// Overwrites any previously published melody.
    fn set_next_melody(&self, melody: MelodyDescriptor);

    fn next_melody(&self) -> Option<MelodyDescriptor>;

    /// Reads the latest outcome and publishes the melody `f` derives from it.
    ///
    /// Implementations shared between threads must hold their lock across
    /// both halves. The default is only correct for single-owner stores.
    fn exchange(
        &self,
        f: &mut dyn FnMut(Option<&Outcome>) -> MelodyDescriptor,
    ) -> MelodyDescriptor {
        let outcome = self.latest_outcome();
        let melody = f(outcome.as_ref());
        self.set_next_melody(melody.clone());
        melody
    }
}

/// Cloneable, lock-guarded [`OutcomeStore`].
#[derive(Debug, Clone, Default)]
pub struct SharedOutcomeStore {
    inner: Arc<Mutex<StoreState>>,
}

impl SharedOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the current contents, e.g. for persisting.
    pub fn state(&self) -> StoreState {
        self.inner.lock().clone()
    }

    /// Melody the next alarm will play: the published one, or the default primer.
    pub fn offered_melody(&self) -> MelodyDescriptor {
        self.inner
            .lock()
            .next_melody
            .clone()
            .unwrap_or_else(MelodyDescriptor::default_primer)
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        self.inner.lock().latest_outcome = Some(outcome);
    }

    /// Records a dismissal of the currently offered melody.
    pub fn record_dismissal(&self, snooze_seconds: u32) -> Outcome {
        let mut state = self.inner.lock();
        let melody_used = state
            .next_melody
            .clone()
            .unwrap_or_else(MelodyDescriptor::default_primer);
        let outcome = Outcome::new(snooze_seconds, melody_used);
        state.latest_outcome = Some(outcome.clone());
        outcome
    }
}

impl OutcomeStore for SharedOutcomeStore {
    fn latest_outcome(&self) -> Option<Outcome> {
        self.inner.lock().latest_outcome.clone()
    }

    fn set_next_melody(&self, melody: MelodyDescriptor) {
        self.inner.lock().next_melody = Some(melody);
    }

    fn next_melody(&self) -> Option<MelodyDescriptor> {
        self.inner.lock().next_melody.clone()
    }

    fn exchange(
        &self,
        f: &mut dyn FnMut(Option<&Outcome>) -> MelodyDescriptor,
    ) -> MelodyDescriptor {
        let mut state = self.inner.lock();
        let melody = f(state.latest_outcome.as_ref());
        state.next_melody = Some(melody.clone());
        melody
    }
}
