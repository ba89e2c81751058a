//! Value table: state key → one value estimate per action.

use crate::error::{QLearnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wecklern_core::{Action, StateKey};

/// Rows are created lazily on update, never evicted, and always hold
/// exactly `action_size` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    action_size: usize,
    rows: BTreeMap<StateKey, Vec<f64>>,
}

impl QTable {
    pub fn new(action_size: usize) -> Self {
        Self {
            action_size,
            rows: BTreeMap::new(),
        }
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Number of known states.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for `key`, `None` if the state has never been updated. Reading
    /// never creates a row.
    pub fn row(&self, key: &StateKey) -> Option<&[f64]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn value(&self, key: &StateKey, action: Action) -> f64 {
        self.row(key)
            .and_then(|row| row.get(action).copied())
            .unwrap_or(0.0)
    }

    fn row_or_init(&mut self, key: &StateKey) -> &mut Vec<f64> {
        let action_size = self.action_size;
        self.rows
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; action_size])
    }

    /// One-step bootstrapped update:
    /// `Q(s,a) ← Q(s,a) + α·(r + γ·max Q(s',·) − Q(s,a))`.
    ///
    /// Creates zeroed rows for `state` and `next_state` when missing and
    /// returns the new value.
    pub fn update(
        &mut self,
        state: &StateKey,
        action: Action,
        reward: f64,
        next_state: &StateKey,
        learning_rate: f64,
        discount_factor: f64,
    ) -> Result<f64> {
        if action >= self.action_size {
            return Err(QLearnError::InvalidAction {
                action,
                action_size: self.action_size,
            });
        }

        let next_max = row_max(self.row_or_init(next_state));
        let row = self.row_or_init(state);
        let old_value = row[action];
        let new_value =
            old_value + learning_rate * (reward + discount_factor * next_max - old_value);
        row[action] = new_value;
        Ok(new_value)
    }

    /// Checks that every row matches `action_size` and holds finite values.
    pub fn validate(&self) -> Result<()> {
        for (key, row) in &self.rows {
            if row.len() != self.action_size {
                return Err(QLearnError::InvalidConfig(format!(
                    "row {key} has {} entries, expected {}",
                    row.len(),
                    self.action_size
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(QLearnError::InvalidConfig(format!(
                    "row {key} contains non-finite values"
                )));
            }
        }
        Ok(())
    }
}

fn row_max(row: &[f64]) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    row.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(n: u32) -> StateKey {
        StateKey::from_parts(n, u64::from(n) * 31)
    }

    #[test]
    fn update_initializes_both_rows_lazily() {
        let mut table = QTable::new(5);
        let value = table
            .update(&key(30), 2, 0.5, &key(28), 0.1, 0.9)
            .expect("valid action");

        assert!((value - 0.05).abs() < 1e-12);
        assert_eq!(table.len(), 2);
        assert_eq!(table.row(&key(30)), Some(&[0.0, 0.0, 0.05, 0.0, 0.0][..]));
        assert_eq!(table.row(&key(28)), Some(&[0.0; 5][..]));
    }

    #[test]
    fn update_bootstraps_from_next_state_max() {
        let mut table = QTable::new(3);
        table
            .update(&key(2), 1, 1.0, &key(3), 1.0, 0.0)
            .expect("valid action");
        // Q(key2) = [0, 1, 0]; bootstrap from it with γ = 0.5.
        let value = table
            .update(&key(1), 0, 0.0, &key(2), 0.5, 0.5)
            .expect("valid action");
        assert!((value - 0.25).abs() < 1e-12);
        assert!((table.value(&key(1), 0) - 0.25).abs() < 1e-12);
        assert_eq!(table.value(&key(1), 1), 0.0);
    }

    #[test]
    fn self_transition_reuses_single_row() {
        let mut table = QTable::new(2);
        table
            .update(&key(0), 0, 1.0, &key(0), 0.5, 0.9)
            .expect("valid action");
        assert_eq!(table.len(), 1);
        assert!((table.value(&key(0), 0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn reads_do_not_create_rows() {
        let table = QTable::new(4);
        assert!(table.row(&key(9)).is_none());
        assert_eq!(table.value(&key(9), 3), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn out_of_range_action_is_rejected_without_side_effects() {
        let mut table = QTable::new(2);
        let err = table.update(&key(1), 2, 1.0, &key(2), 0.1, 0.9);
        assert!(matches!(
            err,
            Err(QLearnError::InvalidAction {
                action: 2,
                action_size: 2
            })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn validate_rejects_ragged_rows() {
        let json = r#"{"action_size": 3, "rows": {"v1:1_0000000000000001": [0.0, 1.0]}}"#;
        let table: QTable = serde_json::from_str(json).expect("structurally valid");
        assert!(table.validate().is_err());
    }
}
