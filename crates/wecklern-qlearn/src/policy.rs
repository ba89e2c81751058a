//! ε-greedy action selection.

use rand::Rng;
use serde::{Deserialize, Serialize};
use wecklern_core::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub action: Action,
    pub explored: bool,
}

impl Selection {
    pub fn why(&self) -> &'static str {
        if self.explored {
            "explore ε"
        } else {
            "exploit q"
        }
    }
}

/// Index of the highest value; ties go to the lowest index. A missing row
/// counts as all zeros, so the answer is then action 0.
pub fn greedy_action(row: Option<&[f64]>) -> Action {
    let Some(row) = row else {
        return 0;
    };
    let mut best = 0;
    for (action, value) in row.iter().enumerate().skip(1) {
        if *value > row[best] {
            best = action;
        }
    }
    best
}

/// With probability `exploration_rate` a uniform action from `0..action_size`,
/// otherwise [`greedy_action`].
pub fn select_action<R: Rng + ?Sized>(
    row: Option<&[f64]>,
    exploration_rate: f64,
    action_size: usize,
    rng: &mut R,
) -> Selection {
    let action_size = action_size.max(1);
    if rng.gen::<f64>() < exploration_rate {
        Selection {
            action: rng.gen_range(0..action_size),
            explored: true,
        }
    } else {
        Selection {
            action: greedy_action(row).min(action_size - 1),
            explored: false,
        }
    }
}
