//! Chooses the next calibration action from the main-metric errors.

use std::collections::BTreeMap;

use crate::actions::{describe, ActionId, SCHEDULE_SKEW_ACTION};
use crate::record::{RoundRecord, WsmEval};

pub const DEFAULT_FAIL_LIMIT: u32 = 1;

/// Total-energy error beyond which only the coarse load knobs are used.
const BALLPARK: f64 = 0.25;

/// Signs each positive action pushes (pv_s, te_s, pv_w, te_w) towards.
const SIGN_PATTERNS: [[i8; 4]; 8] = [
    [1, 1, 1, 1],
    [0, 0, 1, 1],
    [0, 0, 1, 0],
    [1, 0, 1, 1],
    [1, 0, 0, 0],
    [1, 1, 1, 0],
    [1, 0, 1, 0],
    [1, 0, -1, 0],
];

const COARSE_FIRST: [ActionId; 8] = [1, 7, 2, 3, 4, 6, 5, 8];
const FINE_FIRST: [ActionId; 8] = [5, 3, 2, 4, 6, 8, 7, 1];

/// Fallback order per desired action. `next_choice` walks it from the
/// last action tried; running off the end means no options are left.
const NEXT_CHOICE: [&[ActionId]; 8] = [
    &[1, 7, 2, 5, 4, 6, 3, 8],
    &[2, 3, 4, 1, 7, 8],
    &[3, 2, 4, 7, 1, 8],
    &[4, 3, 2, 7, 1],
    &[5, 6, 7, 8, 1],
    &[6, 5, 7, 1],
    &[7, 1, 6, 4, 8],
    &[8, 5, 2, 7],
];

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// The action whose sign pattern best cancels the errors.
pub fn first_choice(main: [f64; 4]) -> ActionId {
    let target = main.map(|e| -sign(e));
    let avg = main.iter().sum::<f64>() / 4.0;
    let order = if avg.abs() > BALLPARK { COARSE_FIRST } else { FINE_FIRST };
    let signs: [ActionId; 2] = if avg > 0.0 { [-1, 1] } else { [1, -1] };

    let mut best: Option<(i32, ActionId)> = None;
    for action in order {
        let pattern = SIGN_PATTERNS[(action - 1) as usize];
        for s in signs {
            let score: i32 = pattern
                .iter()
                .zip(&target)
                .map(|(p, t)| i32::from(p * s as i8 * t))
                .sum();
            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, s * action));
            }
        }
    }
    best.map_or(1, |(_, action)| action)
}

/// Entry after `last` in the fallback order of `desired`, carrying the
/// sign of `desired`; 0 when the order is exhausted.
pub fn next_choice(desired: ActionId, last: ActionId) -> ActionId {
    let Some(chain) = NEXT_CHOICE.get((desired.unsigned_abs() as usize).wrapping_sub(1)) else {
        return 0;
    };
    let next = chain
        .iter()
        .position(|a| *a == last.abs())
        .and_then(|i| chain.get(i + 1))
        .copied()
        .unwrap_or(0);
    desired.signum() * next
}

#[derive(Debug, Clone, Default)]
pub struct Planner {
    pub fail_limit: u32,
    action_count: BTreeMap<ActionId, u32>,
    fail_count: BTreeMap<ActionId, u32>,
}

impl Planner {
    pub fn new(fail_limit: u32) -> Self {
        Self { fail_limit, ..Self::default() }
    }

    /// Times `action` has been chosen.
    pub fn count(&self, action: ActionId) -> u32 {
        self.action_count.get(&action).copied().unwrap_or(0)
    }

    pub fn failures(&self, action: ActionId) -> u32 {
        self.fail_count.get(&action).copied().unwrap_or(0)
    }

    pub fn at_fail_limit(&self, action: ActionId) -> bool {
        self.failures(action) >= self.fail_limit
    }

    pub fn record_failure(&mut self, action: ActionId) {
        *self.fail_count.entry(action).or_insert(0) += 1;
    }

    /// Record a choice made outside [`Planner::decide`].
    pub fn record_choice(&mut self, action: ActionId) {
        *self.action_count.entry(action).or_insert(0) += 1;
    }

    fn first_available(&self, options: &[ActionId]) -> Option<ActionId> {
        options.iter().copied().find(|a| !self.at_fail_limit(*a))
    }

    /// Energy errors too large for fine knobs force the overall load
    /// actions (winter-only ones too when winter dominates).
    fn ballpark(&self, main: [f64; 4]) -> Option<ActionId> {
        let [_, te_s, _, te_w] = main;
        if te_s.abs() <= BALLPARK && te_w.abs() <= BALLPARK {
            return None;
        }
        if te_s < 0.0 && te_w < 0.0 {
            self.first_available(&[1, 7])
        } else if te_s > 0.0 && te_w > 0.0 {
            self.first_available(&[-1, -7])
        } else if te_s.abs() > te_w.abs() {
            if te_s > 0.0 {
                self.first_available(&[-1, -7])
            } else {
                self.first_available(&[1, 7])
            }
        } else if te_w.abs() > te_s.abs() {
            if te_w > 0.0 {
                self.first_available(&[-1, -7, -2, -3])
            } else {
                self.first_available(&[1, 7, 2, 3])
            }
        } else {
            None
        }
    }

    fn take_next(&self, desired: ActionId) -> ActionId {
        let mut last = desired;
        loop {
            let next = next_choice(desired, last);
            if next == 0 || !self.at_fail_limit(next) {
                return next;
            }
            last = next;
        }
    }

    /// Choose the action for `round`; `None` when every option has hit its
    /// fail limit.
    pub fn decide(&mut self, round: usize, main: [f64; 4], history: &[RoundRecord]) -> Option<ActionId> {
        let mut previous = history.iter().rev();
        let mut last = previous.next();
        if last.is_some_and(|r| r.action == SCHEDULE_SKEW_ACTION) {
            last = previous.next().or(last);
        }
        if let Some(last) = last {
            if self.count(last.action) == 1 && last.eval != Some(WsmEval::NoImprovement) {
                tracing::debug!(action = last.action, "new action succeeded; clearing fail counts");
                self.fail_count.values_mut().for_each(|c| *c = 0);
            }
        }

        let desired = first_choice(main);
        let mut action = self.ballpark(main).unwrap_or(desired);
        if self.at_fail_limit(action) {
            action = self.take_next(action);
            if action == 0 {
                tracing::info!("all calibration actions are at their fail limit");
                return None;
            }
        }
        if round % 4 == 3 && !self.at_fail_limit(SCHEDULE_SKEW_ACTION) {
            action = SCHEDULE_SKEW_ACTION;
        }
        self.record_choice(action);
        tracing::info!(
            round,
            desired,
            action,
            attempts = self.count(action),
            "chose action: {}",
            describe(action)
        );
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(round: usize, action: ActionId, eval: WsmEval) -> RoundRecord {
        RoundRecord { round, candidate_id: format!("c{round}"), wsm: Some(0.5), action, eval: Some(eval) }
    }

    #[test]
    fn all_high_lowers_load_then_both_peaks() {
        let main = [0.3, 0.4, 0.3, 0.4];
        assert_eq!(first_choice(main), -1);
        let mut planner = Planner::new(DEFAULT_FAIL_LIMIT);
        let mut history = vec![entry(0, 0, WsmEval::Improved)];
        assert_eq!(planner.decide(1, main, &history), Some(-1));
        planner.record_failure(-1);
        history.push(entry(1, -1, WsmEval::NoImprovement));
        assert_eq!(planner.decide(2, main, &history), Some(-7));
    }

    #[test]
    fn sign_patterns_pick_targeted_actions() {
        assert_eq!(first_choice([0.0, 0.0, -0.1, 0.0]), 3);
        assert_eq!(first_choice([0.1, 0.0, 0.0, 0.0]), -5);
        assert_eq!(first_choice([-0.1, 0.0, 0.1, 0.0]), 8);
        assert_eq!(first_choice([-0.6, -0.6, -0.6, -0.6]), 1);
    }

    #[test]
    fn next_choice_walks_the_table() {
        assert_eq!(next_choice(-1, -1), -7);
        assert_eq!(next_choice(-1, -7), -2);
        assert_eq!(next_choice(8, 7), 0);
        assert_eq!(next_choice(0, 1), 0);
    }

    #[test]
    fn schedule_skew_is_forced_every_fourth_round() {
        let mut planner = Planner::new(DEFAULT_FAIL_LIMIT);
        let history = vec![entry(2, 5, WsmEval::Improved)];
        assert_eq!(planner.decide(3, [0.01, 0.0, 0.0, 0.0], &history), Some(SCHEDULE_SKEW_ACTION));
        planner.record_failure(SCHEDULE_SKEW_ACTION);
        assert_ne!(planner.decide(7, [0.01, 0.0, 0.0, 0.0], &history), Some(SCHEDULE_SKEW_ACTION));
    }

    #[test]
    fn new_success_clears_fail_counts() {
        let mut planner = Planner::new(DEFAULT_FAIL_LIMIT);
        planner.record_failure(-5);
        planner.record_choice(-3);
        let history = vec![entry(1, -3, WsmEval::Improved)];
        planner.decide(2, [0.1, 0.0, 0.0, 0.0], &history);
        assert_eq!(planner.failures(-5), 0);
    }

    #[test]
    fn exhausted_options_end_the_search() {
        let mut planner = Planner::new(DEFAULT_FAIL_LIMIT);
        for action in [-5, -6, -7, -8, -1] {
            planner.record_failure(action);
        }
        assert_eq!(planner.decide(1, [0.1, 0.0, 0.0, 0.0], &[]), None);
    }
}
