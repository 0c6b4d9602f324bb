use serde::{Deserialize, Serialize};

use crate::actions::ActionId;

/// Outcome of comparing a round's best score with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WsmEval {
    Improved,
    Acceptable,
    NoImprovement,
}

impl WsmEval {
    pub fn code(self) -> u8 {
        match self {
            WsmEval::Improved => 0,
            WsmEval::Acceptable => 1,
            WsmEval::NoImprovement => 2,
        }
    }
}

/// Candidate id recorded for a round in which nothing could be scored.
pub const ALL_FAILED: &str = "*all runs failed";

/// One entry of the append-only calibration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub candidate_id: String,
    pub wsm: Option<f64>,
    pub action: ActionId,
    pub eval: Option<WsmEval>,
}

impl RoundRecord {
    pub fn all_failed(&self) -> bool {
        self.candidate_id == ALL_FAILED
    }
}

/// Lowest score in `record`.
pub fn best_score(record: &[RoundRecord]) -> Option<f64> {
    record.iter().filter_map(|r| r.wsm).min_by(f64::total_cmp)
}

/// Judge a round's best score against everything recorded before it.
pub fn evaluate_wsm(best: f64, record: &[RoundRecord], acceptable: f64) -> WsmEval {
    if best < acceptable {
        return WsmEval::Acceptable;
    }
    match best_score(record) {
        Some(previous) if best >= previous => WsmEval::NoImprovement,
        _ => WsmEval::Improved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(round: usize, wsm: f64) -> RoundRecord {
        RoundRecord { round, candidate_id: format!("c{round}"), wsm: Some(wsm), action: 1, eval: None }
    }

    #[test]
    fn evaluation_compares_with_the_best_so_far() {
        let record = vec![entry(0, 0.4), entry(1, 0.3), entry(2, 0.35)];
        assert_eq!(evaluate_wsm(0.31, &record, 0.05), WsmEval::NoImprovement);
        assert_eq!(evaluate_wsm(0.3, &record, 0.05), WsmEval::NoImprovement);
        assert_eq!(evaluate_wsm(0.2, &record, 0.05), WsmEval::Improved);
        assert_eq!(evaluate_wsm(0.049, &record, 0.05), WsmEval::Acceptable);
        assert_eq!(WsmEval::NoImprovement.code(), 2);
    }
}
