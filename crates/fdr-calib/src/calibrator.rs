//! The calibration loop.
//!
//! Round 0 scores the starting vector. Every later round asks the planner
//! for an action, expands it into candidates, simulates all of them
//! together and compares the best score with the record. The loop ends
//! when a score is acceptable, the planner runs out of options, the round
//! cap is reached or the cancel token fires. The incumbent is returned in
//! every case except a round 0 that scored nothing: a failure there is an
//! error, a cancellation a result without an incumbent.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fdr_batch::{RoundEnd, SimRequest, SimulatorHarness};
use fdr_core::{FdrError, ObjectTree};
use fdr_io::scada::ScadaReference;
use fdr_populate::recorders::OUTPUT_DIR;
use fdr_populate::{populate_feeder, FeederConfig, RecorderOptions};
use fdr_scenarios::seasons::DEFAULT_EXTENSION;
use fdr_scenarios::{write_season_files, Scenario, SeasonFile};
use serde::{Deserialize, Serialize};

use crate::actions::{
    candidates, load_shape_scalars, ActionId, FALLBACK_LOAD_SHAPE_SCALARS, INITIAL_LOAD_SHAPE_SCALARS,
};
use crate::logs::{clean_up, move_to_winners, CalibrationLogs};
use crate::metrics::{glean_candidate, CandidateMetrics};
use crate::planner::{Planner, DEFAULT_FAIL_LIMIT};
use crate::record::{evaluate_wsm, RoundRecord, WsmEval, ALL_FAILED};
use crate::vector::ConfigVector;
use crate::weights::Weights;

pub const DEFAULT_CANDIDATE: &str = "DefaultCalibration";
pub const DEFAULT_ACCEPTABLE: f64 = 0.05;
pub const DEFAULT_MAX_ROUNDS: usize = 50;

/// Action recorded for the load-shape scalar steps.
const LOAD_SHAPE_ACTION: ActionId = -1;

fn default_acceptable() -> f64 {
    DEFAULT_ACCEPTABLE
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_fail_limit() -> u32 {
    DEFAULT_FAIL_LIMIT
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// Loop settings, loadable from TOML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// WSM below which a candidate ends the calibration
    #[serde(default = "default_acceptable")]
    pub acceptable: f64,
    /// Search rounds after round 0
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_fail_limit")]
    pub fail_limit: u32,
    /// Keep losing models in `losers/` instead of deleting them
    #[serde(default)]
    pub save_losers: bool,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Population seed offset for every candidate
    #[serde(default)]
    pub seed: Option<u64>,
    /// Starting vector; the feeder configuration's knobs otherwise
    #[serde(default)]
    pub start: Option<[f64; 12]>,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            acceptable: DEFAULT_ACCEPTABLE,
            max_rounds: DEFAULT_MAX_ROUNDS,
            fail_limit: DEFAULT_FAIL_LIMIT,
            save_losers: false,
            extension: default_extension(),
            seed: None,
            start: None,
        }
    }
}

impl CalibrationSettings {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading calibration settings {}", path.display()))?;
        let settings: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing calibration settings {}", path.display()))?,
            _ => toml::from_str(&text)
                .with_context(|| format!("parsing calibration settings {}", path.display()))?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), FdrError> {
        if !(self.acceptable >= 0.0) {
            return Err(FdrError::Validation(format!("acceptable WSM {} is negative", self.acceptable)));
        }
        if self.fail_limit == 0 {
            return Err(FdrError::Validation("fail limit must be at least 1".into()));
        }
        if self.extension.is_empty() || self.extension.contains(['/', '.']) {
            return Err(FdrError::Validation(format!("bad model extension '{}'", self.extension)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationEnd {
    Acceptable,
    OutOfOptions,
    RoundLimit,
    Cancelled,
    LoadShapeDone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// `None` when cancelled before round 0 scored a candidate
    pub best_id: Option<String>,
    pub wsm: Option<f64>,
    /// Best vector, or the starting vector when nothing was scored
    pub vector: ConfigVector,
    pub config: FeederConfig,
    pub metrics: Option<CandidateMetrics>,
    /// Search rounds run after round 0
    pub rounds: usize,
    pub end: CalibrationEnd,
    pub record: Vec<RoundRecord>,
}

/// A candidate with complete output for all three seasons.
#[derive(Debug, Clone)]
struct Scored {
    id: String,
    vector: ConfigVector,
    wsm: f64,
    metrics: CandidateMetrics,
}

#[derive(Debug)]
enum RoundOutcome {
    Scored(Scored),
    AllFailed,
    Cancelled,
}

struct Candidate {
    id: String,
    vector: ConfigVector,
    files: Vec<SeasonFile>,
}

pub struct Calibrator {
    base: ObjectTree,
    config: FeederConfig,
    scenario: Scenario,
    scada: ScadaReference,
    weights: Weights,
    settings: CalibrationSettings,
    harness: SimulatorHarness,
    work_dir: PathBuf,
    planner: Planner,
    record: Vec<RoundRecord>,
}

impl Calibrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base: ObjectTree,
        config: FeederConfig,
        scenario: Scenario,
        scada: ScadaReference,
        weights: Weights,
        settings: CalibrationSettings,
        harness: SimulatorHarness,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let planner = Planner::new(settings.fail_limit);
        Self {
            base,
            config,
            scenario,
            scada,
            weights,
            settings,
            harness,
            work_dir: work_dir.into(),
            planner,
            record: Vec::new(),
        }
    }

    pub fn record(&self) -> &[RoundRecord] {
        &self.record
    }

    fn candidate_config(&self, vector: &ConfigVector) -> FeederConfig {
        let mut config = vector.apply(&self.config);
        if let Some(seed) = self.settings.seed {
            config.seed = seed;
        }
        config
    }

    fn prepare(&self, id: String, vector: ConfigVector) -> Result<Candidate> {
        let config = self.candidate_config(&vector);
        let output = populate_feeder(&self.base, &config, self.scenario.case, RecorderOptions::default())
            .with_context(|| format!("populating candidate {id}"))?;
        if output.diagnostics.has_issues() {
            tracing::debug!(candidate = %id, "population diagnostics: {}", output.diagnostics.summary());
        }
        let files = write_season_files(&output.tree, &self.scenario, &id, &self.work_dir, &self.settings.extension)?;
        Ok(Candidate { id, vector, files })
    }

    /// Simulate and score one round of candidates.
    fn evaluate(
        &self,
        logs: &mut CalibrationLogs,
        round: usize,
        named: Vec<(String, ConfigVector)>,
    ) -> Result<RoundOutcome> {
        let output_dir = self.work_dir.join(OUTPUT_DIR);
        fs::create_dir_all(&output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

        let candidates = named
            .into_iter()
            .map(|(id, vector)| self.prepare(id, vector))
            .collect::<Result<Vec<_>>>()?;
        let requests: Vec<SimRequest> = candidates
            .iter()
            .flat_map(|c| c.files.iter())
            .map(|f| SimRequest::new(&f.path).expecting(&f.recorder))
            .collect();
        tracing::info!(round, candidates = candidates.len(), runs = requests.len(), "simulating round");

        let run = self.harness.run_round(&requests);
        if run.end == RoundEnd::Cancelled {
            return Ok(RoundOutcome::Cancelled);
        }
        if run.end == RoundEnd::TimedOut {
            tracing::warn!(round, "round timed out; unfinished runs count as failures");
        }

        let mut best: Option<Scored> = None;
        let mut reports = run.reports.iter();
        for candidate in candidates {
            let statuses: Vec<_> = reports.by_ref().take(candidate.files.len()).collect();
            if let Some(failed) = statuses.iter().find(|r| !r.status.is_success()) {
                tracing::warn!(
                    candidate = %candidate.id,
                    model = %failed.model.display(),
                    status = failed.status.label(),
                    "candidate not scored"
                );
                continue;
            }
            let metrics = match glean_candidate(&candidate.files, &self.scada) {
                Ok(metrics) => metrics,
                Err(err) => {
                    tracing::warn!(candidate = %candidate.id, "cannot extract metrics: {err:#}");
                    continue;
                }
            };
            let wsm = self.weights.wsm(&metrics.errors);
            logs.result(&candidate.id, wsm, &candidate.vector, &metrics.errors)?;
            tracing::info!(candidate = %candidate.id, wsm, "scored candidate");
            if best.as_ref().map_or(true, |b| wsm < b.wsm) {
                best = Some(Scored { id: candidate.id, vector: candidate.vector, wsm, metrics });
            }
        }
        match best {
            Some(best) => Ok(RoundOutcome::Scored(best)),
            None => {
                logs.no_results()?;
                Ok(RoundOutcome::AllFailed)
            }
        }
    }

    fn round_zero(&mut self, logs: &mut CalibrationLogs, start: ConfigVector) -> Result<Option<Scored>> {
        let load_shapes = self.scenario.case.uses_load_shapes();
        let first: Vec<(String, ConfigVector)> = if load_shapes {
            INITIAL_LOAD_SHAPE_SCALARS
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("Calib_ID0_Config_ID{i}"), start.with_load_shape(*s)))
                .collect()
        } else {
            vec![(DEFAULT_CANDIDATE.to_string(), start)]
        };
        let mut outcome = self.evaluate(logs, 0, first)?;
        if load_shapes && matches!(outcome, RoundOutcome::AllFailed) {
            tracing::info!("no initial load-shape scalar worked; trying the low fallback scalars");
            let offset = INITIAL_LOAD_SHAPE_SCALARS.len();
            let fallback = FALLBACK_LOAD_SHAPE_SCALARS
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("Calib_ID0_Config_ID{}", i + offset), start.with_load_shape(*s)))
                .collect();
            outcome = self.evaluate(logs, 0, fallback)?;
        }
        match outcome {
            RoundOutcome::Scored(best) => Ok(Some(best)),
            RoundOutcome::Cancelled => Ok(None),
            RoundOutcome::AllFailed => Err(FdrError::Simulator(
                "the starting configuration produced no complete simulation output".into(),
            )
            .into()),
        }
    }

    /// Run the calibration to completion.
    pub fn run(&mut self) -> Result<CalibrationResult> {
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("creating working directory {}", self.work_dir.display()))?;
        let mut logs = CalibrationLogs::open(&self.work_dir)?;
        let load_shapes = self.scenario.case.uses_load_shapes();
        let ext = self.settings.extension.clone();
        let acceptable = self.settings.acceptable;

        let start = match self.settings.start {
            Some(values) => ConfigVector::new(values),
            None => ConfigVector::from_config(&self.config),
        };
        tracing::info!(feeder = %self.scenario.feeder, case = self.scenario.case.code(), %start, "starting calibration");

        let Some(mut incumbent) = self.round_zero(&mut logs, start)? else {
            tracing::warn!("calibration cancelled before round 0 finished");
            clean_up(&self.work_dir, &ext, self.settings.save_losers);
            return Ok(CalibrationResult {
                best_id: None,
                wsm: None,
                config: self.candidate_config(&start),
                vector: start,
                metrics: None,
                rounds: 0,
                end: CalibrationEnd::Cancelled,
                record: self.record.clone(),
            });
        };
        let eval = evaluate_wsm(incumbent.wsm, &self.record, acceptable);
        let entry = RoundRecord { round: 0, candidate_id: incumbent.id.clone(), wsm: Some(incumbent.wsm), action: 0, eval: Some(eval) };
        logs.round(&entry, Some(incumbent.metrics.main()))?;
        self.record.push(entry);
        move_to_winners(&self.work_dir, &incumbent.id, &ext);

        let mut round = 0;
        let end = if eval == WsmEval::Acceptable {
            CalibrationEnd::Acceptable
        } else {
            loop {
                if self.harness.cancel.is_cancelled() {
                    break CalibrationEnd::Cancelled;
                }
                if round >= self.settings.max_rounds {
                    tracing::info!(round, "round cap reached");
                    break CalibrationEnd::RoundLimit;
                }
                round += 1;
                clean_up(&self.work_dir, &ext, self.settings.save_losers);

                let main = incumbent.metrics.main();
                let (action, vectors) = if load_shapes {
                    let last = incumbent.vector.load_shape_scalar.unwrap_or(1.0);
                    let avg_peak_err = (main[0] + main[2]) / 2.0;
                    let vectors = load_shape_scalars(last, avg_peak_err)
                        .into_iter()
                        .map(|s| incumbent.vector.with_load_shape(s))
                        .collect::<Vec<_>>();
                    (LOAD_SHAPE_ACTION, vectors)
                } else {
                    match self.planner.decide(round, main, &self.record) {
                        Some(action) => {
                            let count = self.planner.count(action);
                            (action, candidates(action, count, &incumbent.vector, main))
                        }
                        None => break CalibrationEnd::OutOfOptions,
                    }
                };
                if vectors.is_empty() {
                    tracing::warn!(round, action, "action produced no new candidates");
                    self.planner.record_failure(action);
                    continue;
                }

                let named = vectors
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (format!("Calib_ID{round}_Config_ID{i}"), v))
                    .collect();
                let best = match self.evaluate(&mut logs, round, named)? {
                    RoundOutcome::Cancelled => break CalibrationEnd::Cancelled,
                    RoundOutcome::AllFailed => {
                        tracing::warn!(round, action, "every candidate failed");
                        let entry = RoundRecord {
                            round,
                            candidate_id: ALL_FAILED.to_string(),
                            wsm: Some(incumbent.wsm),
                            action,
                            eval: Some(WsmEval::NoImprovement),
                        };
                        logs.round(&entry, None)?;
                        self.record.push(entry);
                        if load_shapes {
                            break CalibrationEnd::LoadShapeDone;
                        }
                        self.planner.record_failure(action);
                        continue;
                    }
                    RoundOutcome::Scored(best) => best,
                };

                let eval = evaluate_wsm(best.wsm, &self.record, acceptable);
                let entry = RoundRecord {
                    round,
                    candidate_id: best.id.clone(),
                    wsm: Some(best.wsm),
                    action,
                    eval: Some(eval),
                };
                logs.round(&entry, Some(best.metrics.main()))?;
                self.record.push(entry);
                tracing::info!(round, candidate = %best.id, wsm = best.wsm, ?eval, "round finished");

                match eval {
                    WsmEval::NoImprovement => {
                        if !load_shapes {
                            self.planner.record_failure(action);
                        }
                    }
                    WsmEval::Improved | WsmEval::Acceptable => {
                        move_to_winners(&self.work_dir, &best.id, &ext);
                        incumbent = best;
                    }
                }
                if eval == WsmEval::Acceptable {
                    break CalibrationEnd::Acceptable;
                }
                if load_shapes {
                    break CalibrationEnd::LoadShapeDone;
                }
            }
        };
        clean_up(&self.work_dir, &ext, self.settings.save_losers);

        tracing::info!(best = %incumbent.id, wsm = incumbent.wsm, rounds = round, ?end, "calibration finished");
        Ok(CalibrationResult {
            config: self.candidate_config(&incumbent.vector),
            best_id: Some(incumbent.id),
            wsm: Some(incumbent.wsm),
            vector: incumbent.vector,
            metrics: Some(incumbent.metrics),
            rounds: round,
            end,
            record: self.record.clone(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use fdr_batch::CancelToken;
    use fdr_core::{Record, RecordKind};
    use fdr_io::scada::DayMetrics;
    use fdr_populate::{Knob, TechnologyCase};
    use std::os::unix::fs::PermissionsExt;

    /// Script writing a day of constant `watts` into the recorder file named
    /// in the model, with cumulative energy and a closing midnight row.
    /// `watts` is a shell arithmetic expression.
    fn day_script(watts: &str) -> String {
        format!(
            r##"out=$(sed -n 's/.*file \(csv_output\/.*network_node_recorder\.csv\);.*/\1/p' "$1" | head -n 1)
mkdir -p csv_output
w=$(({watts}))
step=$((w / 12))
echo "# fake recorder" > "$out"
i=0
while [ $i -lt 288 ]; do
  printf '2013-07-31 %02d:%02d:00 PDT,%d,%d\n' $((i / 12)) $((i % 12 * 5)) $w $((i * step)) >> "$out"
  i=$((i + 1))
done
printf '2013-08-01 00:00:00 PDT,%d,%d\n' $w $((288 * step)) >> "$out""##
        )
    }

    /// 1.2 MW all day, whatever the model.
    fn flat_day() -> String {
        day_script("1200000")
    }

    /// 120 kW per residential house in the model.
    fn per_house() -> String {
        day_script("120000 * $(grep -c 'groupid Residential;' \"$1\")")
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-sim.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn base(residential_va: &str) -> ObjectTree {
        vec![
            Record::new(RecordKind::Clock).with("timezone", "PST+8PDT"),
            Record::object("meter")
                .with("name", "n650")
                .with("bustype", "SWING")
                .with("phases", "ABCN")
                .with("nominal_voltage", "7200"),
            Record::object("node").with("name", "n1").with("phases", "ABCN").with("nominal_voltage", "7200"),
            Record::object("overhead_line").with("name", "l1").with("from", "n650").with("to", "n1"),
            Record::object("transformer").with("name", "SPCT1A").with("from", "n1").with("to", "tpm1A"),
            Record::object("triplex_meter")
                .with("name", "tpm1A")
                .with("phases", "AS")
                .with("nominal_voltage", "120"),
            Record::object("triplex_node")
                .with("name", "tpn1A")
                .with("parent", "tpm1A")
                .with("phases", "AS")
                .with("nominal_voltage", "120")
                .with("power_12", residential_va),
            Record::object("load")
                .with("name", "ld2")
                .with("parent", "n1")
                .with("phases", "ABCN")
                .with("nominal_voltage", "7200")
                .with("constant_power_A", "60000+10000j")
                .with("constant_power_B", "60000+10000j")
                .with("constant_power_C", "60000+10000j"),
        ]
        .into_iter()
        .collect()
    }

    /// SCADA of a flat day at `kw`.
    fn scada(kw: f64) -> ScadaReference {
        let day = DayMetrics { peak_kw: kw, peak_time_h: 0.0, total_kwh: kw * 24.0, min_kw: kw, min_time_h: 0.0 };
        ScadaReference::new(day, day, day).unwrap()
    }

    fn calibrator_for(dir: &Path, tree: ObjectTree, harness: SimulatorHarness, kw: f64, max_rounds: usize) -> Calibrator {
        let days = Scenario::parse_days("2013-07-31,2013-01-15,2013-04-10").unwrap();
        let scenario = Scenario::new("F1", 4, TechnologyCase::Base, days).unwrap();
        let settings = CalibrationSettings { max_rounds, ..CalibrationSettings::default() };
        Calibrator::new(
            tree,
            FeederConfig::default(),
            scenario,
            scada(kw),
            Weights::default(),
            settings,
            harness,
            dir.join("work"),
        )
    }

    fn calibrator(dir: &Path, body: &str, kw: f64, max_rounds: usize) -> Calibrator {
        let harness = SimulatorHarness::new(script(dir, body));
        calibrator_for(dir, base("40000+4000j"), harness, kw, max_rounds)
    }

    #[test]
    fn matching_output_is_accepted_at_round_zero() {
        let dir = tempfile::tempdir().unwrap();
        let result = calibrator(dir.path(), &flat_day(), 1200.0, 5).run().unwrap();
        assert_eq!(result.end, CalibrationEnd::Acceptable);
        assert_eq!(result.best_id.as_deref(), Some(DEFAULT_CANDIDATE));
        assert_eq!(result.wsm, Some(0.0));
        assert_eq!(result.rounds, 0);
        assert_eq!(result.record.len(), 1);
        assert_eq!(result.record[0].eval, Some(WsmEval::Acceptable));
        let work = dir.path().join("work");
        assert!(work.join("winners/DefaultCalibration_2013-07-31.glm").is_file());
        assert!(work.join("calibration_log.csv").is_file());
    }

    #[test]
    fn search_rounds_improve_until_acceptable() {
        // 150 kVA of residential load: avg_house 15000 gives 10 houses, the
        // SCADA day needs 13.
        let dir = tempfile::tempdir().unwrap();
        let harness = SimulatorHarness::new(script(dir.path(), &per_house()));
        let result = calibrator_for(dir.path(), base("150000"), harness, 1560.0, 10).run().unwrap();

        assert_eq!(result.end, CalibrationEnd::Acceptable);
        assert_eq!(result.rounds, 2);
        assert_eq!(result.wsm, Some(0.0));
        assert_eq!(result.vector.get(Knob::AvgHouse), 12000.0);
        assert_eq!(result.best_id.as_deref(), Some("Calib_ID2_Config_ID1"));

        let evals: Vec<_> = result.record.iter().map(|r| r.eval).collect();
        assert_eq!(evals, vec![Some(WsmEval::Improved), Some(WsmEval::Improved), Some(WsmEval::Acceptable)]);
        let scores: Vec<f64> = result.record.iter().filter_map(|r| r.wsm).collect();
        assert_eq!(scores.len(), 3);
        assert!(scores[1] < scores[0] && scores[2] < scores[1], "{scores:?}");
        assert!(result.record[1..].iter().all(|r| r.action == 1));
        assert!(dir.path().join("work/winners/Calib_ID1_Config_ID4_2013-07-31.glm").is_file());
    }

    #[test]
    fn failing_round_zero_is_a_simulator_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = calibrator(dir.path(), "exit 1", 1200.0, 5).run().unwrap_err();
        assert!(matches!(err.downcast_ref::<FdrError>(), Some(FdrError::Simulator(_))));
    }

    #[test]
    fn cancelling_before_round_zero_ends_without_an_incumbent() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let harness = SimulatorHarness::new(script(dir.path(), &flat_day())).with_cancel(cancel);
        let result = calibrator_for(dir.path(), base("40000+4000j"), harness, 1200.0, 5).run().unwrap();
        assert_eq!(result.end, CalibrationEnd::Cancelled);
        assert_eq!(result.best_id, None);
        assert_eq!(result.wsm, None);
        assert!(result.metrics.is_none());
        assert!(result.record.is_empty());
        assert!(result.vector.same_as(&ConfigVector::default()));
    }

    #[test]
    fn all_failed_round_keeps_the_incumbent() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("case \"$1\" in Calib_ID1_*) exit 1;; esac\n{}", flat_day());
        let result = calibrator(dir.path(), &body, 500.0, 1).run().unwrap();
        assert_eq!(result.end, CalibrationEnd::RoundLimit);
        assert_eq!(result.best_id.as_deref(), Some(DEFAULT_CANDIDATE));
        assert_eq!(result.record.len(), 2);
        assert!(result.record[1].all_failed());
        assert_eq!(result.record[1].eval, Some(WsmEval::NoImprovement));
        assert_eq!(result.record[1].wsm, result.wsm);
    }

    #[test]
    fn unchanged_scores_never_replace_the_incumbent() {
        let dir = tempfile::tempdir().unwrap();
        let result = calibrator(dir.path(), &flat_day(), 500.0, 3).run().unwrap();
        assert_eq!(result.best_id.as_deref(), Some(DEFAULT_CANDIDATE));
        assert!(matches!(result.end, CalibrationEnd::RoundLimit | CalibrationEnd::OutOfOptions));
        assert!(result.record[1..].iter().all(|r| r.eval == Some(WsmEval::NoImprovement)));
        assert!(result.wsm.unwrap() > DEFAULT_ACCEPTABLE);
    }

    #[test]
    fn settings_fill_defaults() {
        let settings: CalibrationSettings = toml::from_str("max_rounds = 7\nsave_losers = true").unwrap();
        assert_eq!(settings.max_rounds, 7);
        assert!(settings.save_losers);
        assert_eq!(settings.acceptable, DEFAULT_ACCEPTABLE);
        assert_eq!(settings.extension, "glm");
        assert!(CalibrationSettings { fail_limit: 0, ..settings }.validate().is_err());
    }
}
