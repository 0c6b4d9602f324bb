//! Runs the external simulator over a set of models.
//!
//! All children of one round are started together and polled until they
//! exit, the round timeout expires or the cancel token fires. A run only
//! counts as successful when the simulator exited with 0 and left behind a
//! full day of recorder output.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fdr_io::recorder::verify_day_output;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMULATOR: &str = "gridlabd";
/// Twice the simulator's own default run limit of 600 s.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1200);
/// Exit code the simulator uses for a model it refuses to load.
pub const CONFIG_FAILURE_CODE: i32 = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared flag that stops a running round.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One model to simulate and the recorder output it must produce.
#[derive(Debug, Clone, PartialEq)]
pub struct SimRequest {
    pub model: PathBuf,
    pub recorder: Option<PathBuf>,
}

impl SimRequest {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self { model: model.into(), recorder: None }
    }

    pub fn expecting(mut self, recorder: impl Into<PathBuf>) -> Self {
        self.recorder = Some(recorder.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded { rows: usize },
    Failed { code: Option<i32> },
    /// The simulator rejected the model (exit code 2).
    ConfigFailure,
    BadOutput { reason: String },
    LaunchFailed { reason: String },
    Killed,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Succeeded { .. } => "ok",
            RunStatus::Failed { .. } => "failed",
            RunStatus::ConfigFailure => "config-failure",
            RunStatus::BadOutput { .. } => "bad-output",
            RunStatus::LaunchFailed { .. } => "launch-failed",
            RunStatus::Killed => "killed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub model: PathBuf,
    pub status: RunStatus,
    pub elapsed_ms: u64,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEnd {
    Completed,
    TimedOut,
    Cancelled,
}

/// Reports of one round, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRun {
    pub end: RoundEnd,
    pub reports: Vec<RunReport>,
}

impl RoundRun {
    pub fn successes(&self) -> usize {
        self.reports.iter().filter(|r| r.status.is_success()).count()
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorHarness {
    pub binary: PathBuf,
    pub timeout: Duration,
    pub cancel: CancelToken,
    pub defines: Vec<(String, String)>,
}

impl Default for SimulatorHarness {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATOR)
    }
}

struct Slot<'a> {
    request: &'a SimRequest,
    child: Option<Child>,
    status: Option<RunStatus>,
    stdout: PathBuf,
    stderr: PathBuf,
    started: Instant,
    elapsed: Duration,
}

impl Slot<'_> {
    fn finish(&mut self, status: RunStatus) {
        self.child = None;
        self.elapsed = self.started.elapsed();
        self.status = Some(status);
    }

    fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(err) = child.kill() {
                tracing::warn!(model = %self.request.model.display(), "failed to kill simulator: {err}");
            }
            let _ = child.wait();
            self.finish(RunStatus::Killed);
        }
    }

    fn report(self) -> RunReport {
        RunReport {
            model: self.request.model.clone(),
            status: self.status.unwrap_or(RunStatus::Killed),
            elapsed_ms: self.elapsed.as_millis() as u64,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Remove recorder output left over from an earlier run so only this run's
/// output can pass verification.
fn remove_stale_output(recorder: &Path) -> Result<()> {
    match fs::remove_file(recorder) {
        Ok(()) => {
            tracing::debug!(recorder = %recorder.display(), "removed stale recorder output");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing stale output {}", recorder.display())),
    }
}

fn output_paths(model: &Path) -> (PathBuf, PathBuf) {
    let stem = model.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let dir = model.parent().unwrap_or_else(|| Path::new(""));
    (dir.join(format!("{stem}.txt")), dir.join(format!("{stem}.err.txt")))
}

impl SimulatorHarness {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
            defines: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_define(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((key.into(), value.into()));
        self
    }

    fn spawn(&self, request: &SimRequest, stdout: &Path, stderr: &Path) -> Result<Child> {
        let dir = request.model.parent().filter(|p| !p.as_os_str().is_empty());
        let file = request
            .model
            .file_name()
            .with_context(|| format!("model path '{}' has no file name", request.model.display()))?;
        let out = File::create(stdout).with_context(|| format!("creating {}", stdout.display()))?;
        let err = File::create(stderr).with_context(|| format!("creating {}", stderr.display()))?;
        let mut command = Command::new(&self.binary);
        for (key, value) in &self.defines {
            command.arg("--define").arg(format!("{key}={value}"));
        }
        command.arg(file).stdin(Stdio::null()).stdout(out).stderr(err);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        command
            .spawn()
            .with_context(|| format!("launching {} for {}", self.binary.display(), request.model.display()))
    }

    fn classify(exit: ExitStatus, request: &SimRequest) -> RunStatus {
        match exit.code() {
            Some(0) => match &request.recorder {
                Some(recorder) => match verify_day_output(recorder) {
                    Ok(rows) => RunStatus::Succeeded { rows },
                    Err(err) => RunStatus::BadOutput { reason: err.to_string() },
                },
                None => RunStatus::Succeeded { rows: 0 },
            },
            Some(CONFIG_FAILURE_CODE) => RunStatus::ConfigFailure,
            code => RunStatus::Failed { code },
        }
    }

    /// Simulate every request concurrently and wait for the round to end.
    pub fn run_round(&self, requests: &[SimRequest]) -> RoundRun {
        let round_start = Instant::now();
        let mut slots: Vec<Slot> = requests
            .iter()
            .map(|request| {
                let (stdout, stderr) = output_paths(&request.model);
                let mut slot = Slot {
                    request,
                    child: None,
                    status: None,
                    stdout,
                    stderr,
                    started: Instant::now(),
                    elapsed: Duration::ZERO,
                };
                if self.cancel.is_cancelled() {
                    slot.finish(RunStatus::Killed);
                    return slot;
                }
                let launched = request
                    .recorder
                    .as_deref()
                    .map_or(Ok(()), remove_stale_output)
                    .and_then(|()| self.spawn(request, &slot.stdout, &slot.stderr));
                match launched {
                    Ok(child) => {
                        tracing::debug!(model = %request.model.display(), pid = child.id(), "simulator started");
                        slot.child = Some(child);
                    }
                    Err(err) => {
                        tracing::warn!("{err:#}");
                        slot.finish(RunStatus::LaunchFailed { reason: format!("{err:#}") });
                    }
                }
                slot
            })
            .collect();

        let end = loop {
            for slot in slots.iter_mut() {
                let Some(child) = slot.child.as_mut() else { continue };
                match child.try_wait() {
                    Ok(Some(exit)) => {
                        let status = Self::classify(exit, slot.request);
                        tracing::debug!(model = %slot.request.model.display(), status = status.label(), "simulator exited");
                        slot.finish(status);
                    }
                    Ok(None) => {}
                    Err(err) => slot.finish(RunStatus::LaunchFailed { reason: err.to_string() }),
                }
            }
            if slots.iter().all(|slot| slot.child.is_none()) {
                break if self.cancel.is_cancelled() { RoundEnd::Cancelled } else { RoundEnd::Completed };
            }
            if self.cancel.is_cancelled() {
                tracing::warn!("cancel requested; stopping simulator runs");
                slots.iter_mut().for_each(Slot::kill);
                break RoundEnd::Cancelled;
            }
            if round_start.elapsed() >= self.timeout {
                tracing::warn!(timeout_s = self.timeout.as_secs_f64(), "round timed out; killing simulator runs");
                slots.iter_mut().for_each(Slot::kill);
                break RoundEnd::TimedOut;
            }
            thread::sleep(POLL_INTERVAL);
        };

        RoundRun { end, reports: slots.into_iter().map(Slot::report).collect() }
    }

    /// Simulate a single model.
    pub fn run_one(&self, request: &SimRequest) -> RunReport {
        let mut run = self.run_round(std::slice::from_ref(request));
        run.reports.remove(0)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-sim.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn model(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "clock { timezone PST+8PDT; }\n").unwrap();
        path
    }

    const FULL_DAY: &str = "mkdir -p csv_output
i=0
while [ $i -lt 300 ]; do echo \"2013-07-31 00:00:00 PDT,1000,10\" >> csv_output/out.csv; i=$((i+1)); done
echo \"ran $@\"";

    #[test]
    fn full_day_output_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let harness = SimulatorHarness::new(script(dir.path(), FULL_DAY)).with_define("SEASON", "Summer");
        let request = SimRequest::new(model(dir.path(), "a.glm")).expecting(dir.path().join("csv_output/out.csv"));
        let report = harness.run_one(&request);
        assert_eq!(report.status, RunStatus::Succeeded { rows: 300 });
        let stdout = fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert!(stdout.contains("--define SEASON=Summer a.glm"), "{stdout}");
        assert!(dir.path().join("a.err.txt").is_file());
    }

    #[test]
    fn short_output_and_exit_codes_fail() {
        let dir = tempfile::tempdir().unwrap();
        let short = SimulatorHarness::new(script(dir.path(), "mkdir -p csv_output; echo x > csv_output/out.csv"));
        let request = SimRequest::new(model(dir.path(), "a.glm")).expecting(dir.path().join("csv_output/out.csv"));
        assert!(matches!(short.run_one(&request).status, RunStatus::BadOutput { .. }));

        let rejected = SimulatorHarness::new(script(dir.path(), "exit 2"));
        assert_eq!(rejected.run_one(&request).status, RunStatus::ConfigFailure);

        let crashed = SimulatorHarness::new(script(dir.path(), "exit 7"));
        assert_eq!(crashed.run_one(&request).status, RunStatus::Failed { code: Some(7) });
    }

    #[test]
    fn leftover_output_does_not_pass_a_silent_run() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = dir.path().join("csv_output/out.csv");
        let full = SimulatorHarness::new(script(dir.path(), FULL_DAY));
        let request = SimRequest::new(model(dir.path(), "a.glm")).expecting(&recorder);
        assert!(full.run_one(&request).status.is_success());
        assert!(recorder.is_file());

        let silent = SimulatorHarness::new(script(dir.path(), "exit 0"));
        assert!(matches!(silent.run_one(&request).status, RunStatus::BadOutput { .. }));
        assert!(!recorder.exists());
    }

    #[test]
    fn missing_binary_is_a_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let harness = SimulatorHarness::new(dir.path().join("no-such-simulator"));
        let run = harness.run_round(&[SimRequest::new(model(dir.path(), "a.glm"))]);
        assert_eq!(run.end, RoundEnd::Completed);
        assert!(matches!(run.reports[0].status, RunStatus::LaunchFailed { .. }));
    }

    #[test]
    fn slow_round_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let harness =
            SimulatorHarness::new(script(dir.path(), "sleep 5")).with_timeout(Duration::from_millis(200));
        let requests = [SimRequest::new(model(dir.path(), "a.glm")), SimRequest::new(model(dir.path(), "b.glm"))];
        let run = harness.run_round(&requests);
        assert_eq!(run.end, RoundEnd::TimedOut);
        assert!(run.reports.iter().all(|r| r.status == RunStatus::Killed));
        assert_eq!(run.successes(), 0);
    }

    #[test]
    fn cancelled_token_stops_the_round() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let harness = SimulatorHarness::new(script(dir.path(), "sleep 5")).with_cancel(cancel.clone());
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            cancel.cancel();
        });
        let run = harness.run_round(&[SimRequest::new(model(dir.path(), "a.glm"))]);
        trigger.join().unwrap();
        assert_eq!(run.end, RoundEnd::Cancelled);
        assert_eq!(run.reports[0].status, RunStatus::Killed);
    }
}
