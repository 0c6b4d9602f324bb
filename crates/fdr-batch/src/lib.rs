pub mod harness;
pub mod job;
pub mod manifest;
pub mod runner;

pub use harness::{CancelToken, RoundEnd, RoundRun, RunReport, RunStatus, SimRequest, SimulatorHarness};
pub use job::{discover_jobs, BatchJob, BatchJobRecord};
pub use manifest::{load_batch_manifest, write_batch_manifest, BatchManifest};
pub use runner::{run_batch, BatchRunnerConfig, BatchSummary};
