use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build, calibrate and batch-run distribution feeder models", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read, reformat and inspect MDL model files
    Mdl {
        #[command(subcommand)]
        command: MdlCommands,
    },
    /// Import a feeder from other formats
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Populate a bare feeder network with houses, buildings and recorders
    Populate {
        /// Bare network model
        #[arg(value_hint = ValueHint::FilePath)]
        base: PathBuf,
        /// Populated model to write
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Feeder configuration dictionary (TOML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Technology case code (-1 load shapes, 0 base, 1 solar, 9 thermal storage, ...)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        case: i32,
        /// Climate region 1-6, overriding the configuration
        #[arg(long)]
        region: Option<u8>,
        /// Offset for the population random streams
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Seasonal run files and penetration studies
    Scenarios {
        #[command(subcommand)]
        command: ScenariosCommands,
    },
    /// Run models through the simulator
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
    /// Score recorder output (summer, winter, spring) against SCADA
    Metrics {
        /// Recorder CSVs in summer, winter, spring order
        #[arg(num_args = 3, required = true, value_hint = ValueHint::FilePath)]
        recorders: Vec<PathBuf>,
        /// SCADA reference CSV
        #[arg(long, value_hint = ValueHint::FilePath)]
        scada: PathBuf,
        /// WSM weights (TOML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        weights: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
    /// Calibrate a feeder against SCADA
    Calibrate {
        /// Bare network model
        #[arg(value_hint = ValueHint::FilePath)]
        base: PathBuf,
        /// SCADA reference CSV
        #[arg(long, value_hint = ValueHint::FilePath)]
        scada: PathBuf,
        /// Reference days as summer,winter,spring (YYYY-MM-DD)
        #[arg(long)]
        dates: String,
        /// Directory for candidate models, logs and winners
        #[arg(long, value_hint = ValueHint::DirPath)]
        work_dir: PathBuf,
        /// Feeder configuration dictionary (TOML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// WSM weights (TOML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        weights: Option<PathBuf>,
        /// Loop settings (TOML or JSON); flags below override it
        #[arg(long, value_hint = ValueHint::FilePath)]
        settings: Option<PathBuf>,
        /// Simulator executable
        #[arg(long, default_value = "gridlabd")]
        simulator: PathBuf,
        /// Per-round simulator timeout in seconds
        #[arg(long, default_value_t = 1200)]
        timeout: u64,
        #[arg(long)]
        max_rounds: Option<usize>,
        /// Keep losing models in losers/
        #[arg(long)]
        save_losers: bool,
        #[arg(long)]
        seed: Option<u64>,
        /// Technology case code
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        case: i32,
        /// Climate region 1-6, overriding the configuration
        #[arg(long)]
        region: Option<u8>,
        /// Feeder name used in logs; defaults to the base file stem
        #[arg(long)]
        feeder: Option<String>,
    },
    /// Recorded run manifests
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MdlCommands {
    /// Parse and re-print a model, keeping nested objects
    Fmt {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Hoist nested objects and inline configurations to the top level
    Deembed {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Count records per kind
    Stats {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportCommands {
    /// Convert a GIS CSV export into a feeder model
    Gis {
        /// Directory with source.csv, section.csv, ...
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Directory with the eq_*.csv tables, if not alongside the network tables
        #[arg(long, value_hint = ValueHint::DirPath)]
        equipment: Option<PathBuf>,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScenariosCommands {
    /// Write the summer, winter and spring models of a populated feeder
    Seasons {
        #[arg(value_hint = ValueHint::FilePath)]
        model: PathBuf,
        /// Reference days as summer,winter,spring (YYYY-MM-DD)
        #[arg(long)]
        dates: String,
        #[arg(long, value_hint = ValueHint::DirPath)]
        out_dir: PathBuf,
        /// Prefix of the generated file names
        #[arg(long, default_value = "run")]
        id: String,
        #[arg(long, default_value = "glm")]
        extension: String,
    },
    /// Generate a Monte-Carlo PV penetration study
    Study {
        /// Study description (YAML or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        spec: PathBuf,
        /// Run-season template; `{feeder}` is replaced per feeder
        #[arg(long, value_hint = ValueHint::FilePath)]
        template: PathBuf,
        #[arg(long, value_hint = ValueHint::DirPath)]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Simulate every model under a directory
    Run {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        #[arg(long, default_value = "gridlabd")]
        simulator: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Per-model timeout in seconds
        #[arg(long, default_value_t = 1200)]
        timeout: u64,
        /// Where batch_manifest.json goes; defaults to the model directory
        #[arg(long, value_hint = ValueHint::DirPath)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "glm")]
        extension: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// List recorded runs
    List {
        /// Root path to scan for run manifests
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Output format for the listing
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn negative_case_codes_parse() {
        let cli = Cli::try_parse_from(["fdr-cli", "populate", "base.glm", "--out", "x.glm", "--case", "-1"]).unwrap();
        match cli.command {
            Commands::Populate { case, .. } => assert_eq!(case, -1),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
