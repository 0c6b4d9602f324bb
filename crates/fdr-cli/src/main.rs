use clap::Parser;
use fdr_cli::cli::{Cli, Commands, RunsCommands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod runs;
mod signal;

use commands::calibrate::CalibrateArgs;

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Mdl { command } => commands::mdl::handle(command),
        Commands::Import { command } => commands::import::handle(command),
        Commands::Populate {
            base,
            out,
            config,
            case,
            region,
            seed,
        } => commands::populate::handle(base, out, config.as_deref(), *case, *region, *seed),
        Commands::Scenarios { command } => commands::scenarios::handle(command),
        Commands::Batch { command } => commands::batch::handle(command),
        Commands::Metrics {
            recorders,
            scada,
            weights,
            format,
        } => commands::metrics::handle(recorders, scada, weights.as_deref(), *format),
        Commands::Calibrate {
            base,
            scada,
            dates,
            work_dir,
            config,
            weights,
            settings,
            simulator,
            timeout,
            max_rounds,
            save_losers,
            seed,
            case,
            region,
            feeder,
        } => commands::calibrate::handle(&CalibrateArgs {
            base,
            scada,
            dates,
            work_dir,
            config: config.as_deref(),
            weights: weights.as_deref(),
            settings: settings.as_deref(),
            simulator,
            timeout: *timeout,
            max_rounds: *max_rounds,
            save_losers: *save_losers,
            seed: *seed,
            case: *case,
            region: *region,
            feeder: feeder.as_deref(),
        }),
        Commands::Runs { command } => match command {
            RunsCommands::List { root, format } => commands::runs::handle(root, *format),
        },
        Commands::Completions { shell, out } => commands::completions::handle(*shell, out.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    if let Err(err) = run(&cli) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
