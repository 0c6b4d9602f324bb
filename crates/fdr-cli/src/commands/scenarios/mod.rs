use anyhow::Result;
use fdr_cli::ScenariosCommands;

pub mod seasons;
pub mod study;

pub fn handle(command: &ScenariosCommands) -> Result<()> {
    match command {
        ScenariosCommands::Seasons {
            model,
            dates,
            out_dir,
            id,
            extension,
        } => seasons::handle(model, dates, out_dir, id, extension),
        ScenariosCommands::Study {
            spec,
            template,
            out_dir,
        } => study::handle(spec, template, out_dir),
    }
}
