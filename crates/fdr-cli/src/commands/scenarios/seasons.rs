use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use fdr_io::mdl;
use fdr_populate::{FeederConfig, TechnologyCase};
use fdr_scenarios::{write_season_files, Scenario};
use tabwriter::TabWriter;

use crate::commands::telemetry::record_run_timed;
use crate::commands::util::feeder_name;

pub fn handle(model: &Path, dates: &str, out_dir: &Path, id: &str, extension: &str) -> Result<()> {
    let start = Instant::now();
    let res = (|| -> Result<()> {
        let days = Scenario::parse_days(dates)?;
        let scenario = Scenario::new(feeder_name(model), FeederConfig::default().region, TechnologyCase::Base, days)?;
        let tree = mdl::read_file(model)?;
        let files = write_season_files(&tree, &scenario, id, out_dir, extension)?;

        let mut writer = TabWriter::new(io::stdout());
        writeln!(writer, "SEASON\tDAY\tMODEL\tRECORDER")?;
        for file in &files {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                file.season,
                file.day,
                file.path.display(),
                file.recorder.display()
            )?;
        }
        writer.flush()?;
        Ok(())
    })();
    record_run_timed(
        &out_dir.join(format!("{id}.{extension}")),
        "scenarios seasons",
        &[("model", &model.display().to_string()), ("dates", dates), ("id", id)],
        start,
        &res,
    );
    res
}
