use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use fdr_io::mdl;
use fdr_populate::{populate_feeder, RecorderOptions, TechnologyCase};
use tabwriter::TabWriter;

use crate::commands::telemetry::record_run_timed;
use crate::commands::util::load_feeder_config;

pub fn handle(
    base: &Path,
    out: &Path,
    config: Option<&Path>,
    case: i32,
    region: Option<u8>,
    seed: Option<u64>,
) -> Result<()> {
    let start = Instant::now();
    let case = TechnologyCase::from_code(case);
    let res = (|| -> Result<()> {
        let config = load_feeder_config(config, region, seed)?;
        let tree = mdl::read_file(base)?;
        let output = populate_feeder(&tree, &config, case, RecorderOptions::all())?;
        mdl::write_file(&output.tree, out)?;

        let stats = &output.stats;
        let mut writer = TabWriter::new(io::stdout());
        writeln!(writer, "Populated {} (case {case}, region {}) into {}", base.display(), config.region, out.display())?;
        for (label, value) in [
            ("residential loads", stats.residential_loads),
            ("houses", stats.houses),
            ("pool pumps", stats.pool_pumps),
            ("water heaters", stats.water_heaters),
            ("commercial loads", stats.commercial_loads),
            ("offices", stats.offices),
            ("big boxes", stats.big_boxes),
            ("strip malls", stats.strip_malls),
            ("street lights", stats.street_lights),
            ("commercial zones", stats.commercial_zones),
            ("load shapes", stats.loadshapes),
            ("pv units", stats.pv_units),
            ("thermal storage", stats.thermal_storage),
            ("recorders", stats.recorders),
        ] {
            writeln!(writer, "{label}\t{value}")?;
        }
        writeln!(writer, "pv kW\t{:.1}", stats.pv_kw)?;
        writer.flush()?;
        if output.diagnostics.has_issues() {
            eprint!("{}", output.diagnostics);
        }
        Ok(())
    })();
    record_run_timed(
        out,
        "populate",
        &[
            ("base", &base.display().to_string()),
            ("config", &config.map(|p| p.display().to_string()).unwrap_or_default()),
            ("case", &case.to_string()),
            ("region", &region.map(|r| r.to_string()).unwrap_or_default()),
            ("seed", &seed.map(|s| s.to_string()).unwrap_or_default()),
        ],
        start,
        &res,
    );
    res
}
