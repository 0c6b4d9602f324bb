use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;
use fdr_cli::ImportCommands;
use fdr_io::{import_gis, mdl};
use tabwriter::TabWriter;

use crate::commands::telemetry::record_run_timed;

pub fn handle(command: &ImportCommands) -> Result<()> {
    let ImportCommands::Gis { dir, equipment, out } = command;
    let start = Instant::now();
    let res = (|| -> Result<()> {
        tracing::info!(dir = %dir.display(), "importing GIS export");
        let result = import_gis(dir, equipment.as_deref())?;
        mdl::write_file(&result.tree, out)?;

        let stats = &result.stats;
        let mut writer = TabWriter::new(io::stdout());
        writeln!(writer, "Imported {} into {}", dir.display(), out.display())?;
        writeln!(writer, "swing\t{}", result.swing)?;
        writeln!(writer, "feeder voltage (V L-N)\t{:.1}", result.feeder_vln)?;
        writeln!(writer, "nodes\t{}", stats.nodes)?;
        writeln!(writer, "links\t{}", stats.links)?;
        writeln!(writer, "configurations\t{}", stats.configurations)?;
        writeln!(writer, "loads\t{}", stats.loads)?;
        writeln!(writer, "capacitors\t{}", stats.capacitors)?;
        writeln!(writer, "split devices\t{}", stats.split_devices)?;
        writeln!(writer, "parallel links\t{}", stats.parallel_links)?;
        writeln!(writer, "islanded nodes\t{}", stats.islanded_nodes)?;
        writer.flush()?;
        if result.diagnostics.has_issues() {
            eprint!("{}", result.diagnostics);
        }
        Ok(())
    })();
    record_run_timed(
        out,
        "import gis",
        &[
            ("dir", &dir.display().to_string()),
            ("equipment", &equipment.as_ref().map(|p| p.display().to_string()).unwrap_or_default()),
        ],
        start,
        &res,
    );
    res
}
