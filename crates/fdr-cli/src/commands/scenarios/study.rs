use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use fdr_scenarios::study::MANIFEST_FILE;
use fdr_scenarios::{generate_study, load_spec_from_path};

use crate::commands::telemetry::record_run_timed;

pub fn handle(spec: &Path, template: &Path, out_dir: &Path) -> Result<()> {
    let start = Instant::now();
    let mut case_count = 0;
    let res = (|| -> Result<()> {
        let set = load_spec_from_path(spec)?;
        let manifest = generate_study(&set, template, out_dir)?;
        case_count = manifest.cases.len();
        println!(
            "Generated {} study cases for {} feeder(s) into {}",
            case_count,
            set.feeders.len(),
            out_dir.display()
        );
        for file in &manifest.batch_files {
            println!("  {file}");
        }
        Ok(())
    })();
    record_run_timed(
        &out_dir.join(MANIFEST_FILE),
        "scenarios study",
        &[
            ("spec", &spec.display().to_string()),
            ("template", &template.display().to_string()),
            ("num_cases", &case_count.to_string()),
        ],
        start,
        &res,
    );
    res
}
