use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fdr_core::{FdrError, ObjectTree, Record, RecordKind, Season};
use fdr_io::mdl;
use fdr_populate::recorders::{recorder_file, NETWORK_RECORDER};
use serde::{Deserialize, Serialize};

use crate::scenario::{clock_window, ClockWindow, Scenario};

pub const DEFAULT_EXTENSION: &str = "glm";

/// One per-season model written for a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonFile {
    pub season: Season,
    pub day: NaiveDate,
    pub window: ClockWindow,
    /// Model file passed to the simulator
    pub path: PathBuf,
    /// Network-node recorder output the simulator will write
    pub recorder: PathBuf,
}

/// File stem of a candidate's model for `day`.
pub fn season_stem(candidate_id: &str, day: NaiveDate) -> String {
    format!("{candidate_id}_{}", day.format("%Y-%m-%d"))
}

/// Set the clock of `tree` to `window`, adding a clock record if absent.
pub fn set_clock(tree: &mut ObjectTree, window: &ClockWindow) {
    let existing = tree.iter().find(|(_, r)| r.kind == RecordKind::Clock).map(|(k, _)| k);
    let key = match existing {
        Some(key) => key,
        None => tree.push(Record::new(RecordKind::Clock)),
    };
    if let Some(clock) = tree.get_mut(key) {
        clock.set("starttime", format!("'{}'", window.start_str()));
        clock.set("stoptime", format!("'{}'", window.stop_str()));
    }
}

/// Point the network-node recorder at `file`, recording from the start of
/// the reference day.
pub fn set_recorder_file(tree: &mut ObjectTree, file: &str, window: &ClockWindow) -> Result<()> {
    let recorder = tree
        .by_name_mut(NETWORK_RECORDER)
        .ok_or_else(|| FdrError::MissingReference(NETWORK_RECORDER.to_string()))?;
    recorder.set("file", file);
    recorder.set("in", format!("'{}'", window.record_start_str()));
    Ok(())
}

/// Write the summer, winter and spring models of one candidate into `dir`.
pub fn write_season_files(
    tree: &ObjectTree,
    scenario: &Scenario,
    candidate_id: &str,
    dir: &Path,
    extension: &str,
) -> Result<Vec<SeasonFile>> {
    let mut files = Vec::with_capacity(3);
    for (season, day) in scenario.days() {
        let stem = season_stem(candidate_id, day);
        let window = clock_window(day);
        let recorder = recorder_file(&stem, "network_node_recorder");
        let mut model = tree.clone();
        set_clock(&mut model, &window);
        set_recorder_file(&mut model, &recorder, &window)
            .with_context(|| format!("preparing {season} model for {candidate_id}"))?;
        let path = dir.join(format!("{stem}.{extension}"));
        mdl::write_file(&model, &path)?;
        tracing::debug!(path = %path.display(), %season, "wrote season model");
        files.push(SeasonFile { season, day, window, path, recorder: dir.join(recorder) });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_populate::TechnologyCase;

    fn tree() -> ObjectTree {
        vec![
            Record::new(RecordKind::Clock)
                .with("timezone", "PST+8PDT")
                .with("starttime", "'2000-01-01 00:00:00'"),
            Record::object("meter").with("name", "network_node").with("bustype", "SWING"),
            Record::object("recorder")
                .with("name", NETWORK_RECORDER)
                .with("parent", "network_node")
                .with("file", "csv_output/0_network_node_recorder.csv"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn writes_three_models_with_their_windows() {
        let dir = tempfile::tempdir().unwrap();
        let days = Scenario::parse_days("2013-07-31,2013-01-15,2013-04-10").unwrap();
        let scenario = Scenario::new("F1", 4, TechnologyCase::Base, days).unwrap();
        let files = write_season_files(&tree(), &scenario, "Calib_ID0_Config_ID0", dir.path(), "glm").unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[1].season, Season::Winter);
        assert!(files[0].path.ends_with("Calib_ID0_Config_ID0_2013-07-31.glm"));
        assert!(files[0].recorder.ends_with("csv_output/Calib_ID0_Config_ID0_2013-07-31_network_node_recorder.csv"));

        let written = mdl::read_file(&files[0].path).unwrap();
        let clock = written.iter().find(|(_, r)| r.kind == RecordKind::Clock).unwrap().1;
        assert_eq!(clock.get("starttime"), Some("'2013-07-30 00:00:00'"));
        assert_eq!(clock.get("stoptime"), Some("'2013-08-01 00:00:00'"));
        assert_eq!(clock.get("timezone"), Some("PST+8PDT"));
        let recorder = written.by_name(NETWORK_RECORDER).unwrap();
        assert_eq!(recorder.get("in"), Some("'2013-07-31 00:00:00'"));
    }

    #[test]
    fn missing_recorder_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let days = Scenario::parse_days("2013-07-31,2013-01-15,2013-04-10").unwrap();
        let scenario = Scenario::new("F1", 4, TechnologyCase::Base, days).unwrap();
        let bare: ObjectTree = vec![Record::object("node").with("name", "n1")].into_iter().collect();
        let err = write_season_files(&bare, &scenario, "c", dir.path(), "glm").unwrap_err();
        assert!(format!("{err:#}").contains(NETWORK_RECORDER));
    }
}
