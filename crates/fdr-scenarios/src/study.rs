//! Monte-Carlo PV penetration studies.
//!
//! For every feeder, penetration level and case index the generator writes
//! an edited copy of the feeder's run-season template, a violation recorder
//! include and (for nonzero penetration) freshly allocated residential and
//! commercial PV includes. The resulting runs are spread over per-core
//! batch scripts.
//!
//! ```text
//! out_dir/
//!   study_manifest.json
//!   new_run_all.bat                        # start new_run_core_k.bat
//!   new_run_core_0.bat ...
//!   F_10pct_case_0_run_season.glm          # edited template
//!   F_10pct_case_0_violation_object.glm
//!   F_10pct_case_0_residential_solar.glm
//!   F_10pct_case_0_commercial_solar.glm
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use fdr_core::{Diagnostics, FdrError, ObjectTree, Record};
use fdr_io::mdl;
use fdr_populate::commercial::{CommercialSite, DEFAULT_BUILDING_TYPE};
use fdr_populate::residential::HomeSite;
use fdr_populate::solar;
use fdr_populate::{TechParameters, TechnologyCase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "study_manifest.json";
pub const RUN_ALL_FILE: &str = "new_run_all.bat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub version: Option<u32>,
    pub feeders: Vec<String>,
    #[serde(default)]
    pub lookups: FeederLookups,
    #[serde(default = "default_penetrations")]
    pub penetration_levels: Vec<u32>,
    #[serde(default = "default_cases")]
    pub cases_per_level: usize,
    #[serde(default = "default_cores")]
    pub cores: usize,
    #[serde(default)]
    pub files: TemplateFiles,
    #[serde(default = "default_simulator")]
    pub simulator: String,
    #[serde(default = "default_seasons")]
    pub seasons: Vec<String>,
    /// Share of each case's PV target placed on homes
    #[serde(default = "default_residential_share")]
    pub pv_residential_share: f64,
}

/// Per-feeder values the study cannot derive from the models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeederLookups {
    #[serde(default)]
    pub trip_current: BTreeMap<String, f64>,
    #[serde(default)]
    pub substation_breaker: BTreeMap<String, String>,
    #[serde(default)]
    pub peak_kva: BTreeMap<String, f64>,
    #[serde(default)]
    pub existing_pv_kw: BTreeMap<String, f64>,
}

/// File names of a feeder's models; `{feeder}` is replaced by its name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFiles {
    pub feeder_glm: String,
    pub house_glm: String,
    pub commercial_glm: String,
}

impl Default for TemplateFiles {
    fn default() -> Self {
        Self {
            feeder_glm: "{feeder}.glm".into(),
            house_glm: "{feeder}_houses.glm".into(),
            commercial_glm: "{feeder}_commercial.glm".into(),
        }
    }
}

fn default_penetrations() -> Vec<u32> {
    (10..=100).step_by(5).collect()
}

fn default_cases() -> usize {
    50
}

fn default_cores() -> usize {
    1
}

fn default_simulator() -> String {
    "gridlabd".into()
}

fn default_seasons() -> Vec<String> {
    ["Summer", "Fall", "Winter", "Spring"].map(String::from).to_vec()
}

fn default_residential_share() -> f64 {
    0.5
}

/// The lookup values of one feeder.
#[derive(Debug, Clone, PartialEq)]
pub struct FeederLimits {
    pub trip_current: f64,
    pub substation_breaker: String,
    pub peak_kva: f64,
    pub existing_pv_kw: f64,
}

impl FeederLookups {
    /// All lookup values for `feeder`; any missing entry is fatal.
    pub fn limits(&self, feeder: &str) -> Result<FeederLimits> {
        let missing = |table: &str| FdrError::Config(format!("no {table} entry for feeder '{feeder}'"));
        Ok(FeederLimits {
            trip_current: *self.trip_current.get(feeder).ok_or_else(|| missing("trip_current"))?,
            substation_breaker: self
                .substation_breaker
                .get(feeder)
                .cloned()
                .ok_or_else(|| missing("substation_breaker"))?,
            peak_kva: *self.peak_kva.get(feeder).ok_or_else(|| missing("peak_kva"))?,
            existing_pv_kw: *self.existing_pv_kw.get(feeder).ok_or_else(|| missing("existing_pv_kw"))?,
        })
    }
}

pub fn load_spec_from_path(path: &Path) -> Result<ScenarioSet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading scenario spec '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing scenario spec yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing scenario spec json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing scenario spec"),
    }
}

pub fn validate(set: &ScenarioSet) -> Result<()> {
    if set.feeders.is_empty() {
        return Err(anyhow!("scenario set lists no feeders"));
    }
    if set.cores == 0 {
        return Err(anyhow!("cores must be at least 1"));
    }
    if set.seasons.is_empty() {
        return Err(anyhow!("scenario set lists no seasons"));
    }
    for feeder in &set.feeders {
        set.lookups.limits(feeder)?;
    }
    Ok(())
}

/// Prefix shared by every file of one study case.
pub fn case_prefix(feeder: &str, penetration: u32, case: usize) -> String {
    format!("{feeder}_{penetration}pct_case_{case}")
}

fn fill(template: &str, feeder: &str) -> String {
    template.replace("{feeder}", feeder)
}

/// Violation recorder for one study case.
pub fn violation_recorder(limits: &FeederLimits, penetration: u32, case: usize) -> Record {
    let trip = format!("{}", limits.trip_current);
    Record::object("violation_recorder")
        .with("file", format!("Violation_Log_${{SEASON}}_{penetration}pct_Case_{case}.csv"))
        .with("summary", format!("Violation_Summary_${{SEASON}}_{penetration}pct_Case_{case}.csv"))
        .with("interval", "60")
        .with("strict", "false")
        .with("echo", "false")
        .with("violation_flag", "ALLVIOLATIONS")
        .with("xfrmr_thermal_limit_upper", "2")
        .with("xfrmr_thermal_limit_lower", "0")
        .with("line_thermal_limit_upper", "1")
        .with("line_thermal_limit_lower", "0")
        .with("node_instantaneous_voltage_limit_upper", "1.1")
        .with("node_instantaneous_voltage_limit_lower", "0")
        .with("node_continuous_voltage_limit_upper", "1.05")
        .with("node_continuous_voltage_limit_lower", "0.95")
        .with("node_continuous_voltage_interval", "300")
        .with("substation_breaker_A_limit", trip.clone())
        .with("substation_breaker_B_limit", trip.clone())
        .with("substation_breaker_C_limit", trip)
        .with("virtual_substation", limits.substation_breaker.clone())
        .with("inverter_v_chng_per_interval_upper_bound", "0.050")
        .with("inverter_v_chng_per_interval_lower_bound", "-0.050")
        .with("inverter_v_chng_interval", "60")
        .with("secondary_dist_voltage_rise_upper_limit", "0.025")
        .with("secondary_dist_voltage_rise_lower_limit", "-0.042")
        .with("substation_pf_lower_limit", "0.85")
        .with("violation_delay", "10800")
}

/// Include names a run-season template is rewritten with.
#[derive(Debug, Clone)]
pub struct RunSeasonEdit {
    pub feeder_glm: String,
    pub house_glm: String,
    pub commercial_glm: String,
    pub prefix: String,
    pub with_solar: bool,
}

/// Rewrite a run-season template for one study case.
pub fn edit_run_season(template: &str, edit: &RunSeasonEdit) -> String {
    let include = |file: &str| format!("#include \"{file}\"");
    let feeder_line = include(&edit.feeder_glm);
    let house_line = include(&edit.house_glm);
    let commercial_line = include(&edit.commercial_glm);
    let mut out = String::with_capacity(template.len() + 256);
    for line in template.lines() {
        let trimmed = line.trim();
        if trimmed.contains(&feeder_line) {
            let _ = writeln!(out, "{}", include(&format!("{}_{}", edit.prefix, edit.feeder_glm)));
            let _ = writeln!(out, "{}", include(&format!("{}_violation_object.glm", edit.prefix)));
        } else if trimmed.contains(&commercial_line) {
            let _ = writeln!(out, "{}", include(&format!("{}_{}", edit.prefix, edit.commercial_glm)));
            if edit.with_solar {
                let _ = writeln!(out, "{}", include(&format!("{}_commercial_solar.glm", edit.prefix)));
            }
        } else if trimmed.contains(&house_line) {
            let _ = writeln!(out, "{line}");
            if edit.with_solar {
                let _ = writeln!(out, "{}", include(&format!("{}_residential_solar.glm", edit.prefix)));
            }
        } else if let Some(value) = trimmed.strip_prefix("file ${SEASON}") {
            let value = value.trim_end_matches(';');
            let _ = writeln!(out, "    file ${{PEN_LEV}}pct_Case_${{CASE}}_${{SEASON}}{value};");
        } else {
            let _ = writeln!(out, "{line}");
        }
    }
    out
}

/// Split `jobs` over `cores`; the first `jobs % cores` cores take one extra.
pub fn split_across_cores(jobs: usize, cores: usize) -> Vec<Range<usize>> {
    let cores = cores.max(1);
    let base = jobs / cores;
    let extra = jobs % cores;
    let mut ranges = Vec::with_capacity(cores);
    let mut start = 0;
    for core in 0..cores {
        let len = base + usize::from(core < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// One generated study run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyCase {
    pub feeder: String,
    pub penetration: u32,
    pub case: usize,
    /// PV to place in kW after existing PV is subtracted
    pub target_kw: f64,
    pub run_file: String,
    pub core: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyManifest {
    pub study_id: String,
    pub generated_at: DateTime<Utc>,
    pub cases: Vec<StudyCase>,
    pub batch_files: Vec<String>,
}

/// Homes (house under a triplex meter) of a populated residential model.
pub fn homes_in(tree: &ObjectTree) -> Vec<HomeSite> {
    tree.iter()
        .filter(|(_, r)| r.is_object("house"))
        .filter_map(|(_, house)| {
            let meter = tree.by_name(house.parent()?)?;
            if !meter.is_object("triplex_meter") {
                return None;
            }
            Some(HomeSite {
                meter: meter.name()?.to_string(),
                house: house.name()?.to_string(),
                phases: meter.get("phases").unwrap_or("AS").to_string(),
                floor_area: house.get("floor_area").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                care: house.get("care").is_some_and(|v| v.eq_ignore_ascii_case("true")),
                usage_bin: None,
            })
        })
        .collect()
}

/// Commercial service meters of a populated commercial model.
pub fn commercial_sites_in(tree: &ObjectTree) -> Vec<CommercialSite> {
    tree.iter()
        .filter(|(_, r)| r.get("groupid") == Some("Commercial_Meter"))
        .filter_map(|(_, meter)| {
            Some(CommercialSite {
                meter: meter.name()?.to_string(),
                phases: meter.get("phases").unwrap_or("ABCN").to_string(),
                nominal_voltage: meter.get("nominal_voltage").and_then(|v| v.parse().ok()).unwrap_or(120.0),
                building_type: meter
                    .get("building_type")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_BUILDING_TYPE),
            })
        })
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<ObjectTree>> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "model not found; skipping");
        return Ok(None);
    }
    mdl::read_file(path).map(Some)
}

/// Models of one feeder the per-case PV allocation draws from.
struct FeederModels {
    homes: Vec<HomeSite>,
    sites: Vec<CommercialSite>,
}

fn write_solar(
    out_dir: &Path,
    prefix: &str,
    models: &FeederModels,
    target_kw: f64,
    share: f64,
    seed: u64,
) -> Result<Diagnostics> {
    let tech = TechParameters::for_case(TechnologyCase::SolarCombined);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut diagnostics = Diagnostics::new();

    let units = solar::allocate_residential(&models.homes, target_kw * share, &mut rng, &mut diagnostics);
    let mut tree = ObjectTree::new();
    solar::emit_residential(&mut tree, &units, &tech, &mut rng);
    mdl::write_file(&tree, &out_dir.join(format!("{prefix}_residential_solar.glm")))?;

    let units = solar::allocate_commercial(&models.sites, target_kw * (1.0 - share), &mut rng, &mut diagnostics);
    let mut tree = ObjectTree::new();
    solar::emit_commercial(&mut tree, &units, &tech);
    mdl::write_file(&tree, &out_dir.join(format!("{prefix}_commercial_solar.glm")))?;
    Ok(diagnostics)
}

fn copy_model(source: &Path, target: &Path) -> Result<()> {
    if source.is_file() {
        fs::copy(source, target)
            .with_context(|| format!("copying {} to {}", source.display(), target.display()))?;
    } else {
        tracing::warn!(path = %source.display(), "model not found; run file will reference a missing include");
    }
    Ok(())
}

/// Generate every study case and the batch scripts that run them.
///
/// `template` may contain `{feeder}`; the feeder models are looked up next
/// to the resolved template.
pub fn generate_study(set: &ScenarioSet, template: &Path, out_dir: &Path) -> Result<StudyManifest> {
    validate(set)?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating study output directory '{}'", out_dir.display()))?;

    let mut cases = Vec::new();
    for feeder in &set.feeders {
        let limits = set.lookups.limits(feeder)?;
        let template_path = PathBuf::from(fill(&template.to_string_lossy(), feeder));
        let source_dir = template_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let template_name = template_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("template path '{}' has no file name", template_path.display()))?;
        let template_text = fs::read_to_string(&template_path)
            .with_context(|| format!("reading run-season template '{}'", template_path.display()))?;

        let feeder_glm = fill(&set.files.feeder_glm, feeder);
        let house_glm = fill(&set.files.house_glm, feeder);
        let commercial_glm = fill(&set.files.commercial_glm, feeder);
        let models = FeederModels {
            homes: read_optional(&source_dir.join(&house_glm))?.map(|t| homes_in(&t)).unwrap_or_default(),
            sites: read_optional(&source_dir.join(&commercial_glm))?
                .map(|t| commercial_sites_in(&t))
                .unwrap_or_default(),
        };
        tracing::info!(feeder = %feeder, homes = models.homes.len(), sites = models.sites.len(), "generating study");

        for &penetration in &set.penetration_levels {
            let target_kw = limits.peak_kva * f64::from(penetration) / 100.0 - limits.existing_pv_kw;
            for case in 0..set.cases_per_level {
                let prefix = case_prefix(feeder, penetration, case);
                let violation: ObjectTree =
                    std::iter::once(violation_recorder(&limits, penetration, case)).collect();
                mdl::write_file(&violation, &out_dir.join(format!("{prefix}_violation_object.glm")))?;

                let edit = RunSeasonEdit {
                    feeder_glm: feeder_glm.clone(),
                    house_glm: house_glm.clone(),
                    commercial_glm: commercial_glm.clone(),
                    prefix: prefix.clone(),
                    with_solar: penetration != 0,
                };
                let run_file = format!("{prefix}_{template_name}");
                fs::write(out_dir.join(&run_file), edit_run_season(&template_text, &edit))
                    .with_context(|| format!("writing run file '{run_file}'"))?;
                copy_model(&source_dir.join(&feeder_glm), &out_dir.join(format!("{prefix}_{feeder_glm}")))?;
                copy_model(
                    &source_dir.join(&commercial_glm),
                    &out_dir.join(format!("{prefix}_{commercial_glm}")),
                )?;

                if penetration != 0 {
                    let seed = u64::from(penetration) * 1000 + case as u64;
                    let diagnostics =
                        write_solar(out_dir, &prefix, &models, target_kw.max(0.0), set.pv_residential_share, seed)?;
                    if diagnostics.has_issues() {
                        tracing::warn!(case = %prefix, "{}", diagnostics.summary());
                    }
                }
                cases.push(StudyCase {
                    feeder: feeder.clone(),
                    penetration,
                    case,
                    target_kw,
                    run_file,
                    core: 0,
                });
            }
        }
    }

    let batch_files = write_batch_scripts(set, &mut cases, out_dir)?;
    let manifest = StudyManifest {
        study_id: uuid::Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        cases,
        batch_files,
    };
    write_manifest(&out_dir.join(MANIFEST_FILE), &manifest)?;
    Ok(manifest)
}

/// Simulator invocation lines for one case.
pub fn batch_lines(set: &ScenarioSet, case: &StudyCase) -> String {
    let prefix = case_prefix(&case.feeder, case.penetration, case.case);
    let mut out = String::new();
    for season in &set.seasons {
        let _ = writeln!(
            out,
            "{} --define SEASON={season} --define CASE={} --define PEN_LEV={} {} > {prefix}_run_{}.txt 2>&1",
            set.simulator,
            case.case,
            case.penetration,
            case.run_file,
            season.to_ascii_lowercase()
        );
    }
    out
}

fn write_batch_scripts(set: &ScenarioSet, cases: &mut [StudyCase], out_dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut run_all = String::new();
    for (core, range) in split_across_cores(cases.len(), set.cores).into_iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        let name = format!("new_run_core_{core}.bat");
        let mut text = String::new();
        for case in &mut cases[range] {
            case.core = core;
            text.push_str(&batch_lines(set, case));
        }
        fs::write(out_dir.join(&name), text).with_context(|| format!("writing batch script '{name}'"))?;
        let _ = writeln!(run_all, "start {name}");
        files.push(name);
    }
    fs::write(out_dir.join(RUN_ALL_FILE), run_all)
        .with_context(|| format!("writing batch script '{RUN_ALL_FILE}'"))?;
    files.push(RUN_ALL_FILE.to_string());
    Ok(files)
}

pub fn write_manifest(path: &Path, manifest: &StudyManifest) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating study manifest '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)
        .with_context(|| format!("writing study manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<StudyManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening study manifest '{}'", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("parsing study manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
feeders: [Homer]
penetration_levels: [0, 10]
cases_per_level: 3
cores: 2
lookups:
  trip_current: { Homer: 300 }
  substation_breaker: { Homer: "line_08640" }
  peak_kva: { Homer: 2951.41 }
  existing_pv_kw: { Homer: 16.8 }
"#;

    const TEMPLATE: &str = "\
#include \"Homer.glm\"
#include \"Homer_houses.glm\"
#include \"Homer_commercial.glm\"
object recorder {
    file ${SEASON}_substation.csv;
};
";

    fn spec() -> ScenarioSet {
        serde_yaml::from_str(SPEC).unwrap()
    }

    #[test]
    fn cores_take_remainder_first() {
        assert_eq!(split_across_cores(7, 3), vec![0..3, 3..5, 5..7]);
        assert_eq!(split_across_cores(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
        assert_eq!(split_across_cores(6, 0), vec![0..6]);
    }

    #[test]
    fn defaults_fill_in() {
        let set: ScenarioSet = serde_yaml::from_str("feeders: [A]").unwrap();
        assert_eq!(set.penetration_levels.len(), 19);
        assert_eq!(set.penetration_levels[0], 10);
        assert_eq!(set.cases_per_level, 50);
        assert_eq!(set.seasons.len(), 4);
        assert!(validate(&set).is_err());
    }

    #[test]
    fn missing_lookup_is_a_config_error() {
        let mut set = spec();
        set.lookups.peak_kva.clear();
        let err = validate(&set).unwrap_err();
        assert!(err.to_string().contains("peak_kva"), "{err}");
    }

    #[test]
    fn template_edit_rewrites_includes_and_outputs() {
        let edit = RunSeasonEdit {
            feeder_glm: "Homer.glm".into(),
            house_glm: "Homer_houses.glm".into(),
            commercial_glm: "Homer_commercial.glm".into(),
            prefix: "Homer_10pct_case_2".into(),
            with_solar: true,
        };
        let text = edit_run_season(TEMPLATE, &edit);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#include \"Homer_10pct_case_2_Homer.glm\"");
        assert_eq!(lines[1], "#include \"Homer_10pct_case_2_violation_object.glm\"");
        assert_eq!(lines[2], "#include \"Homer_houses.glm\"");
        assert_eq!(lines[3], "#include \"Homer_10pct_case_2_residential_solar.glm\"");
        assert_eq!(lines[4], "#include \"Homer_10pct_case_2_Homer_commercial.glm\"");
        assert_eq!(lines[5], "#include \"Homer_10pct_case_2_commercial_solar.glm\"");
        assert!(text.contains("file ${PEN_LEV}pct_Case_${CASE}_${SEASON}_substation.csv;"));
    }

    #[test]
    fn violation_recorder_uses_feeder_limits() {
        let limits = spec().lookups.limits("Homer").unwrap();
        let record = violation_recorder(&limits, 25, 4);
        assert_eq!(record.get("substation_breaker_B_limit"), Some("300"));
        assert_eq!(record.get("virtual_substation"), Some("line_08640"));
        assert_eq!(record.get("file"), Some("Violation_Log_${SEASON}_25pct_Case_4.csv"));
    }

    #[test]
    fn generates_cases_and_batch_scripts() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let template = src.path().join("run_season.glm");
        fs::write(&template, TEMPLATE).unwrap();
        // Six homes spread over every usage sextile; the smallest lands in
        // bin 1, which never draws PV.
        let houses: String = (1..=6)
            .map(|i| {
                format!(
                    "object triplex_meter {{ name tm{i}; phases AS; }};\n\
                     object house {{ name h{i}; parent tm{i}; floor_area {}; }};\n",
                    1000 + 200 * i
                )
            })
            .collect();
        fs::write(src.path().join("Homer_houses.glm"), houses).unwrap();

        let manifest = generate_study(&spec(), &template, out.path()).unwrap();
        assert_eq!(manifest.cases.len(), 6);
        assert_eq!(manifest.batch_files, vec!["new_run_core_0.bat", "new_run_core_1.bat", RUN_ALL_FILE]);
        let run_all = fs::read_to_string(out.path().join(RUN_ALL_FILE)).unwrap();
        assert_eq!(run_all, "start new_run_core_0.bat\nstart new_run_core_1.bat\n");
        let core0 = fs::read_to_string(out.path().join("new_run_core_0.bat")).unwrap();
        assert_eq!(core0.lines().count(), 12);
        assert!(core0.starts_with(
            "gridlabd --define SEASON=Summer --define CASE=0 --define PEN_LEV=0 Homer_0pct_case_0_run_season.glm"
        ));
        assert!(out.path().join("Homer_10pct_case_1_violation_object.glm").is_file());
        assert!(out.path().join("Homer_10pct_case_1_residential_solar.glm").is_file());
        assert!(!out.path().join("Homer_0pct_case_1_residential_solar.glm").exists());
        let solar = mdl::read_file(&out.path().join("Homer_10pct_case_0_residential_solar.glm")).unwrap();
        assert_eq!(solar.count_kind("solar"), 4);
        assert!(load_manifest(&out.path().join(MANIFEST_FILE)).is_ok());
    }
}
