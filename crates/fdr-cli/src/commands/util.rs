use std::path::Path;

use anyhow::{bail, Result};
use fdr_core::{Diagnostics, FdrError};
use fdr_populate::FeederConfig;

/// Feeder configuration from an optional dictionary plus command-line overrides.
pub fn load_feeder_config(path: Option<&Path>, region: Option<u8>, seed: Option<u64>) -> Result<FeederConfig> {
    let mut diagnostics = Diagnostics::new();
    let mut config = match path {
        Some(path) => FeederConfig::from_path(path, &mut diagnostics)?,
        None => FeederConfig::default(),
    };
    if diagnostics.has_issues() {
        eprint!("{diagnostics}");
    }
    if let Some(region) = region {
        if !(1..=6).contains(&region) {
            bail!(FdrError::Config(format!("unknown region {region}; expected 1 to 6")));
        }
        config.region = region;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    Ok(config)
}

/// Feeder name from a model path: the file stem.
pub fn feeder_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feeder".to_string())
}
