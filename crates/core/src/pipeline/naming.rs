//! Product file names derived from templates.

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::PipelineError;
use super::types::ProductPaths;
use crate::config::{PathsConfig, ProductTemplates};

/// Whether `template` is a usable strftime format.
pub fn is_valid_template(template: &str) -> bool {
    !StrftimeItems::new(template).any(|item| matches!(item, Item::Error))
}

/// Formats `time` with a user supplied template.
pub fn format_time(time: NaiveDateTime, template: &str) -> Result<String, PipelineError> {
    let mut out = String::new();
    write!(out, "{}", time.format(template)).map_err(|_| PipelineError::InvalidTemplate {
        template: template.to_string(),
    })?;
    Ok(out)
}

/// Observation time encoded in the primary file name.
///
/// Falls back to `fallback` (the notified start time) when the name does
/// not follow the platform's `filetype` template.
pub fn observation_time(
    primary: &Path,
    templates: &ProductTemplates,
    fallback: NaiveDateTime,
) -> NaiveDateTime {
    let name = primary
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match NaiveDateTime::parse_from_str(&name, &templates.filetype) {
        Ok(time) => time,
        Err(e) => {
            debug!(
                "Cannot read observation time from {} ({}), using {}",
                name, e, fallback
            );
            fallback
        }
    }
}

impl ProductPaths {
    /// `<level1b_home>/<observation time by template>_<processing time>.hdf`
    /// for every product.
    pub fn new(
        templates: &ProductTemplates,
        level1b_home: &Path,
        observation: NaiveDateTime,
        processing: NaiveDateTime,
    ) -> Result<Self, PipelineError> {
        let suffix = processing.format("%Y%j%H%M%S.hdf").to_string();
        let path = |template: &str| -> Result<PathBuf, PipelineError> {
            Ok(level1b_home.join(format!("{}_{}", format_time(observation, template)?, suffix)))
        };

        Ok(Self {
            level1a: path(&templates.level1a)?,
            geo: path(&templates.geo)?,
            level1b_1km: path(&templates.level1b_1km)?,
            level1b_500m: path(&templates.level1b_500m)?,
            level1b_250m: path(&templates.level1b_250m)?,
        })
    }
}

/// Attitude and ephemeris paths for a GBAD packet file.
///
/// Named after the packet file with its `.PDS` extension replaced.
pub fn attitude_ephemeris_paths(packet: &Path, paths: &PathsConfig) -> (PathBuf, PathBuf) {
    let name = packet
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split(".PDS").next().unwrap_or(&name);
    (
        paths.attitude_home.join(format!("{}.att", stem)),
        paths.ephemeris_home.join(format!("{}.eph", stem)),
    )
}

/// An existing product in `level1b_home` whose name starts with `prefix`.
pub fn existing_product(level1b_home: &Path, prefix: &str) -> Option<PathBuf> {
    std::fs::read_dir(level1b_home)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with("hdf"))
        })
}
