use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scene::SceneKey;

/// The external processing stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Level-0 to level-1A conversion.
    Level1A,
    /// Aqua attitude and ephemeris from the GBAD packets.
    Gbad,
    Geolocation,
    /// Radiometric calibration to level-1B.
    Calibration,
    Destriping,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level1A => "level1a",
            Self::Gbad => "gbad",
            Self::Geolocation => "geolocation",
            Self::Calibration => "calibration",
            Self::Destriping => "destriping",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a stage output made it to its final location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "snake_case")]
pub enum OutputOutcome {
    /// Moved to this final path.
    Present(PathBuf),
    /// Not produced by the stage; this is where it would have gone.
    Missing(PathBuf),
}

impl OutputOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Present(p) | Self::Missing(p) => p,
        }
    }

    pub fn present(&self) -> Option<&Path> {
        match self {
            Self::Present(p) => Some(p),
            Self::Missing(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Final paths of every product of one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPaths {
    pub level1a: PathBuf,
    pub geo: PathBuf,
    pub level1b_1km: PathBuf,
    pub level1b_500m: PathBuf,
    pub level1b_250m: PathBuf,
}

impl ProductPaths {
    /// The three calibrated products, finest resolution last.
    pub fn calibrated(&self) -> [&Path; 3] {
        [&self.level1b_1km, &self.level1b_500m, &self.level1b_250m]
    }
}

/// One stage output and where it ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutput {
    pub stage: Stage,
    pub outcome: OutputOutcome,
}

/// What a completed pipeline produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub scene: SceneKey,
    pub outputs: Vec<StageOutput>,
    /// Attitude and ephemeris files (Aqua).
    pub attitude_ephemeris: Option<(PathBuf, PathBuf)>,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Final paths of the outputs of `stage` that are present.
    pub fn present(&self, stage: Stage) -> Vec<&Path> {
        self.outputs
            .iter()
            .filter(|o| o.stage == stage)
            .filter_map(|o| o.outcome.present())
            .collect()
    }

    /// Outputs the stages did not produce.
    pub fn missing(&self) -> Vec<&StageOutput> {
        self.outputs
            .iter()
            .filter(|o| !o.outcome.is_present())
            .collect()
    }
}
