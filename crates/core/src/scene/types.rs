use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Sensors whose level-0 data this runner consumes.
pub const SUPPORTED_SENSORS: [&str; 2] = ["modis", "gbad"];

/// The two EOS platforms carrying MODIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "EOS-Terra")]
    Terra,
    #[serde(rename = "EOS-Aqua")]
    Aqua,
}

impl Platform {
    /// Parses the `platform_name` carried by notifications.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EOS-Terra" => Some(Self::Terra),
            "EOS-Aqua" => Some(Self::Aqua),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Terra => "EOS-Terra",
            Self::Aqua => "EOS-Aqua",
        }
    }

    /// Mission letter expected by `modis_L1A --mission`.
    pub fn mission(&self) -> char {
        match self {
            Self::Terra => 'T',
            Self::Aqua => 'A',
        }
    }

    /// Whether a GBAD packet file is needed besides the MODIS file.
    pub fn requires_auxiliary(&self) -> bool {
        matches!(self, Self::Aqua)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one processing attempt: platform, orbit and start minute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SceneKey(String);

impl SceneKey {
    pub fn new(platform_name: &str, orbit_number: u32, start_time: NaiveDateTime) -> Self {
        Self(format!(
            "{}_{}_{}",
            platform_name,
            orbit_number,
            start_time.format("%Y%m%d%H%M")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the pipeline needs to know about a ready scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneDescriptor {
    pub key: SceneKey,
    pub platform: Platform,
    pub orbit_number: u32,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub sensors: Vec<String>,
    /// The MODIS level-0 file.
    pub primary_file: PathBuf,
    /// The GBAD packet file (Aqua only).
    pub auxiliary_file: Option<PathBuf>,
}
