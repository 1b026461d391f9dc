//! Tracks which level-0 input files of a scene have arrived.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::NamingConfig;
use crate::message::FileNotification;
use crate::scene::{Platform, SceneKey};

/// Role a level-0 file plays in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// The MODIS instrument file.
    Primary,
    /// The GBAD packet file carrying attitude and ephemeris (Aqua).
    Auxiliary,
}

/// Result of matching a file name against the naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMatch {
    Role(FileRole),
    /// Supported platform and sensors, but the name matches no role.
    NoMatch,
    /// The platform/sensor combination is not processed.
    Unsupported,
}

fn matches(name: &str, prefix: &str, suffix: &str) -> bool {
    name.starts_with(prefix) && name.ends_with(suffix)
}

/// Determines the role of `file_name` for the given platform and sensors.
pub fn classify(
    platform: Platform,
    sensors: &[String],
    file_name: &str,
    naming: &NamingConfig,
) -> RoleMatch {
    match platform {
        Platform::Terra => {
            if sensors.len() != 1 || sensors[0] != "modis" {
                return RoleMatch::Unsupported;
            }
            if matches(
                file_name,
                &naming.terra_primary_prefix,
                &naming.terra_primary_suffix,
            ) {
                RoleMatch::Role(FileRole::Primary)
            } else {
                RoleMatch::NoMatch
            }
        }
        Platform::Aqua => {
            if sensors.is_empty() || !sensors.iter().all(|s| s == "modis" || s == "gbad") {
                return RoleMatch::Unsupported;
            }
            // Both roles arrive in one stream, only the prefix tells them apart.
            if matches(
                file_name,
                &naming.aqua_primary_prefix,
                &naming.aqua_primary_suffix,
            ) {
                RoleMatch::Role(FileRole::Primary)
            } else if matches(
                file_name,
                &naming.aqua_packet_prefix,
                &naming.aqua_packet_suffix,
            ) {
                RoleMatch::Role(FileRole::Auxiliary)
            } else {
                RoleMatch::NoMatch
            }
        }
    }
}

/// Input files recorded for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessEntry {
    pub platform: Platform,
    pub primary: Option<PathBuf>,
    pub auxiliary: Option<PathBuf>,
}

impl ReadinessEntry {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            primary: None,
            auxiliary: None,
        }
    }

    /// Stores `path` under `role`. Later arrivals of the same role win.
    pub fn record(&mut self, role: FileRole, path: PathBuf) {
        match role {
            FileRole::Primary => self.primary = Some(path),
            FileRole::Auxiliary => self.auxiliary = Some(path),
        }
    }

    /// True when every role the platform needs is present.
    pub fn is_ready(&self) -> bool {
        self.primary.is_some() && (self.auxiliary.is_some() || !self.platform.requires_auxiliary())
    }
}

/// Per-scene record of arrived input files.
#[derive(Debug, Default)]
pub struct ReadinessRegistry {
    entries: HashMap<SceneKey, ReadinessEntry>,
}

impl ReadinessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SceneKey) -> Option<&ReadinessEntry> {
        self.entries.get(key)
    }

    /// Records a file, creating the entry on first arrival. Returns readiness.
    pub fn record(
        &mut self,
        key: &SceneKey,
        platform: Platform,
        role: FileRole,
        path: PathBuf,
    ) -> bool {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| ReadinessEntry::new(platform));
        entry.record(role, path);
        entry.is_ready()
    }

    pub fn is_ready(&self, key: &SceneKey) -> bool {
        self.entries.get(key).is_some_and(ReadinessEntry::is_ready)
    }

    pub fn remove(&mut self, key: &SceneKey) -> Option<ReadinessEntry> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &SceneKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneKey, &ReadinessEntry)> {
        self.entries.iter()
    }
}

/// What is known about an announced file before the registries are locked.
///
/// Both facts need I/O (a name lookup, an existence check), so callers
/// gather them first and keep the critical section free of blocking work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCheck {
    /// The URI host resolved to an address of this machine.
    pub on_this_host: bool,
    /// The file exists on disk.
    pub exists: bool,
}

impl FileCheck {
    /// Checks `notification`'s file when it lives on this machine.
    pub async fn gather(notification: &FileNotification, on_this_host: bool) -> Self {
        let exists = on_this_host
            && tokio::fs::try_exists(&notification.uri.path)
                .await
                .unwrap_or(false);
        Self {
            on_this_host,
            exists,
        }
    }
}

/// Records the file announced by `notification` and reports whether the
/// scene now has every input it needs.
///
/// Returns false without touching the registry when the file lives on
/// another host, does not exist yet, or the platform/sensors are not
/// processed. A file matching no role leaves the entry as it is.
pub fn register_arrival(
    notification: &FileNotification,
    registry: &mut ReadinessRegistry,
    key: &SceneKey,
    naming: &NamingConfig,
    check: FileCheck,
) -> bool {
    let Some(platform) = Platform::from_name(&notification.platform_name) else {
        debug!("Platform {} is not processed", notification.platform_name);
        return false;
    };

    let uri = &notification.uri;
    if !check.on_this_host {
        warn!(
            "File {} announced on host {} which is not this machine",
            uri.path.display(),
            uri.host
        );
        return false;
    }

    let Some(file_name) = uri.file_name() else {
        debug!("No file name in {}", uri.path.display());
        return registry.is_ready(key);
    };

    let role = match classify(platform, &notification.sensors, file_name, naming) {
        RoleMatch::Role(role) => role,
        RoleMatch::NoMatch => {
            debug!("{} is neither a MODIS nor a packet file", file_name);
            return registry.is_ready(key);
        }
        RoleMatch::Unsupported => {
            debug!(
                "Sensors {:?} on {} are not processed",
                notification.sensors, platform
            );
            return false;
        }
    };

    if !check.exists {
        warn!(
            "File is reported to be dispatched but is not there: {}",
            uri.path.display()
        );
        return false;
    }

    let ready = registry.record(key, platform, role, uri.path.clone());
    if ready {
        info!("Files ready for MODIS level-1 processing of {}", key);
    } else {
        debug!("Recorded {:?} file for {}, waiting for more", role, key);
    }
    ready
}
