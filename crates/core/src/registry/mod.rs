//! Readiness and job bookkeeping per scene.
//!
//! Both registries are plain values. The control loop keeps them together
//! in [`SceneRegistries`] behind a single lock so that checking and
//! admitting a scene happen in one critical section.

mod jobs;
mod readiness;

pub use jobs::JobRegistry;
pub use readiness::{
    classify, register_arrival, FileCheck, FileRole, ReadinessEntry, ReadinessRegistry, RoleMatch,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::scene::{Platform, SceneKey};

/// Removes `key` from both registries. Absent keys are logged, not an error.
pub fn evict(jobs: &mut JobRegistry, readiness: &mut ReadinessRegistry, key: &SceneKey) -> bool {
    let had_job = jobs.remove(key).is_some();
    let had_files = readiness.remove(key).is_some();
    if had_job || had_files {
        debug!("Released scene {}", key);
        true
    } else {
        warn!("Scene {} was not registered, nothing to release", key);
        false
    }
}

/// The readiness and job registries of one runner.
#[derive(Debug, Default)]
pub struct SceneRegistries {
    pub readiness: ReadinessRegistry,
    pub jobs: JobRegistry,
}

impl SceneRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evict(&mut self, key: &SceneKey) -> bool {
        evict(&mut self.jobs, &mut self.readiness, key)
    }

    /// Evicts `key` only if it is still the admission made at `admitted_at`.
    ///
    /// Timers scheduled for an earlier admission must not release a scene
    /// that has since been admitted again.
    pub fn evict_if_admitted_at(&mut self, key: &SceneKey, admitted_at: DateTime<Utc>) -> bool {
        if self.jobs.admitted_at(key) == Some(admitted_at) {
            self.evict(key)
        } else {
            debug!("Scene {} was re-admitted, keeping it", key);
            false
        }
    }

    /// Point-in-time copy for status reporting.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut scenes: Vec<SceneStatus> = self
            .readiness
            .iter()
            .map(|(key, entry)| SceneStatus {
                key: key.clone(),
                platform: Some(entry.platform),
                primary: entry.primary.clone(),
                auxiliary: entry.auxiliary.clone(),
                ready: entry.is_ready(),
                admitted_at: self.jobs.admitted_at(key),
            })
            .collect();

        // Admitted keys whose readiness entry is gone still show up.
        for (key, at) in self.jobs.iter() {
            if !self.readiness.contains(key) {
                scenes.push(SceneStatus {
                    key: key.clone(),
                    platform: None,
                    primary: None,
                    auxiliary: None,
                    ready: false,
                    admitted_at: Some(*at),
                });
            }
        }

        scenes.sort_by(|a, b| a.key.cmp(&b.key));
        RegistrySnapshot {
            pending: scenes.iter().filter(|s| s.admitted_at.is_none()).count(),
            running: self.jobs.len(),
            scenes,
        }
    }
}

/// State of one scene as seen by the registries.
#[derive(Debug, Clone, Serialize)]
pub struct SceneStatus {
    pub key: SceneKey,
    pub platform: Option<Platform>,
    pub primary: Option<PathBuf>,
    pub auxiliary: Option<PathBuf>,
    pub ready: bool,
    pub admitted_at: Option<DateTime<Utc>>,
}

/// Serializable view of both registries.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    /// Scenes waiting for input files.
    pub pending: usize,
    /// Scenes admitted and not yet released.
    pub running: usize,
    pub scenes: Vec<SceneStatus>,
}
