//! Scenes admitted for processing.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::scene::SceneKey;

/// Admission time per scene key. A key is admitted while it is present.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<SceneKey, DateTime<Utc>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while `key` is processing or cooling down.
    pub fn already_running(&self, key: &SceneKey) -> bool {
        self.jobs.contains_key(key)
    }

    /// Sets the admission time of `key`, replacing any previous one.
    pub fn admit(&mut self, key: &SceneKey, now: DateTime<Utc>) {
        self.jobs.insert(key.clone(), now);
    }

    pub fn admitted_at(&self, key: &SceneKey) -> Option<DateTime<Utc>> {
        self.jobs.get(key).copied()
    }

    pub fn remove(&mut self, key: &SceneKey) -> Option<DateTime<Utc>> {
        self.jobs.remove(key)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneKey, &DateTime<Utc>)> {
        self.jobs.iter()
    }
}
