//! Timed release of admitted scene keys.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::registry::SceneRegistries;
use crate::scene::SceneKey;

use super::update_gauges;

/// Time left until `admitted_at + cooldown`, zero once passed.
pub fn remaining_cooldown(admitted_at: DateTime<Utc>, cooldown: Duration, now: DateTime<Utc>) -> Duration {
    let elapsed = (now - admitted_at).to_std().unwrap_or(Duration::ZERO);
    cooldown.saturating_sub(elapsed)
}

/// Releases `key` once its cool-down has passed. Called when the pipeline
/// finished, successfully or not.
pub fn release_after_cooldown(
    registries: Arc<RwLock<SceneRegistries>>,
    key: SceneKey,
    admitted_at: DateTime<Utc>,
    cooldown: Duration,
    hold_timer: Option<JoinHandle<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let wait = remaining_cooldown(admitted_at, cooldown, Utc::now());
        if !wait.is_zero() {
            debug!("Keeping {} blocked for another {:?}", key, wait);
            tokio::time::sleep(wait).await;
        }

        let mut registries = registries.write().await;
        registries.evict_if_admitted_at(&key, admitted_at);
        update_gauges(&registries);
        drop(registries);

        if let Some(timer) = hold_timer {
            timer.abort();
        }
    })
}

/// Safety release for a key whose pipeline never reports completion.
pub fn release_after_max_hold(
    registries: Arc<RwLock<SceneRegistries>>,
    key: SceneKey,
    admitted_at: DateTime<Utc>,
    max_hold: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(max_hold).await;
        let mut registries = registries.write().await;
        if registries.evict_if_admitted_at(&key, admitted_at) {
            warn!(
                "Scene {} held for {:?} without finishing, released",
                key, max_hold
            );
        }
        update_gauges(&registries);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn key() -> SceneKey {
        let start = NaiveDate::from_ymd_opt(2021, 10, 13)
            .unwrap()
            .and_hms_opt(13, 28, 53)
            .unwrap();
        SceneKey::new("EOS-Terra", 1, start)
    }

    #[test]
    fn test_remaining_cooldown() {
        let admitted = Utc.with_ymd_and_hms(2021, 10, 13, 12, 0, 0).unwrap();
        let cooldown = Duration::from_secs(300);

        let later = admitted + chrono::Duration::seconds(100);
        assert_eq!(remaining_cooldown(admitted, cooldown, later), Duration::from_secs(200));

        let much_later = admitted + chrono::Duration::seconds(900);
        assert_eq!(remaining_cooldown(admitted, cooldown, much_later), Duration::ZERO);

        // Clock going backwards keeps the full cool-down.
        let earlier = admitted - chrono::Duration::seconds(10);
        assert_eq!(remaining_cooldown(admitted, cooldown, earlier), cooldown);
    }

    #[tokio::test]
    async fn test_release_waits_for_cooldown() {
        tokio::time::pause();
        let registries = Arc::new(RwLock::new(SceneRegistries::new()));
        let admitted = Utc::now();
        registries.write().await.jobs.admit(&key(), admitted);

        let task = release_after_cooldown(
            registries.clone(),
            key(),
            admitted,
            Duration::from_secs(300),
            None,
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(registries.read().await.jobs.already_running(&key()));

        tokio::time::sleep(Duration::from_secs(300)).await;
        task.await.unwrap();
        assert!(!registries.read().await.jobs.already_running(&key()));
    }

    #[tokio::test]
    async fn test_release_aborts_hold_timer() {
        tokio::time::pause();
        let registries = Arc::new(RwLock::new(SceneRegistries::new()));
        let admitted = Utc::now() - chrono::Duration::seconds(600);
        registries.write().await.jobs.admit(&key(), admitted);

        let hold = release_after_max_hold(
            registries.clone(),
            key(),
            admitted,
            Duration::from_secs(3600),
        );
        release_after_cooldown(
            registries.clone(),
            key(),
            admitted,
            Duration::from_secs(300),
            Some(hold),
        )
        .await
        .unwrap();

        assert!(registries.read().await.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_max_hold_spares_readmitted_key() {
        tokio::time::pause();
        let registries = Arc::new(RwLock::new(SceneRegistries::new()));
        let first = Utc::now() - chrono::Duration::seconds(60);
        let second = Utc::now();
        registries.write().await.jobs.admit(&key(), second);

        release_after_max_hold(registries.clone(), key(), first, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(registries.read().await.jobs.admitted_at(&key()), Some(second));
    }
}
