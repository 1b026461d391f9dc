//! Downloading fresh navigation helper files.

use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::error::AncillaryError;
use super::files::{
    backup_name, check_freshness, clean_backups, swap_link, write_replacing, NAVIGATION_FILES,
};
use crate::config::AncillaryConfig;
use crate::metrics::ANCILLARY_REFRESHES;

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The source could not be reached; nothing was changed.
    Unreachable,
    /// The listed files were downloaded and relinked.
    Updated(Vec<String>),
}

/// Keeps `utcpole.dat` and `leapsec.dat` up to date.
pub struct AncillaryRefresher {
    client: Client,
    config: AncillaryConfig,
    // Serializes concurrent checks from pipelines launching together.
    guard: Mutex<()>,
}

impl AncillaryRefresher {
    pub fn new(config: AncillaryConfig) -> Result<Self, AncillaryError> {
        let client = Client::builder()
            .user_agent(concat!("modis-runner/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AncillaryConfig {
        &self.config
    }

    fn url_for(&self, name: &str) -> String {
        if self.config.url.ends_with('/') {
            format!("{}{}", self.config.url, name)
        } else {
            format!("{}/{}", self.config.url, name)
        }
    }

    /// Refreshes the files when they are missing or stale.
    ///
    /// Returns whether fresh files are in place afterwards. Failures are
    /// logged only; processing goes on with the current files.
    pub async fn ensure_fresh(&self) -> bool {
        let _guard = self.guard.lock().await;
        let dir = &self.config.dir;
        if check_freshness(dir, self.config.max_age_days) {
            ANCILLARY_REFRESHES.with_label_values(&["fresh"]).inc();
            return true;
        }

        info!("Navigation helper files are missing or stale, downloading");
        match self.refresh().await {
            Ok(RefreshOutcome::Updated(files)) if files.len() == NAVIGATION_FILES.len() => {
                ANCILLARY_REFRESHES.with_label_values(&["updated"]).inc();
            }
            Ok(outcome) => {
                warn!("Navigation helper refresh incomplete: {:?}", outcome);
                ANCILLARY_REFRESHES.with_label_values(&["failed"]).inc();
            }
            Err(e) => {
                error!("Navigation helper refresh failed: {}", e);
                ANCILLARY_REFRESHES.with_label_values(&["failed"]).inc();
            }
        }
        check_freshness(dir, self.config.max_age_days)
    }

    /// Downloads every file, relinks it, then cleans old backups.
    ///
    /// A file that fails to download keeps its previous link. Backups still
    /// linked are never cleaned.
    pub async fn refresh(&self) -> Result<RefreshOutcome, AncillaryError> {
        let dir = &self.config.dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AncillaryError::io(dir, e))?;

        if let Err(e) = self.reach_source().await {
            warn!("{}", e);
            return Ok(RefreshOutcome::Unreachable);
        }

        info!("Start downloading....");
        let stamp = Utc::now().naive_utc();
        let mut updated = Vec::new();

        for name in NAVIGATION_FILES {
            let url = self.url_for(name);
            let data = match self.download(&url).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("Failed downloading {}: {}", name, e);
                    continue;
                }
            };

            let target = dir.join(backup_name(name, stamp));
            write_replacing(&target, &data).await?;
            info!("Data written to file {}", target.display());

            if let Err(e) = swap_link(dir, name, &target).await {
                warn!("Failed to relink {}: {}", name, e);
                continue;
            }
            updated.push(name.to_string());
        }

        clean_backups(dir, self.config.keep_backup_days);
        Ok(RefreshOutcome::Updated(updated))
    }

    async fn reach_source(&self) -> Result<(), AncillaryError> {
        let url = &self.config.url;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AncillaryError::Unreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(AncillaryError::Unreachable {
                url: url.clone(),
                reason: format!("status {}", response.status()),
            });
        }
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AncillaryError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AncillaryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancillary::check_freshness_at;
    use axum::{http::StatusCode, routing::get, Router};
    use chrono::Duration as ChronoDuration;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &Path, url: String) -> AncillaryConfig {
        AncillaryConfig {
            dir: dir.to_path_buf(),
            url,
            max_age_days: 14,
            keep_backup_days: 60,
            timeout_secs: 5,
        }
    }

    /// Serves the two files; `leapsec.dat` only when `with_leapsec`.
    async fn serve(with_leapsec: bool) -> String {
        let mut app = Router::new()
            .route("/luts/", get(|| async { "index" }))
            .route("/luts/utcpole.dat", get(|| async { "utcpole data" }));
        app = if with_leapsec {
            app.route("/luts/leapsec.dat", get(|| async { "leapsec data" }))
        } else {
            app.route("/luts/leapsec.dat", get(|| async { StatusCode::NOT_FOUND }))
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/luts/", addr)
    }

    #[tokio::test]
    async fn test_refresh_downloads_and_links() {
        let dir = TempDir::new().unwrap();
        let url = serve(true).await;
        let refresher = AncillaryRefresher::new(config(dir.path(), url)).unwrap();

        let outcome = refresher.refresh().await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Updated(vec!["utcpole.dat".into(), "leapsec.dat".into()])
        );
        assert_eq!(
            std::fs::read(dir.path().join("utcpole.dat")).unwrap(),
            b"utcpole data"
        );
        assert!(check_freshness(dir.path(), 14));
    }

    #[tokio::test]
    async fn test_failed_download_keeps_previous_link() {
        let dir = TempDir::new().unwrap();
        let old = Utc::now().naive_utc() - ChronoDuration::days(20);
        let previous = dir.path().join(backup_name("leapsec.dat", old));
        std::fs::write(&previous, b"old leapsec").unwrap();
        std::os::unix::fs::symlink(&previous, dir.path().join("leapsec.dat")).unwrap();

        let url = serve(false).await;
        let refresher = AncillaryRefresher::new(config(dir.path(), url)).unwrap();
        let outcome = refresher.refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Updated(vec!["utcpole.dat".into()]));
        assert_eq!(
            std::fs::read_link(dir.path().join("leapsec.dat")).unwrap(),
            previous
        );
        assert!(!refresher.ensure_fresh().await);
    }

    #[tokio::test]
    async fn test_unreachable_source_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let refresher =
            AncillaryRefresher::new(config(dir.path(), "http://127.0.0.1:9/".into())).unwrap();

        assert_eq!(refresher.refresh().await.unwrap(), RefreshOutcome::Unreachable);
        assert!(!dir.path().join("utcpole.dat").exists());
        assert!(!refresher.ensure_fresh().await);
    }

    #[tokio::test]
    async fn test_back_to_back_refreshes_never_rewrite_linked_file() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new().unwrap();
        let url = serve(true).await;
        let refresher = AncillaryRefresher::new(config(dir.path(), url)).unwrap();
        let link = dir.path().join("utcpole.dat");

        refresher.refresh().await.unwrap();
        let first = std::fs::metadata(&link).unwrap().ino();
        refresher.refresh().await.unwrap();
        let second = std::fs::metadata(&link).unwrap().ino();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&link).unwrap(), b"utcpole data");
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_unreachable_source_keeps_expired_links() {
        let dir = TempDir::new().unwrap();
        let expired = Utc::now().naive_utc() - ChronoDuration::days(61);
        for name in NAVIGATION_FILES {
            let target = dir.path().join(backup_name(name, expired));
            std::fs::write(&target, b"old").unwrap();
            std::os::unix::fs::symlink(&target, dir.path().join(name)).unwrap();
        }
        let refresher =
            AncillaryRefresher::new(config(dir.path(), "http://127.0.0.1:9/".into())).unwrap();

        assert!(!refresher.ensure_fresh().await);
        for name in NAVIGATION_FILES {
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"old");
        }
    }

    #[tokio::test]
    async fn test_ensure_fresh_skips_download_when_fresh() {
        let dir = TempDir::new().unwrap();
        let recent = Utc::now().naive_utc() - ChronoDuration::days(1);
        for name in NAVIGATION_FILES {
            let target = dir.path().join(backup_name(name, recent));
            std::fs::write(&target, b"x").unwrap();
            std::os::unix::fs::symlink(&target, dir.path().join(name)).unwrap();
        }
        let refresher =
            AncillaryRefresher::new(config(dir.path(), "http://127.0.0.1:9/".into())).unwrap();

        assert!(refresher.ensure_fresh().await);
        assert!(check_freshness_at(dir.path(), 14, recent));
    }

    #[test]
    fn test_url_for_adds_separator() {
        let dir = TempDir::new().unwrap();
        let refresher =
            AncillaryRefresher::new(config(dir.path(), "http://host/luts".into())).unwrap();
        assert_eq!(refresher.url_for("leapsec.dat"), "http://host/luts/leapsec.dat");
    }
}
