//! Freshness checks, backup retention and symlink swapping.

use chrono::{Duration, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::AncillaryError;

/// The files geolocation needs, by their linked names.
pub const NAVIGATION_FILES: [&str; 2] = ["utcpole.dat", "leapsec.dat"];

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// `<name>_<YYYYMMDDHHMM>`
pub fn backup_name(name: &str, time: NaiveDateTime) -> String {
    format!("{}_{}", name, time.format(TIMESTAMP_FORMAT))
}

/// Download time embedded in a backup file name.
pub fn backup_time(file_name: &str) -> Option<NaiveDateTime> {
    let (_, stamp) = file_name.split_once(".dat_")?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Whether both navigation files are linked to downloads younger than
/// `max_age_days`.
pub fn check_freshness(dir: &Path, max_age_days: i64) -> bool {
    check_freshness_at(dir, max_age_days, Utc::now().naive_utc())
}

pub fn check_freshness_at(dir: &Path, max_age_days: i64, now: NaiveDateTime) -> bool {
    let max_age = Duration::days(max_age_days);

    for name in NAVIGATION_FILES {
        let link = dir.join(name);
        let target = match std::fs::canonicalize(&link) {
            Ok(target) => target,
            Err(_) => {
                info!("No navigation helper file: {}", link.display());
                return false;
            }
        };

        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(downloaded) = backup_time(&target_name) else {
            info!("No download time in {}", target.display());
            return false;
        };

        if now - downloaded > max_age {
            info!("File too old! File={}", link.display());
            return false;
        }
        debug!("{} is fresh ({})", name, downloaded);
    }
    true
}

/// Deletes backups downloaded more than `keep_days` ago. Names without a
/// readable timestamp are left alone. Returns the number of files removed.
pub fn clean_backups(dir: &Path, keep_days: i64) -> usize {
    clean_backups_at(dir, keep_days, Utc::now().naive_utc())
}

pub fn clean_backups_at(dir: &Path, keep_days: i64, now: NaiveDateTime) -> usize {
    let keep = Duration::days(keep_days);
    // Whatever the links resolve to now stays, however old.
    let linked: Vec<PathBuf> = NAVIGATION_FILES
        .iter()
        .filter_map(|name| std::fs::canonicalize(dir.join(name)).ok())
        .collect();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for path in entries.filter_map(Result::ok).map(|e| e.path()) {
        let Some(downloaded) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(backup_time)
        else {
            continue;
        };
        if now - downloaded <= keep {
            continue;
        }
        if std::fs::canonicalize(&path).is_ok_and(|resolved| linked.contains(&resolved)) {
            debug!("Keeping {}, it is still linked", path.display());
            continue;
        }
        info!("File too old, cleaning: {}", path.display());
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    removed
}

/// Writes `data` beside `target` and renames it into place. A file already
/// linked under that name is replaced whole, never rewritten in place.
pub async fn write_replacing(target: &Path, data: &[u8]) -> Result<(), AncillaryError> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = target.with_file_name(format!(".{}.part", file_name));

    tokio::fs::write(&partial, data)
        .await
        .map_err(|e| AncillaryError::io(&partial, e))?;
    tokio::fs::rename(&partial, target)
        .await
        .map_err(|e| AncillaryError::io(target, e))
}

/// Points `dir/name` at `target` by renaming a fresh link over it, so the
/// name is never missing or dangling.
pub async fn swap_link(dir: &Path, name: &str, target: &Path) -> Result<(), AncillaryError> {
    let link = dir.join(name);
    let staging: PathBuf = dir.join(format!(".{}.swap", name));

    match tokio::fs::remove_file(&staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(AncillaryError::io(&staging, e)),
    }
    tokio::fs::symlink(target, &staging)
        .await
        .map_err(|e| AncillaryError::io(&staging, e))?;
    tokio::fs::rename(&staging, &link)
        .await
        .map_err(|e| AncillaryError::io(&link, e))?;

    debug!("{} -> {}", link.display(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 10, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn link_both(dir: &Path, downloaded: NaiveDateTime) {
        for name in NAVIGATION_FILES {
            let target = dir.join(backup_name(name, downloaded));
            std::fs::write(&target, b"data").unwrap();
            std::os::unix::fs::symlink(&target, dir.join(name)).unwrap();
        }
    }

    #[test]
    fn test_backup_name_and_time() {
        let name = backup_name("leapsec.dat", now());
        assert_eq!(name, "leapsec.dat_202110201200");
        assert_eq!(backup_time(&name), Some(now()));
        assert_eq!(backup_time("leapsec.dat"), None);
        assert_eq!(backup_time("leapsec.dat_garbage"), None);
    }

    #[test]
    fn test_fresh_links() {
        let dir = TempDir::new().unwrap();
        link_both(dir.path(), now() - Duration::days(3));
        assert!(check_freshness_at(dir.path(), 14, now()));
    }

    #[test]
    fn test_stale_links() {
        let dir = TempDir::new().unwrap();
        link_both(dir.path(), now() - Duration::days(15));
        assert!(!check_freshness_at(dir.path(), 14, now()));
    }

    #[test]
    fn test_missing_file_is_not_fresh() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(backup_name("utcpole.dat", now()));
        std::fs::write(&target, b"data").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("utcpole.dat")).unwrap();
        assert!(!check_freshness_at(dir.path(), 14, now()));
    }

    #[test]
    fn test_plain_file_has_no_timestamp() {
        let dir = TempDir::new().unwrap();
        for name in NAVIGATION_FILES {
            std::fs::write(dir.path().join(name), b"data").unwrap();
        }
        assert!(!check_freshness_at(dir.path(), 14, now()));
    }

    #[test]
    fn test_dangling_link_is_not_fresh() {
        let dir = TempDir::new().unwrap();
        for name in NAVIGATION_FILES {
            std::os::unix::fs::symlink(
                dir.path().join(backup_name(name, now())),
                dir.path().join(name),
            )
            .unwrap();
        }
        assert!(!check_freshness_at(dir.path(), 14, now()));
    }

    #[test]
    fn test_clean_backups_keeps_recent_and_unknown() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join(backup_name("utcpole.dat", now() - Duration::days(61)));
        let recent = dir.path().join(backup_name("utcpole.dat", now() - Duration::days(5)));
        let odd = dir.path().join("utcpole.dat_notadate");
        for path in [&old, &recent, &odd] {
            std::fs::write(path, b"x").unwrap();
        }

        assert_eq!(clean_backups_at(dir.path(), 60, now()), 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(odd.exists());
    }

    #[test]
    fn test_clean_backups_keeps_linked_targets() {
        let dir = TempDir::new().unwrap();
        let linked_at = now() - Duration::days(61);
        link_both(dir.path(), linked_at);
        let unlinked = dir.path().join(backup_name("utcpole.dat", now() - Duration::days(90)));
        std::fs::write(&unlinked, b"x").unwrap();

        assert_eq!(clean_backups_at(dir.path(), 60, now()), 1);
        assert!(!unlinked.exists());
        for name in NAVIGATION_FILES {
            assert!(dir.path().join(backup_name(name, linked_at)).exists());
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"data");
        }
    }

    #[tokio::test]
    async fn test_write_replacing_swaps_inode() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join(backup_name("utcpole.dat", now()));
        write_replacing(&target, b"first").await.unwrap();
        let before = std::fs::metadata(&target).unwrap().ino();

        write_replacing(&target, b"second").await.unwrap();
        let after = std::fs::metadata(&target).unwrap().ino();

        assert_ne!(before, after);
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_clean_backups_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(clean_backups(&dir.path().join("absent"), 60), 0);
    }

    #[tokio::test]
    async fn test_swap_link_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("leapsec.dat_202110010000");
        let second = dir.path().join("leapsec.dat_202110150000");
        std::fs::write(&first, b"one").unwrap();
        std::fs::write(&second, b"two").unwrap();

        swap_link(dir.path(), "leapsec.dat", &first).await.unwrap();
        swap_link(dir.path(), "leapsec.dat", &second).await.unwrap();

        let link = dir.path().join("leapsec.dat");
        assert_eq!(std::fs::read_link(&link).unwrap(), second);
        assert_eq!(std::fs::read(&link).unwrap(), b"two");
        // The previous download stays as a backup.
        assert!(first.exists());
    }
}
