//! Navigation helper files used by geolocation.
//!
//! `utcpole.dat` and `leapsec.dat` live in the ancillary directory as
//! symlinks to timestamped downloads (`utcpole.dat_202110131200`). The
//! refresher checks their age and downloads new copies when they are stale.
//! A failed refresh keeps whatever is currently linked.

mod error;
mod files;
mod refresh;

pub use error::AncillaryError;
pub use files::{
    backup_name, backup_time, check_freshness, check_freshness_at, clean_backups,
    clean_backups_at, swap_link, write_replacing, NAVIGATION_FILES,
};
pub use refresh::{AncillaryRefresher, RefreshOutcome};
