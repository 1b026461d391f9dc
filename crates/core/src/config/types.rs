use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::process::ExitPolicy;
use crate::scene::Platform;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub products: ProductsConfig,
    pub paths: PathsConfig,
    pub executables: ExecutablesConfig,
    #[serde(default)]
    pub destriping: DestripingConfig,
    pub ancillary: AncillaryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Control loop and worker pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Station name used in published message subjects.
    #[serde(default = "default_station")]
    pub station: String,
    /// Directory the external executables write into before relocation.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Number of scenes processed concurrently.
    #[serde(default = "default_max_parallel_scenes")]
    pub max_parallel_scenes: usize,
    /// Seconds passed to `modis_L1A --startnudge`.
    #[serde(default = "default_nudge")]
    pub startnudge: u32,
    /// Seconds passed to `modis_L1A --stopnudge`.
    #[serde(default = "default_nudge")]
    pub endnudge: u32,
    /// Minimum time a scene key stays admitted after dispatch.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Upper bound after which a key is released even if its pipeline never finished.
    #[serde(default = "default_max_hold_secs")]
    pub max_hold_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            station: default_station(),
            working_dir: default_working_dir(),
            max_parallel_scenes: default_max_parallel_scenes(),
            startnudge: default_nudge(),
            endnudge: default_nudge(),
            cooldown_secs: default_cooldown_secs(),
            max_hold_secs: default_max_hold_secs(),
        }
    }
}

fn default_station() -> String {
    "unknown".to_string()
}

fn default_working_dir() -> PathBuf {
    std::env::temp_dir().join("modis-runner")
}

fn default_max_parallel_scenes() -> usize {
    6
}

fn default_nudge() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    300 // 5 minutes
}

fn default_max_hold_secs() -> u64 {
    6 * 3600
}

/// Notification feed settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagingConfig {
    /// Addresses (`host:port`) of the notification feeds to subscribe to.
    pub subscribe_addresses: Vec<String>,
    /// Subject prefixes to accept. Empty accepts every subject.
    #[serde(default)]
    pub subscribe_topics: Vec<String>,
    /// Address the completion publisher binds to.
    #[serde(default = "default_publish_address")]
    pub publish_address: String,
    /// Delay before reconnecting to a dropped feed.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Capacity of the inbound and outbound message queues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_publish_address() -> String {
    "0.0.0.0:9010".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    1000
}

/// Level-0 file naming conventions used to classify arrivals
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamingConfig {
    #[serde(default = "default_terra_prefix")]
    pub terra_primary_prefix: String,
    #[serde(default = "default_pds_suffix")]
    pub terra_primary_suffix: String,
    #[serde(default = "default_aqua_prefix")]
    pub aqua_primary_prefix: String,
    #[serde(default = "default_pds_suffix")]
    pub aqua_primary_suffix: String,
    #[serde(default = "default_aqua_packet_prefix")]
    pub aqua_packet_prefix: String,
    #[serde(default = "default_pds_suffix")]
    pub aqua_packet_suffix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            terra_primary_prefix: default_terra_prefix(),
            terra_primary_suffix: default_pds_suffix(),
            aqua_primary_prefix: default_aqua_prefix(),
            aqua_primary_suffix: default_pds_suffix(),
            aqua_packet_prefix: default_aqua_packet_prefix(),
            aqua_packet_suffix: default_pds_suffix(),
        }
    }
}

fn default_terra_prefix() -> String {
    "P0420064AAAAAAAAAAAAAA".to_string()
}

fn default_aqua_prefix() -> String {
    "P1540064AAAAAAAAAAAAAA".to_string()
}

fn default_aqua_packet_prefix() -> String {
    "P154095715409581540959".to_string()
}

fn default_pds_suffix() -> String {
    "001.PDS".to_string()
}

/// strftime templates for one platform's products
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductTemplates {
    /// Template of the primary level-0 file name, used to recover the observation time.
    pub filetype: String,
    pub level1a: String,
    pub geo: String,
    pub level1b_1km: String,
    pub level1b_500m: String,
    pub level1b_250m: String,
}

impl ProductTemplates {
    pub fn terra() -> Self {
        Self {
            filetype: "P0420064AAAAAAAAAAAAAA%y%j%H%M%S001.PDS".to_string(),
            level1a: "Terra_MODIS_l1a_%y%j_%H%M%S".to_string(),
            geo: "MOD03_A%y%j_%H%M%S".to_string(),
            level1b_1km: "MOD021km_A%y%j_%H%M%S".to_string(),
            level1b_500m: "MOD02Hkm_A%y%j_%H%M%S".to_string(),
            level1b_250m: "MOD02Qkm_A%y%j_%H%M%S".to_string(),
        }
    }

    pub fn aqua() -> Self {
        Self {
            filetype: "P1540064AAAAAAAAAAAAAA%y%j%H%M%S001.PDS".to_string(),
            level1a: "Aqua_MODIS_l1a_%y%j_%H%M%S".to_string(),
            geo: "MYD03_A%y%j_%H%M%S".to_string(),
            level1b_1km: "MYD021km_A%y%j_%H%M%S".to_string(),
            level1b_500m: "MYD02Hkm_A%y%j_%H%M%S".to_string(),
            level1b_250m: "MYD02Qkm_A%y%j_%H%M%S".to_string(),
        }
    }
}

/// Product templates for both platforms
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductsConfig {
    #[serde(default = "ProductTemplates::terra")]
    pub terra: ProductTemplates,
    #[serde(default = "ProductTemplates::aqua")]
    pub aqua: ProductTemplates,
}

impl Default for ProductsConfig {
    fn default() -> Self {
        Self {
            terra: ProductTemplates::terra(),
            aqua: ProductTemplates::aqua(),
        }
    }
}

impl ProductsConfig {
    pub fn for_platform(&self, platform: Platform) -> &ProductTemplates {
        match platform {
            Platform::Terra => &self.terra,
            Platform::Aqua => &self.aqua,
        }
    }
}

/// Product directories
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Final home of level-1a/1b and geolocation products.
    pub level1b_home: PathBuf,
    /// Where GBAD writes Aqua attitude files.
    pub attitude_home: PathBuf,
    /// Where GBAD writes Aqua ephemeris files.
    pub ephemeris_home: PathBuf,
}

/// External processing executables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutablesConfig {
    pub modis_l1a: PathBuf,
    pub modis_geo: PathBuf,
    pub modis_l1b: PathBuf,
    /// Root of the DRL SPA installation providing `wrapper/gbad/run`.
    pub spa_home: PathBuf,
    /// Optional SPA configuration file passed to GBAD when present on disk.
    #[serde(default)]
    pub spa_config_file: Option<PathBuf>,
    #[serde(default)]
    pub geo_options_terra: Vec<String>,
    #[serde(default)]
    pub geo_options_aqua: Vec<String>,
    #[serde(default)]
    pub l1a_exit: ExitPolicy,
    #[serde(default)]
    pub gbad_exit: ExitPolicy,
    #[serde(default)]
    pub geo_exit: ExitPolicy,
    #[serde(default)]
    pub l1b_exit: ExitPolicy,
    #[serde(default)]
    pub destripe_exit: ExitPolicy,
    /// Per-stage timeout. None waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Optional destriping of the 1 km product
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DestripingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Installation root holding `bin/` and `coeff/`.
    #[serde(default)]
    pub home: PathBuf,
    #[serde(default)]
    pub executable: String,
    #[serde(default)]
    pub terra_coeff: String,
    #[serde(default)]
    pub aqua_coeff: String,
}

impl DestripingConfig {
    pub fn coefficient_file(&self, platform: Platform) -> PathBuf {
        let coeff = match platform {
            Platform::Terra => &self.terra_coeff,
            Platform::Aqua => &self.aqua_coeff,
        };
        self.home.join("coeff").join(coeff)
    }

    pub fn executable_path(&self) -> PathBuf {
        self.home.join("bin").join(&self.executable)
    }
}

/// Navigation helper file refresh settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AncillaryConfig {
    /// Directory holding the `utcpole.dat`/`leapsec.dat` symlinks and backups.
    pub dir: PathBuf,
    /// Base URL the files are downloaded from (file names are appended).
    pub url: String,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_keep_backup_days")]
    pub keep_backup_days: i64,
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

fn default_max_age_days() -> i64 {
    14
}

fn default_keep_backup_days() -> i64 {
    60
}

fn default_download_timeout() -> u64 {
    10
}

/// Status HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

#[cfg(test)]
pub(crate) const MINIMAL_TOML: &str = r#"
[messaging]
subscribe_addresses = ["localhost:9000"]

[paths]
level1b_home = "/data/modis/level1"
attitude_home = "/data/modis/att"
ephemeris_home = "/data/modis/eph"

[executables]
modis_l1a = "/opt/ocssw/bin/modis_L1A"
modis_geo = "/opt/ocssw/bin/modis_GEO"
modis_l1b = "/opt/ocssw/bin/modis_L1B"
spa_home = "/opt/spa"

[ancillary]
dir = "/opt/ocssw/var/modis"
url = "https://oceandata.sci.gsfc.nasa.gov/Ancillary/LUTs/modis/"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config_applies_defaults() {
        let config: Config = toml::from_str(MINIMAL_TOML).unwrap();
        assert_eq!(config.runner.max_parallel_scenes, 6);
        assert_eq!(config.runner.cooldown_secs, 300);
        assert_eq!(config.runner.station, "unknown");
        assert_eq!(config.naming.aqua_packet_prefix, "P154095715409581540959");
        assert_eq!(config.naming.terra_primary_suffix, "001.PDS");
        assert_eq!(config.ancillary.max_age_days, 14);
        assert_eq!(config.ancillary.keep_backup_days, 60);
        assert!(!config.destriping.enabled);
        assert!(!config.server.enabled);
        assert_eq!(config.executables.geo_exit.accepted_codes, vec![0]);
        assert!(config.executables.timeout_secs.is_none());
    }

    #[test]
    fn test_deserialize_missing_executables_fails() {
        let toml = r#"
[messaging]
subscribe_addresses = ["localhost:9000"]
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_products_for_platform() {
        let products = ProductsConfig::default();
        assert_eq!(
            products.for_platform(Platform::Terra).geo,
            "MOD03_A%y%j_%H%M%S"
        );
        assert_eq!(
            products.for_platform(Platform::Aqua).level1b_250m,
            "MYD02Qkm_A%y%j_%H%M%S"
        );
    }

    #[test]
    fn test_geo_exit_policy_override() {
        let toml = MINIMAL_TOML.replace(
            "spa_home = \"/opt/spa\"",
            "spa_home = \"/opt/spa\"\ngeo_exit = { accepted_codes = [0, 1] }",
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.executables.geo_exit.accepted_codes, vec![0, 1]);
        assert!(!config.executables.geo_exit.accept_signal);
    }

    #[test]
    fn test_destriping_paths() {
        let destriping = DestripingConfig {
            enabled: true,
            home: PathBuf::from("/opt/destripe"),
            executable: "MOD_PRDS_DB.exe".to_string(),
            terra_coeff: "terra.coeff".to_string(),
            aqua_coeff: "aqua.coeff".to_string(),
        };
        assert_eq!(
            destriping.executable_path(),
            PathBuf::from("/opt/destripe/bin/MOD_PRDS_DB.exe")
        );
        assert_eq!(
            destriping.coefficient_file(Platform::Aqua),
            PathBuf::from("/opt/destripe/coeff/aqua.coeff")
        );
    }
}
