//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the transport and process
//! traits, allowing the whole runner to be exercised without the MODIS
//! processing binaries or a message bus.
//!
//! # Example
//!
//! ```rust,ignore
//! use modis_runner_core::testing::{MockRunner, RecordingSink};
//!
//! let runner = MockRunner::new();
//! runner.set_exit_code("modis_GEO", Some(1)).await;
//!
//! let sink = Arc::new(RecordingSink::new());
//! // Wire both into a PipelineExecutor / Publisher...
//! ```

mod mock_runner;
mod mock_sink;
mod mock_source;

pub use mock_runner::MockRunner;
pub use mock_sink::RecordingSink;
pub use mock_source::ScriptedSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::NaiveDateTime;
    use serde_json::json;
    use std::path::Path;

    use crate::config::{
        AncillaryConfig, Config, DestripingConfig, ExecutablesConfig, MessagingConfig,
        NamingConfig, PathsConfig, ProductsConfig, RunnerConfig, ServerConfig,
    };
    use crate::message::{Message, MessageKind};
    use crate::process::ExitPolicy;

    /// A Terra MODIS level-0 file name.
    pub const TERRA_MODIS_FILE: &str = "P0420064AAAAAAAAAAAAAA21284194359001.PDS";
    /// An Aqua MODIS level-0 file name.
    pub const AQUA_MODIS_FILE: &str = "P1540064AAAAAAAAAAAAAA21286132853001.PDS";
    /// An Aqua GBAD packet file name.
    pub const AQUA_PACKET_FILE: &str = "P1540957154095815409590021286132853001.PDS";

    /// Configuration with every directory under `root`.
    pub fn config_in(root: &Path) -> Config {
        Config {
            runner: RunnerConfig {
                station: "test".to_string(),
                working_dir: root.join("work"),
                ..RunnerConfig::default()
            },
            messaging: MessagingConfig {
                subscribe_addresses: vec!["127.0.0.1:0".to_string()],
                subscribe_topics: Vec::new(),
                publish_address: "127.0.0.1:0".to_string(),
                reconnect_delay_ms: 50,
                queue_capacity: 16,
            },
            naming: NamingConfig::default(),
            products: ProductsConfig::default(),
            paths: PathsConfig {
                level1b_home: root.join("level1"),
                attitude_home: root.join("att"),
                ephemeris_home: root.join("eph"),
            },
            executables: ExecutablesConfig {
                modis_l1a: root.join("bin/modis_L1A"),
                modis_geo: root.join("bin/modis_GEO"),
                modis_l1b: root.join("bin/modis_L1B"),
                spa_home: root.join("spa"),
                spa_config_file: None,
                geo_options_terra: vec!["--verbose".to_string(), "--entrained".to_string()],
                geo_options_aqua: vec!["--verbose".to_string()],
                l1a_exit: ExitPolicy::default(),
                gbad_exit: ExitPolicy::default(),
                geo_exit: ExitPolicy::default(),
                l1b_exit: ExitPolicy::default(),
                destripe_exit: ExitPolicy::default(),
                timeout_secs: None,
            },
            destriping: DestripingConfig::default(),
            ancillary: AncillaryConfig {
                dir: root.join("var/modis"),
                url: "http://127.0.0.1:9/".to_string(),
                max_age_days: 14,
                keep_backup_days: 60,
                timeout_secs: 1,
            },
            server: ServerConfig::default(),
        }
    }

    /// A `file` notification for `path` on this host.
    pub fn file_message(
        platform: &str,
        sensors: &[&str],
        orbit: u32,
        start: NaiveDateTime,
        path: &Path,
    ) -> Message {
        let sensor = if sensors.len() == 1 {
            json!(sensors[0])
        } else {
            json!(sensors)
        };
        Message::new(
            "/XLBANDANTENNA/EOS/ISP",
            MessageKind::File,
            "receiver@localhost",
            json!({
                "platform_name": platform,
                "sensor": sensor,
                "orbit_number": orbit,
                "start_time": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "uri": format!("ssh://localhost{}", path.display()),
                "uid": path.file_name().map(|n| n.to_string_lossy().into_owned()),
            }),
        )
    }
}
