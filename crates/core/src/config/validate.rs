use super::{types::Config, ConfigError};
use crate::pipeline::is_valid_template;

/// Validate configuration
/// Currently validates:
/// - At least one subscription address
/// - Worker pool size is not 0
/// - Executable paths are set
/// - Destriping has coefficients when enabled
/// - Product name templates are valid strftime formats
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.messaging.subscribe_addresses.is_empty() {
        return Err(ConfigError::ValidationError(
            "messaging.subscribe_addresses cannot be empty".to_string(),
        ));
    }

    if config.runner.max_parallel_scenes == 0 {
        return Err(ConfigError::ValidationError(
            "runner.max_parallel_scenes cannot be 0".to_string(),
        ));
    }

    let executables = [
        ("modis_l1a", &config.executables.modis_l1a),
        ("modis_geo", &config.executables.modis_geo),
        ("modis_l1b", &config.executables.modis_l1b),
    ];
    for (name, path) in executables {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "executables.{} cannot be empty",
                name
            )));
        }
    }

    if config.destriping.enabled
        && (config.destriping.executable.is_empty()
            || config.destriping.terra_coeff.is_empty()
            || config.destriping.aqua_coeff.is_empty())
    {
        return Err(ConfigError::ValidationError(
            "destriping is enabled but executable or coefficient files are missing".to_string(),
        ));
    }

    for (platform, templates) in [
        ("terra", &config.products.terra),
        ("aqua", &config.products.aqua),
    ] {
        let named = [
            ("filetype", &templates.filetype),
            ("level1a", &templates.level1a),
            ("geo", &templates.geo),
            ("level1b_1km", &templates.level1b_1km),
            ("level1b_500m", &templates.level1b_500m),
            ("level1b_250m", &templates.level1b_250m),
        ];
        for (name, template) in named {
            if !is_valid_template(template) {
                return Err(ConfigError::ValidationError(format!(
                    "products.{}.{} is not a valid time format: {}",
                    platform, name, template
                )));
            }
        }
    }

    Ok(())
}
