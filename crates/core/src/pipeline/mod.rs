//! The MODIS level-0 to level-1B processing chain.
//!
//! A ready scene goes through up to five external stages:
//!
//! 1. `modis_L1A` turns the level-0 packets into a level-1A granule
//! 2. the SPA GBAD wrapper derives attitude and ephemeris (Aqua only)
//! 3. `modis_GEO` computes geolocation
//! 4. `modis_L1B` calibrates into the 1 km, 500 m and 250 m products
//! 5. an optional destriping tool corrects the 1 km product
//!
//! Every stage runs inside the working directory; its outputs are moved
//! to the level-1 home and announced downstream.

mod commands;
mod error;
mod executor;
mod naming;
mod relocate;
mod types;

pub use commands::{
    destripe_command, gbad_command, geo_command_line, level1a_command, level1b_command,
};
pub use error::{PipelineError, RelocateError};
pub use executor::{ensure_working_dir, PipelineExecutor};
pub use naming::{
    attitude_ephemeris_paths, existing_product, format_time, is_valid_template, observation_time,
};
pub use relocate::relocate;
pub use types::{OutputOutcome, PipelineReport, ProductPaths, Stage, StageOutput};
