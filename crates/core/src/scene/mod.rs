//! Scene identity and the descriptor handed to the pipeline.

mod types;

pub use types::{Platform, SceneDescriptor, SceneKey, SUPPORTED_SENSORS};
