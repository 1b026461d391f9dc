pub mod ancillary;
pub mod config;
pub mod control;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod net;
pub mod pipeline;
pub mod process;
pub mod publisher;
pub mod registry;
pub mod scene;
pub mod testing;
pub mod transport;

pub use ancillary::{AncillaryError, AncillaryRefresher};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ExecutablesConfig,
};
pub use control::{ArrivalOutcome, Controller};
pub use listener::{check_message, run_listener, Arrival};
pub use message::{FileNotification, Message, MessageKind};
pub use pipeline::{PipelineError, PipelineExecutor, PipelineReport};
pub use process::{CommandRunner, ExitPolicy, SubprocessRunner};
pub use publisher::{create_publisher, PublishHandle, Publisher};
pub use registry::{RegistrySnapshot, SceneRegistries};
pub use scene::{Platform, SceneDescriptor, SceneKey};
pub use transport::{MessageSink, MessageSource, TcpPublisher, TcpSubscriber, TransportError};
