//! External executables run as pipeline stages.
//!
//! Each stage is a child process started without a shell. Its stdout is
//! logged at `info` and its stderr at `debug`, one line at a time, and the
//! resulting exit status is judged by the stage's [`ExitPolicy`].

mod error;
mod policy;
mod runner;
mod types;

pub use error::ProcessError;
pub use policy::ExitPolicy;
pub use runner::{CommandRunner, SubprocessRunner};
pub use types::{ProcessOutcome, StageCommand};
