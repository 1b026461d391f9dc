//! Mock command runner for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::process::{CommandRunner, ProcessError, ProcessOutcome, StageCommand};

/// Mock implementation of the CommandRunner trait.
///
/// Provides controllable behavior for testing:
/// - Track commands for assertions
/// - Exit codes per program file name (default 0)
/// - Create the outputs a real stage would write, so relocation can be
///   exercised without the processing binaries
///
/// Outputs are recognised from the arguments: `-o<name>`, `--okm=`,
/// `--hkm=` and `--qkm=` name files in the command's working directory,
/// and the values following `aqua.gbad_att`/`aqua.gbad_eph` are full paths.
#[derive(Debug, Default)]
pub struct MockRunner {
    commands: Arc<RwLock<Vec<StageCommand>>>,
    exit_codes: Arc<RwLock<HashMap<String, Option<i32>>>>,
    missing_program: Arc<RwLock<Option<String>>>,
    suppressed_outputs: Arc<RwLock<HashSet<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded commands.
    pub async fn recorded_commands(&self) -> Vec<StageCommand> {
        self.commands.read().await.clone()
    }

    /// File names of the programs run, in order.
    pub async fn programs(&self) -> Vec<String> {
        self.commands
            .read()
            .await
            .iter()
            .map(StageCommand::program_name)
            .collect()
    }

    /// Make `program` exit with `code` (`None` simulates a signal).
    pub async fn set_exit_code(&self, program: &str, code: Option<i32>) {
        self.exit_codes
            .write()
            .await
            .insert(program.to_string(), code);
    }

    /// Make `program` fail to start as if it were not installed.
    pub async fn set_missing_program(&self, program: &str) {
        *self.missing_program.write().await = Some(program.to_string());
    }

    /// Do not create outputs whose file name starts with `prefix`.
    pub async fn suppress_output(&self, prefix: &str) {
        self.suppressed_outputs
            .write()
            .await
            .insert(prefix.to_string());
    }

    fn outputs(command: &StageCommand) -> Vec<PathBuf> {
        let dir = command
            .current_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let args = command.to_argv();
        let mut outputs = Vec::new();

        for (i, arg) in args.iter().enumerate() {
            let named = ["-o", "--okm=", "--hkm=", "--qkm="]
                .iter()
                .find_map(|flag| arg.strip_prefix(flag));
            if let Some(name) = named.filter(|n| !n.is_empty()) {
                outputs.push(dir.join(name));
            }
            if arg == "aqua.gbad_att" || arg == "aqua.gbad_eph" {
                if let Some(path) = args.get(i + 1) {
                    outputs.push(PathBuf::from(path));
                }
            }
        }
        outputs
    }

    async fn is_suppressed(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.suppressed_outputs
            .read()
            .await
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, command: &StageCommand) -> Result<ProcessOutcome, ProcessError> {
        self.commands.write().await.push(command.clone());
        let program = command.program_name();

        if self.missing_program.read().await.as_deref() == Some(program.as_str()) {
            return Err(ProcessError::NotFound {
                program: command.program.clone(),
            });
        }

        let code = self
            .exit_codes
            .read()
            .await
            .get(&program)
            .copied()
            .unwrap_or(Some(0));

        if code == Some(0) {
            for output in Self::outputs(command) {
                if self.is_suppressed(&output).await {
                    continue;
                }
                if let Some(parent) = output.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|source| {
                        ProcessError::Io {
                            program: command.program.clone(),
                            source,
                        }
                    })?;
                }
                tokio::fs::write(&output, program.as_bytes())
                    .await
                    .map_err(|source| ProcessError::Io {
                        program: command.program.clone(),
                        source,
                    })?;
            }
        }

        Ok(ProcessOutcome {
            code,
            elapsed: Duration::from_millis(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_named_outputs() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        let cmd = StageCommand::new("/bin/modis_L1B")
            .args(["--okm=a.hdf", "--hkm=b.hdf", "--qkm=c.hdf", "in1", "in2"])
            .current_dir(dir.path());

        let outcome = runner.run(&cmd).await.unwrap();
        assert_eq!(outcome.code, Some(0));
        for name in ["a.hdf", "b.hdf", "c.hdf"] {
            assert!(dir.path().join(name).exists());
        }
        assert_eq!(runner.programs().await, vec!["modis_L1B"]);
    }

    #[tokio::test]
    async fn test_failure_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        runner.set_exit_code("modis_L1A", Some(2)).await;
        let cmd = StageCommand::new("modis_L1A")
            .arg("-oout.hdf")
            .current_dir(dir.path());

        let outcome = runner.run(&cmd).await.unwrap();
        assert_eq!(outcome.code, Some(2));
        assert!(!dir.path().join("out.hdf").exists());
    }

    #[tokio::test]
    async fn test_suppressed_output() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        runner.suppress_output("b").await;
        let cmd = StageCommand::new("x")
            .args(["--okm=a.hdf", "--hkm=b.hdf"])
            .current_dir(dir.path());

        runner.run(&cmd).await.unwrap();
        assert!(dir.path().join("a.hdf").exists());
        assert!(!dir.path().join("b.hdf").exists());
    }
}
