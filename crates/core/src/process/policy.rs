use serde::{Deserialize, Serialize};

/// Which exit statuses of a stage count as success.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExitPolicy {
    /// Exit codes treated as success.
    #[serde(default = "default_accepted_codes")]
    pub accepted_codes: Vec<i32>,
    /// Whether a process killed by a signal (no exit code) counts as success.
    #[serde(default)]
    pub accept_signal: bool,
}

fn default_accepted_codes() -> Vec<i32> {
    vec![0]
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self {
            accepted_codes: default_accepted_codes(),
            accept_signal: false,
        }
    }
}

impl ExitPolicy {
    /// Policy accepting the given codes and rejecting signals.
    pub fn codes(codes: impl Into<Vec<i32>>) -> Self {
        Self {
            accepted_codes: codes.into(),
            accept_signal: false,
        }
    }

    /// Whether an exit `code` (`None` when killed by a signal) is a success.
    pub fn accepts(&self, code: Option<i32>) -> bool {
        match code {
            Some(code) => self.accepted_codes.contains(&code),
            None => self.accept_signal,
        }
    }
}
