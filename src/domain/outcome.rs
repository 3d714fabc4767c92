//! Tick outcomes and run-mode policies

use std::fmt;
use std::str::FromStr;

use crate::domain::error::{DomainError, PersistError};

/// Identifier of a node, unique within one story tree.
pub type NodeId = i32;

/// Result of advancing a node (or a whole container) by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickResult {
    Success,
    Failed,
    Running,
}

impl TickResult {
    /// True for `Success` and `Failed`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TickResult::Running)
    }
}

impl fmt::Display for TickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TickResult::Success => "success",
            TickResult::Failed => "failed",
            TickResult::Running => "running",
        };
        f.write_str(label)
    }
}

/// What a container does with a node whose tick reported `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunMode {
    /// Keep the node in place; it is advanced again on the next tick.
    #[default]
    RetryUntilSuccess,
    /// Drop the node and hand control back to its parent.
    ReturnToParent,
    /// Drop the node and everything it would have led to.
    StopBranch,
}

impl RunMode {
    /// Wire discriminant.
    pub fn as_i32(self) -> i32 {
        match self {
            RunMode::RetryUntilSuccess => 0,
            RunMode::ReturnToParent => 1,
            RunMode::StopBranch => 2,
        }
    }

    pub fn from_i32(value: i32) -> Result<Self, PersistError> {
        match value {
            0 => Ok(RunMode::RetryUntilSuccess),
            1 => Ok(RunMode::ReturnToParent),
            2 => Ok(RunMode::StopBranch),
            other => Err(PersistError::InvalidRunMode(other)),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunMode::RetryUntilSuccess => "retry",
            RunMode::ReturnToParent => "return-to-parent",
            RunMode::StopBranch => "stop-branch",
        };
        f.write_str(label)
    }
}

impl FromStr for RunMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" | "retry-until-success" => Ok(RunMode::RetryUntilSuccess),
            "return-to-parent" | "return" => Ok(RunMode::ReturnToParent),
            "stop-branch" | "stop" => Ok(RunMode::StopBranch),
            _ => Err(DomainError::UnknownRunMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RunMode::RetryUntilSuccess)]
    #[case(RunMode::ReturnToParent)]
    #[case(RunMode::StopBranch)]
    fn given_run_mode_when_converting_discriminant_then_roundtrips(#[case] mode: RunMode) {
        assert_eq!(RunMode::from_i32(mode.as_i32()).unwrap(), mode);
    }

    #[test]
    fn given_unknown_discriminant_when_decoding_run_mode_then_errors() {
        let err = RunMode::from_i32(7).unwrap_err();
        assert!(matches!(err, PersistError::InvalidRunMode(7)));
    }

    #[rstest]
    #[case("retry", RunMode::RetryUntilSuccess)]
    #[case("Return-To-Parent", RunMode::ReturnToParent)]
    #[case("stop", RunMode::StopBranch)]
    fn given_mode_name_when_parsing_then_resolves(#[case] input: &str, #[case] expected: RunMode) {
        assert_eq!(input.parse::<RunMode>().unwrap(), expected);
    }

    #[test]
    fn given_display_label_when_parsing_then_roundtrips() {
        for mode in [RunMode::RetryUntilSuccess, RunMode::ReturnToParent, RunMode::StopBranch] {
            assert_eq!(mode.to_string().parse::<RunMode>().unwrap(), mode);
        }
    }

    #[test]
    fn given_unknown_mode_name_when_parsing_then_errors() {
        assert!(matches!(
            "sideways".parse::<RunMode>(),
            Err(DomainError::UnknownRunMode(_))
        ));
    }

    #[test]
    fn given_outcomes_when_checking_terminal_then_only_running_is_not() {
        assert!(TickResult::Success.is_terminal());
        assert!(TickResult::Failed.is_terminal());
        assert!(!TickResult::Running.is_terminal());
    }
}
