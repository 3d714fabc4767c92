//! Domain-level errors (no external dependencies)

use generational_arena::Index;
use thiserror::Error;

use crate::domain::outcome::NodeId;

/// Domain errors represent story-tree structure violations.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("node not found in arena: {0:?}")]
    UnknownNode(Index),

    #[error("node #{child} already has a parent")]
    AlreadyLinked { child: NodeId },

    #[error("linking would create a cycle at node #{0}")]
    CycleDetected(NodeId),

    #[error("unknown run mode: {0:?} (expected retry, return-to-parent or stop-branch)")]
    UnknownRunMode(String),
}

/// Failures reading or writing the binary session format.
///
/// A truncated or malformed stream surfaces here; nothing at this layer
/// attempts to recover from it.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("string length prefix is longer than 5 bytes")]
    LengthPrefixOverflow,

    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("unknown run mode discriminant: {0}")]
    InvalidRunMode(i32),

    #[error("stale node index: {0:?}")]
    StaleNode(Index),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;
