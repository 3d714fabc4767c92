//! Domain layer: story nodes, the container and the session format
//!
//! This layer is independent of external concerns (no filesystem, no CLI, no config loading).

pub mod arena;
pub mod behavior;
pub mod codec;
pub mod container;
pub mod error;
pub mod lifecycle;
pub mod outcome;
pub mod registry;

pub use arena::{NodeArena, StoryNode, SubtreeIterator};
pub use behavior::{
    Behavior, Blackboard, CheckFlag, Pass, Placeholder, SetFlag, TickContext, Wait,
    CHECK_FLAG_TAG, PASS_TAG, PLACEHOLDER_TAG, SET_FLAG_TAG, WAIT_TAG,
};
pub use codec::{BinaryReader, BinaryWriter, PayloadReader, PayloadWriter};
pub use container::{Container, ContentObserver, LoadReport};
pub use error::{DomainError, PersistError, PersistResult};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use outcome::{NodeId, RunMode, TickResult};
pub use registry::{Constructor, NodeRegistry};
