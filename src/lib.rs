//! storyrun: a story-tree container with a staged tick state machine and a
//! binary session format that survives save/load mid-run.
//!
//! Layers:
//! - [`domain`]: nodes, behaviors, the container, the session codec
//! - [`application`]: session service and story scripts
//! - [`infrastructure`]: filesystem boundary
//! - [`cli`]: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;

pub mod util {
    pub mod testing;
}
