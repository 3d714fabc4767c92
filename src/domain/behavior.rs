//! Node behaviors: the type-specific half of a story node.
//!
//! A [`Behavior`] decides what one tick of a node does and owns the
//! type-specific part of the node payload. Structural data (id, run mode,
//! successors) lives on [`crate::domain::StoryNode`].

use std::collections::BTreeMap;
use std::fmt::Debug;

use tracing::trace;

use crate::domain::codec::{PayloadReader, PayloadWriter};
use crate::domain::error::PersistResult;
use crate::domain::outcome::{NodeId, TickResult};

/// Shared narrative state, owned by the host and handed to every tick.
pub type Blackboard = BTreeMap<String, i32>;

/// Per-advance context passed to a behavior.
#[derive(Debug)]
pub struct TickContext<'a> {
    /// Tick counter of the container driving this node, 1 on the first tick
    /// after a start.
    ///
    /// The counter is not part of the session layout: a loaded session resumes
    /// at 1 again. Behaviors that need progress across saves keep it in their
    /// own payload, as `wait` does with `elapsed`.
    pub tick: u64,
    /// Id of the node being advanced
    pub node: NodeId,
    pub blackboard: &'a mut Blackboard,
}

pub trait Behavior: Debug {
    /// Stable tag recorded in saved sessions and resolved by the registry.
    fn type_tag(&self) -> &str;

    /// Advance one step. Must not block.
    fn advance(&mut self, ctx: &mut TickContext<'_>) -> TickResult;

    fn save(&self, _w: &mut PayloadWriter) -> PersistResult<()> {
        Ok(())
    }

    fn load(&mut self, _r: &mut PayloadReader<'_>) -> PersistResult<()> {
        Ok(())
    }
}

pub const PASS_TAG: &str = "pass";
pub const WAIT_TAG: &str = "wait";
pub const SET_FLAG_TAG: &str = "set_flag";
pub const CHECK_FLAG_TAG: &str = "check_flag";
pub const PLACEHOLDER_TAG: &str = "placeholder";

/// Succeeds on the first advance.
#[derive(Debug, Clone, Default)]
pub struct Pass;

impl Behavior for Pass {
    fn type_tag(&self) -> &str {
        PASS_TAG
    }

    fn advance(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
        TickResult::Success
    }
}

/// Reports `Running` for `ticks` advances, then `Success`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wait {
    pub ticks: i32,
    pub elapsed: i32,
}

impl Wait {
    pub fn new(ticks: i32) -> Self {
        Self { ticks, elapsed: 0 }
    }
}

impl Behavior for Wait {
    fn type_tag(&self) -> &str {
        WAIT_TAG
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        if self.elapsed >= self.ticks {
            self.elapsed = 0;
            return TickResult::Success;
        }
        self.elapsed += 1;
        trace!(node = ctx.node, elapsed = self.elapsed, ticks = self.ticks, "wait");
        TickResult::Running
    }

    fn save(&self, w: &mut PayloadWriter) -> PersistResult<()> {
        w.write_i32(self.ticks)?;
        w.write_i32(self.elapsed)
    }

    fn load(&mut self, r: &mut PayloadReader<'_>) -> PersistResult<()> {
        self.ticks = r.read_i32()?;
        self.elapsed = r.read_i32()?;
        Ok(())
    }
}

/// Writes `key = value` to the blackboard and succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetFlag {
    pub key: String,
    pub value: i32,
}

impl SetFlag {
    pub fn new(key: impl Into<String>, value: i32) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl Behavior for SetFlag {
    fn type_tag(&self) -> &str {
        SET_FLAG_TAG
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        ctx.blackboard.insert(self.key.clone(), self.value);
        TickResult::Success
    }

    fn save(&self, w: &mut PayloadWriter) -> PersistResult<()> {
        w.write_string(&self.key)?;
        w.write_i32(self.value)
    }

    fn load(&mut self, r: &mut PayloadReader<'_>) -> PersistResult<()> {
        self.key = r.read_string()?;
        self.value = r.read_i32()?;
        Ok(())
    }
}

/// Succeeds when the blackboard holds `key == value`, fails otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckFlag {
    pub key: String,
    pub value: i32,
}

impl CheckFlag {
    pub fn new(key: impl Into<String>, value: i32) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl Behavior for CheckFlag {
    fn type_tag(&self) -> &str {
        CHECK_FLAG_TAG
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        match ctx.blackboard.get(&self.key) {
            Some(v) if *v == self.value => TickResult::Success,
            _ => TickResult::Failed,
        }
    }

    fn save(&self, w: &mut PayloadWriter) -> PersistResult<()> {
        w.write_string(&self.key)?;
        w.write_i32(self.value)
    }

    fn load(&mut self, r: &mut PayloadReader<'_>) -> PersistResult<()> {
        self.key = r.read_string()?;
        self.value = r.read_i32()?;
        Ok(())
    }
}

/// Stand-in for a node whose tag the registry could not resolve.
///
/// Keeps the original tag and raw payload so saving again loses nothing.
/// Always fails, leaving the decision to the node's run mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholder {
    pub original_tag: String,
    pub raw: Vec<u8>,
}

impl Placeholder {
    pub fn for_tag(tag: impl Into<String>) -> Self {
        Self {
            original_tag: tag.into(),
            raw: Vec::new(),
        }
    }
}

impl Behavior for Placeholder {
    fn type_tag(&self) -> &str {
        if self.original_tag.is_empty() {
            PLACEHOLDER_TAG
        } else {
            &self.original_tag
        }
    }

    fn advance(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
        TickResult::Failed
    }

    fn save(&self, w: &mut PayloadWriter) -> PersistResult<()> {
        w.write_raw(&self.raw)
    }

    fn load(&mut self, r: &mut PayloadReader<'_>) -> PersistResult<()> {
        self.raw = r.read_to_end()?;
        Ok(())
    }
}
