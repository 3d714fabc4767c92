//! Story scripts: TOML authoring format for new sessions.
//!
//! ```toml
//! [[node]]
//! id = 1
//! tag = "check_flag"
//! mode = "stop-branch"
//! key = "door_open"
//! value = 1
//! next = [2]
//!
//! [[node]]
//! id = 2
//! tag = "wait"
//! ticks = 3
//! ```
//!
//! Nodes that no other node lists in `next` become the container's children,
//! in declaration order.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    Behavior, CheckFlag, Container, NodeId, NodeRegistry, RunMode, SetFlag, Wait, CHECK_FLAG_TAG,
    SET_FLAG_TAG, WAIT_TAG,
};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoryScript {
    #[serde(default, rename = "node")]
    pub nodes: Vec<ScriptNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptNode {
    pub id: NodeId,
    pub tag: String,
    /// `retry`, `return-to-parent` or `stop-branch` (default `retry`)
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub ticks: Option<i32>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<i32>,
    #[serde(default)]
    pub next: Vec<NodeId>,
}

fn invalid(message: impl Into<String>) -> ApplicationError {
    ApplicationError::InvalidScript {
        message: message.into(),
    }
}

impl ScriptNode {
    fn run_mode(&self) -> ApplicationResult<RunMode> {
        match &self.mode {
            Some(name) => Ok(name.parse::<RunMode>()?),
            None => Ok(RunMode::default()),
        }
    }

    fn required_key(&self) -> ApplicationResult<String> {
        self.key
            .clone()
            .ok_or_else(|| invalid(format!("node #{}: {} needs `key`", self.id, self.tag)))
    }

    fn behavior(&self, registry: &NodeRegistry) -> ApplicationResult<Box<dyn Behavior>> {
        let behavior: Box<dyn Behavior> = match self.tag.as_str() {
            WAIT_TAG => Box::new(Wait::new(self.ticks.unwrap_or(1))),
            SET_FLAG_TAG => Box::new(SetFlag::new(self.required_key()?, self.value.unwrap_or(1))),
            CHECK_FLAG_TAG => {
                Box::new(CheckFlag::new(self.required_key()?, self.value.unwrap_or(1)))
            }
            tag => registry
                .create(tag)
                .ok_or_else(|| invalid(format!("node #{}: unknown tag {:?}", self.id, tag)))?,
        };
        Ok(behavior)
    }
}

impl StoryScript {
    pub fn parse(text: &str) -> ApplicationResult<Self> {
        toml::from_str(text).map_err(|e| invalid(e.to_string()))
    }

    /// Builds an idle container holding the script's node forest.
    #[instrument(level = "debug", skip_all, fields(nodes = self.nodes.len()))]
    pub fn build(&self, registry: &NodeRegistry) -> ApplicationResult<Container> {
        let mut container = Container::new();
        let mut index = HashMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let idx = container.insert_node(node.id, node.run_mode()?, node.behavior(registry)?);
            if index.insert(node.id, idx).is_some() {
                return Err(invalid(format!("duplicate node id #{}", node.id)));
            }
        }

        let mut referenced = HashSet::new();
        for node in &self.nodes {
            for child in &node.next {
                let child_idx = *index.get(child).ok_or_else(|| {
                    invalid(format!("node #{}: successor #{} is not defined", node.id, child))
                })?;
                container.nodes_mut().link(index[&node.id], child_idx)?;
                referenced.insert(*child);
            }
        }

        for node in self.nodes.iter().filter(|n| !referenced.contains(&n.id)) {
            container.add(index[&node.id]);
        }
        debug!(roots = container.len(), "script built");
        Ok(container)
    }
}
