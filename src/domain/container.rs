//! Story container: drives an ordered set of child nodes one tick at a time.
//!
//! Structural changes produced while scanning children (a node finishing,
//! failing, handing over to successors) are staged and applied in one pass
//! after the scan, so the scan never observes a list it is mutating.
//!
//! Session layout written by [`Container::save`]:
//!
//! ```text
//! bool wasRunning
//! wasRunning = true:  i32 originalCount, (string tag, payload)*, i32 activeCount, i32 id*
//! wasRunning = false: i32 count, (string tag, payload)*
//! ```

use std::fmt;
use std::io::{Read, Write};

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::{NodeArena, StoryNode};
use crate::domain::behavior::{Behavior, Blackboard};
use crate::domain::codec::{BinaryReader, BinaryWriter};
use crate::domain::error::{PersistError, PersistResult};
use crate::domain::lifecycle::{Lifecycle, LifecycleState};
use crate::domain::outcome::{NodeId, RunMode, TickResult};
use crate::domain::registry::NodeRegistry;

/// Receives container notifications. Both hooks default to no-ops.
pub trait ContentObserver {
    /// A node was registered in the active list.
    fn node_added(&mut self, _node: &StoryNode, _idx: Index) {}

    /// A load finished; the container is fully restored.
    fn nodes_loaded(&mut self, _container: &Container) {}
}

impl<F> ContentObserver for F
where
    F: FnMut(&Container),
{
    fn nodes_loaded(&mut self, container: &Container) {
        self(container)
    }
}

/// Outcome of [`Container::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub was_running: bool,
    /// Nodes restored as the pre-run topology
    pub originals: usize,
    /// Nodes active after the load
    pub active: usize,
    /// Running ids that matched no loaded node
    pub dropped_ids: Vec<NodeId>,
    /// Nodes whose tag was unknown and got a placeholder
    pub placeholders: usize,
}

#[derive(Default)]
pub struct Container {
    nodes: NodeArena,
    active: Vec<Index>,
    pending_remove: Vec<Index>,
    pending_add: Vec<Index>,
    snapshot: Option<Vec<Index>>,
    lifecycle: LifecycleState,
    observers: Vec<Box<dyn ContentObserver>>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("active", &self.active)
            .field("snapshot", &self.snapshot)
            .field("lifecycle", &self.lifecycle)
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Arena access for building successor chains with [`NodeArena::link`].
    pub fn nodes_mut(&mut self) -> &mut NodeArena {
        &mut self.nodes
    }

    /// Active children in scan order.
    pub fn active(&self) -> &[Index] {
        &self.active
    }

    /// Pre-run topology; `Some` only while running.
    pub fn snapshot(&self) -> Option<&[Index]> {
        self.snapshot.as_deref()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn node(&self, idx: Index) -> Option<&StoryNode> {
        self.nodes.get(idx)
    }

    /// Ids of the active children, in scan order.
    pub fn active_ids(&self) -> Vec<NodeId> {
        self.active
            .iter()
            .filter_map(|&idx| self.nodes.get(idx).map(|n| n.id))
            .collect()
    }

    pub fn subscribe(&mut self, observer: Box<dyn ContentObserver>) {
        self.observers.push(observer);
    }

    /// Creates a node in this container's arena without registering it.
    /// Use for successors, then [`NodeArena::link`] them.
    pub fn insert_node(&mut self, id: NodeId, run_mode: RunMode, behavior: Box<dyn Behavior>) -> Index {
        self.nodes.insert(id, run_mode, behavior)
    }

    /// Takes a new node into this container: creates it and registers it.
    pub fn attach(&mut self, id: NodeId, run_mode: RunMode, behavior: Box<dyn Behavior>) -> Index {
        let idx = self.nodes.insert(id, run_mode, behavior);
        self.add(idx);
        idx
    }

    /// Registers a node. Does not touch the node's parent link.
    ///
    /// Returns `false` for an index that is not in the arena or already active.
    #[instrument(level = "trace", skip(self))]
    pub fn add(&mut self, idx: Index) -> bool {
        let Some(node) = self.nodes.get(idx) else {
            return false;
        };
        if self.active.contains(&idx) {
            return false;
        }
        self.active.push(idx);
        for observer in self.observers.iter_mut() {
            observer.node_added(node, idx);
        }
        true
    }

    /// Registers each node in order; already-present nodes are skipped.
    pub fn add_all(&mut self, nodes: &[Index]) {
        for &idx in nodes {
            self.add(idx);
        }
    }

    /// Removes the node from the active list. The node stays in the arena.
    pub fn remove(&mut self, idx: Index) -> bool {
        match self.active.iter().position(|&i| i == idx) {
            Some(pos) => {
                self.active.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Depth-first: each active child's own id, then its subtree.
    pub fn find_by_id(&self, id: NodeId) -> Option<Index> {
        self.active
            .iter()
            .find_map(|&idx| self.nodes.find_descendant(idx, id))
    }

    /// Applies staged removals, then staged additions, then clears both.
    fn apply_pending(&mut self) {
        if !self.pending_remove.is_empty() {
            let removals = std::mem::take(&mut self.pending_remove);
            for &idx in &removals {
                self.remove(idx);
            }
            self.pending_remove = removals;
            self.pending_remove.clear();
        }

        if !self.pending_add.is_empty() {
            let additions = std::mem::take(&mut self.pending_add);
            self.add_all(&additions);
            self.pending_add = additions;
            self.pending_add.clear();
        }
    }

    /// Stages the consequences of one terminal child result.
    fn stage(&mut self, idx: Index, result: TickResult) {
        let Some(node) = self.nodes.get(idx) else {
            return;
        };
        match (result, node.run_mode) {
            (TickResult::Running, _) => {}
            (TickResult::Failed, RunMode::RetryUntilSuccess) => {
                debug!(id = node.id, "failed, retrying next tick");
            }
            (TickResult::Failed, RunMode::ReturnToParent) => {
                debug!(id = node.id, "failed, returning to parent");
                self.pending_remove.push(idx);
                if let Some(parent) = node.parent {
                    self.pending_add.push(parent);
                }
            }
            (TickResult::Failed, RunMode::StopBranch) => {
                debug!(id = node.id, "failed, stopping branch");
                self.pending_remove.push(idx);
            }
            (TickResult::Success, _) => {
                debug!(id = node.id, successors = node.next.len(), "succeeded");
                self.pending_remove.push(idx);
                self.nodes.collect_successors(idx, &mut self.pending_add);
            }
        }
    }

    /// Writes the session layout described in the module docs.
    #[instrument(level = "debug", skip(self, w))]
    pub fn save<W: Write>(&self, w: &mut BinaryWriter<W>) -> PersistResult<()> {
        self.lifecycle.on_saved(w)?;

        let running = self.is_active();
        w.write_bool(running)?;
        if running {
            let originals = self.snapshot.as_deref().unwrap_or(&self.active);
            self.write_nodes(originals, w)?;

            w.write_len(self.active.len())?;
            for &idx in &self.active {
                let node = self.nodes.get(idx).ok_or(PersistError::StaleNode(idx))?;
                w.write_i32(node.id)?;
            }
        } else {
            self.write_nodes(&self.active, w)?;
        }
        debug!(running, active = self.active.len(), "saved");
        Ok(())
    }

    fn write_nodes<W: Write>(&self, list: &[Index], w: &mut BinaryWriter<W>) -> PersistResult<()> {
        w.write_len(list.len())?;
        for &idx in list {
            let node = self.nodes.get(idx).ok_or(PersistError::StaleNode(idx))?;
            w.write_string(node.type_tag())?;
            self.nodes.write_node(idx, w)?;
        }
        Ok(())
    }

    /// Replaces this container's contents with a saved session.
    ///
    /// Unknown tags are loaded as placeholders and running ids that resolve
    /// to nothing are dropped; only a malformed stream is an error. Observers
    /// get `nodes_loaded` once the container is fully restored.
    #[instrument(level = "debug", skip(self, r, registry))]
    pub fn load<R: Read>(
        &mut self,
        r: &mut BinaryReader<R>,
        registry: &NodeRegistry,
    ) -> PersistResult<LoadReport> {
        self.active.clear();
        self.pending_remove.clear();
        self.pending_add.clear();
        self.snapshot = None;
        self.nodes.clear();

        self.lifecycle.on_loaded(r)?;
        let was_running = r.read_bool()?;
        let mut report = LoadReport {
            was_running,
            ..Default::default()
        };

        let count = r.read_len()?;
        for _ in 0..count {
            let tag = r.read_string()?;
            let (behavior, placeholder) = registry.create_or_placeholder(&tag);
            let idx = self.nodes.insert(0, RunMode::default(), behavior);
            report.placeholders += usize::from(placeholder) + self.nodes.read_node(idx, r, registry)?;
            self.add(idx);
        }
        let originals = self.active.clone();
        report.originals = originals.len();

        if was_running {
            // grows with ids actually read; the count itself is untrusted
            let running_count = r.read_len()?;
            let mut running = Vec::new();
            for _ in 0..running_count {
                let id = r.read_i32()?;
                match originals
                    .iter()
                    .find_map(|&root| self.nodes.find_descendant(root, id))
                {
                    Some(idx) => running.push(idx),
                    None => {
                        warn!(id, "running node not found in loaded tree, dropped");
                        report.dropped_ids.push(id);
                    }
                }
            }

            for &idx in &originals {
                self.remove(idx);
            }
            self.add_all(&running);
            self.snapshot = Some(originals);
            self.lifecycle.resume();
        }
        report.active = self.active.len();
        debug!(?report, "loaded");

        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.nodes_loaded(self);
        }
        observers.append(&mut self.observers);
        self.observers = observers;

        Ok(report)
    }
}

impl Lifecycle for Container {
    fn state(&self) -> &LifecycleState {
        &self.lifecycle
    }

    fn state_mut(&mut self) -> &mut LifecycleState {
        &mut self.lifecycle
    }

    fn on_start(&mut self) {
        self.snapshot = Some(self.active.clone());
        debug!(nodes = self.active.len(), "snapshot taken");
    }

    /// Advances every active child once. An empty container reports
    /// `Success`; otherwise the container keeps `Running`.
    fn on_update(&mut self, blackboard: &mut Blackboard) -> TickResult {
        if self.active.is_empty() {
            return TickResult::Success;
        }

        let tick = self.lifecycle.ticks();
        let mut i = 0;
        while i < self.active.len() {
            let idx = self.active[i];
            i += 1;
            match self.nodes.advance(idx, tick, blackboard) {
                Some(result) => self.stage(idx, result),
                None => warn!(?idx, "active node missing from arena"),
            }
        }

        self.apply_pending();
        TickResult::Running
    }

    fn on_end(&mut self) {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.active.clear();
                self.active.extend(snapshot);
                debug!(nodes = self.active.len(), "topology restored");
            }
            None => warn!("no snapshot to restore"),
        }
    }
}
