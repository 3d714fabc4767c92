use std::io::{Read, Write};

use generational_arena::{Arena, Index};
use tracing::{instrument, trace};

use crate::domain::behavior::{Behavior, Blackboard, TickContext};
use crate::domain::codec::{BinaryReader, BinaryWriter, PayloadReader, PayloadWriter};
use crate::domain::error::{DomainError, PersistError, PersistResult};
use crate::domain::outcome::{NodeId, RunMode, TickResult};
use crate::domain::registry::NodeRegistry;

/// Story node stored in the arena.
#[derive(Debug)]
pub struct StoryNode {
    pub id: NodeId,
    /// Index of the parent node in the arena, None for roots.
    /// A relation only: the arena owns every node.
    pub parent: Option<Index>,
    pub run_mode: RunMode,
    /// Successors in hand-over order
    pub next: Vec<Index>,
    pub behavior: Box<dyn Behavior>,
}

impl StoryNode {
    pub fn type_tag(&self) -> &str {
        self.behavior.type_tag()
    }
}

/// Arena-based storage for the nodes of one story tree.
///
/// Uses generational arena for memory-safe node references; parent links are
/// plain indices so the parent/child graph never forms an ownership cycle.
#[derive(Debug, Default)]
pub struct NodeArena {
    arena: Arena<StoryNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    #[instrument(level = "trace", skip(self, behavior))]
    pub fn insert(&mut self, id: NodeId, run_mode: RunMode, behavior: Box<dyn Behavior>) -> Index {
        self.arena.insert(StoryNode {
            id,
            parent: None,
            run_mode,
            next: Vec::new(),
            behavior,
        })
    }

    pub fn get(&self, idx: Index) -> Option<&StoryNode> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: Index) -> Option<&mut StoryNode> {
        self.arena.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
    }

    /// Appends `child` to `parent`'s successors and points `child` back at `parent`.
    #[instrument(level = "debug", skip(self))]
    pub fn link(&mut self, parent: Index, child: Index) -> Result<(), DomainError> {
        let child_node = self.arena.get(child).ok_or(DomainError::UnknownNode(child))?;
        let child_id = child_node.id;
        if child_node.parent.is_some() {
            return Err(DomainError::AlreadyLinked { child: child_id });
        }
        if !self.arena.contains(parent) {
            return Err(DomainError::UnknownNode(parent));
        }

        // child must not be parent itself or one of its ancestors
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(DomainError::CycleDetected(child_id));
            }
            cursor = self.arena.get(current).and_then(|n| n.parent);
        }

        if let Some(node) = self.arena.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.arena.get_mut(parent) {
            node.next.push(child);
        }
        Ok(())
    }

    /// Advances one node; `None` if the index is stale.
    pub fn advance(&mut self, idx: Index, tick: u64, blackboard: &mut Blackboard) -> Option<TickResult> {
        let node = self.arena.get_mut(idx)?;
        let mut ctx = TickContext {
            tick,
            node: node.id,
            blackboard,
        };
        let result = node.behavior.advance(&mut ctx);
        trace!(id = node.id, %result, "advanced");
        Some(result)
    }

    pub fn collect_successors(&self, idx: Index, into: &mut Vec<Index>) {
        if let Some(node) = self.arena.get(idx) {
            into.extend_from_slice(&node.next);
        }
    }

    /// Pre-order search of the subtree rooted at `idx`, `idx` included.
    #[instrument(level = "trace", skip(self))]
    pub fn find_descendant(&self, idx: Index, id: NodeId) -> Option<Index> {
        self.iter_subtree(idx)
            .find(|(_, node)| node.id == id)
            .map(|(found, _)| found)
    }

    pub fn iter_subtree(&self, root: Index) -> SubtreeIterator<'_> {
        SubtreeIterator::new(self, root)
    }

    /// Writes the node payload: id, run mode, behavior bytes, then every
    /// successor as `(tag, payload)`.
    ///
    /// Walks with an explicit stack, so chain depth is bounded by the heap.
    pub fn write_node<W: Write>(&self, root: Index, w: &mut BinaryWriter<W>) -> PersistResult<()> {
        self.write_header(root, w)?;
        // (node, next successor to emit)
        let mut stack = vec![(root, 0usize)];
        while let Some((idx, cursor)) = stack.last_mut() {
            let node = self.arena.get(*idx).ok_or(PersistError::StaleNode(*idx))?;
            let Some(&child) = node.next.get(*cursor) else {
                stack.pop();
                continue;
            };
            *cursor += 1;
            let child_node = self.arena.get(child).ok_or(PersistError::StaleNode(child))?;
            w.write_string(child_node.type_tag())?;
            self.write_header(child, w)?;
            stack.push((child, 0));
        }
        Ok(())
    }

    /// Everything before the successor list: id, run mode, behavior bytes, successor count.
    fn write_header<W: Write>(&self, idx: Index, w: &mut BinaryWriter<W>) -> PersistResult<()> {
        let node = self.arena.get(idx).ok_or(PersistError::StaleNode(idx))?;
        w.write_i32(node.id)?;
        w.write_i32(node.run_mode.as_i32())?;

        let mut payload = PayloadWriter::buffer();
        node.behavior.save(&mut payload)?;
        w.write_bytes(&payload.into_inner())?;

        w.write_len(node.next.len())?;
        Ok(())
    }

    /// Fills the node at `root` from a payload written by [`write_node`](Self::write_node),
    /// creating its successors on the way. Returns the number of placeholder
    /// substitutions made in the subtree.
    pub fn read_node<R: Read>(
        &mut self,
        root: Index,
        r: &mut BinaryReader<R>,
        registry: &NodeRegistry,
    ) -> PersistResult<usize> {
        let mut substituted = 0;
        let successors = self.read_header(root, r)?;
        // (node, successors still to read)
        let mut stack = vec![(root, successors)];
        while let Some((parent, remaining)) = stack.last_mut() {
            if *remaining == 0 {
                stack.pop();
                continue;
            }
            *remaining -= 1;
            let parent = *parent;

            let tag = r.read_string()?;
            let (behavior, placeholder) = registry.create_or_placeholder(&tag);
            substituted += usize::from(placeholder);
            let child = self.insert(0, RunMode::default(), behavior);
            if let Some(node) = self.arena.get_mut(child) {
                node.parent = Some(parent);
            }
            if let Some(node) = self.arena.get_mut(parent) {
                node.next.push(child);
            }

            let successors = self.read_header(child, r)?;
            stack.push((child, successors));
        }
        Ok(substituted)
    }

    /// Reads id, run mode and behavior bytes into `idx`; returns the successor count.
    fn read_header<R: Read>(&mut self, idx: Index, r: &mut BinaryReader<R>) -> PersistResult<usize> {
        let id = r.read_i32()?;
        let run_mode = RunMode::from_i32(r.read_i32()?)?;
        let payload = r.read_bytes()?;

        let node = self.arena.get_mut(idx).ok_or(PersistError::StaleNode(idx))?;
        node.id = id;
        node.run_mode = run_mode;
        let mut payload_reader: PayloadReader<'_> = BinaryReader::new(payload.as_slice());
        node.behavior.load(&mut payload_reader)?;

        r.read_len()
    }
}

/// Pre-order, left-to-right walk over one subtree.
pub struct SubtreeIterator<'a> {
    arena: &'a NodeArena,
    stack: Vec<Index>,
}

impl<'a> SubtreeIterator<'a> {
    fn new(arena: &'a NodeArena, root: Index) -> Self {
        Self {
            arena,
            stack: vec![root],
        }
    }
}

impl<'a> Iterator for SubtreeIterator<'a> {
    type Item = (Index, &'a StoryNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.arena.get(current) {
                // Push successors in reverse order for left-to-right traversal
                for &child in node.next.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, node));
            }
        }
        None
    }
}
