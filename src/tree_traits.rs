//! Text rendering of a container's node forest with `termtree`.

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{Container, Lifecycle, NodeArena};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

/// `#id tag [run-mode]`
pub fn node_label(arena: &NodeArena, idx: Index) -> String {
    match arena.get(idx) {
        Some(node) => format!("#{} {} [{}]", node.id, node.type_tag(), node.run_mode),
        None => format!("<stale {:?}>", idx),
    }
}

/// Levels below this collapse into one summary leaf; termtree displays and
/// drops its trees recursively.
pub const MAX_RENDER_DEPTH: usize = 128;

fn build_tree(arena: &NodeArena, root: Index) -> Tree<String> {
    // (node, rendered so far, next successor to visit, depth)
    let mut stack = vec![(root, Tree::new(node_label(arena, root)), 0usize, 1usize)];
    let mut rendered = None;
    while let Some((idx, tree, cursor, depth)) = stack.last_mut() {
        let successors = arena.get(*idx).map(|n| n.next.as_slice()).unwrap_or_default();
        let Some(&child) = successors.get(*cursor) else {
            if let Some((_, done, _, _)) = stack.pop() {
                match stack.last_mut() {
                    Some((_, parent, _, _)) => {
                        parent.push(done);
                    }
                    None => rendered = Some(done),
                }
            }
            continue;
        };
        if *depth >= MAX_RENDER_DEPTH {
            let hidden = arena.iter_subtree(*idx).count() - 1;
            tree.push(Tree::new(format!("({hidden} deeper nodes)")));
            *cursor = successors.len();
            continue;
        }
        *cursor += 1;
        let depth = *depth + 1;
        stack.push((child, Tree::new(node_label(arena, child)), 0, depth));
    }
    rendered.unwrap_or_else(|| Tree::new(node_label(arena, root)))
}

/// One line per index, without subtrees.
fn flat_list(arena: &NodeArena, title: &str, list: &[Index]) -> Tree<String> {
    let leaves: Vec<_> = list
        .iter()
        .map(|&idx| Tree::new(node_label(arena, idx)))
        .collect();
    Tree::new(format!("{} ({})", title, list.len())).with_leaves(leaves)
}

impl TreeNodeConvert for Container {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        let arena = self.nodes();
        let status = if self.is_active() { "running" } else { "idle" };
        let mut root = Tree::new(format!("container ({})", status));

        // Full topology: the snapshot while running, the active list otherwise
        let topology = self.snapshot().unwrap_or(self.active());
        let forest: Vec<_> = topology.iter().map(|&idx| build_tree(arena, idx)).collect();
        root.push(Tree::new("topology".to_string()).with_leaves(forest));

        if self.is_active() {
            root.push(flat_list(arena, "active", self.active()));
        }
        root
    }
}
