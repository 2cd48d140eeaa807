use std::collections::VecDeque;
use std::fmt;

use crate::error::TreeError;
use crate::node::NodeId;
use crate::tree::CommandTree;

/// Order in which a [`TreeCursor`] discovers nodes.
pub trait Traversal: Default {
    /// Queues the children of `node` for later visits.
    fn add_successors(&mut self, tree: &CommandTree, node: NodeId);

    fn next_successor(&mut self) -> Option<NodeId>;
}

/// Pre-order: a node, then each child subtree in order.
#[derive(Debug, Default, Clone)]
pub struct DepthTraversal {
    stack: Vec<NodeId>,
}

impl Traversal for DepthTraversal {
    fn add_successors(&mut self, tree: &CommandTree, node: NodeId) {
        self.stack.extend(tree.children(node).iter().rev().copied());
    }

    fn next_successor(&mut self) -> Option<NodeId> {
        self.stack.pop()
    }
}

/// Level order.
#[derive(Debug, Default, Clone)]
pub struct BreadthTraversal {
    queue: VecDeque<NodeId>,
}

impl Traversal for BreadthTraversal {
    fn add_successors(&mut self, tree: &CommandTree, node: NodeId) {
        self.queue.extend(tree.children(node).iter().copied());
    }

    fn next_successor(&mut self) -> Option<NodeId> {
        self.queue.pop_front()
    }
}

/// Position within a tree walk. The start node itself is never yielded.
///
/// Two cursors are equal when they walk the same tree and stand on the same node;
/// every exhausted cursor over a tree equals [`TreeCursor::end`].
pub struct TreeCursor<'t, T: Traversal> {
    tree: &'t CommandTree,
    position: Option<NodeId>,
    strategy: T,
}

impl<'t, T: Traversal> TreeCursor<'t, T> {
    pub fn new(tree: &'t CommandTree, start: Option<NodeId>) -> Result<Self, TreeError> {
        let start = start.ok_or(TreeError::ArgumentNull("start node"))?;
        Ok(Self::start(tree, start))
    }

    pub(crate) fn start(tree: &'t CommandTree, start: NodeId) -> Self {
        let mut strategy = T::default();
        strategy.add_successors(tree, start);
        let mut cursor = Self {
            tree,
            position: None,
            strategy,
        };
        cursor.step();
        cursor
    }

    pub fn end(tree: &'t CommandTree) -> Self {
        Self {
            tree,
            position: None,
            strategy: T::default(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.position.is_none()
    }

    pub fn current(&self) -> Result<NodeId, TreeError> {
        self.position
            .ok_or(TreeError::InvalidOperation("cursor is past the last node"))
    }

    pub fn advance(&mut self) -> Result<(), TreeError> {
        if self.position.is_none() {
            return Err(TreeError::InvalidOperation("cannot advance past the last node"));
        }
        self.step();
        Ok(())
    }

    fn step(&mut self) {
        self.position = self.strategy.next_successor();
        if let Some(node) = self.position {
            self.strategy.add_successors(self.tree, node);
        }
    }
}

impl<T: Traversal> PartialEq for TreeCursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.position == other.position
    }
}

impl<T: Traversal> fmt::Debug for TreeCursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeCursor")
            .field("position", &self.position)
            .finish()
    }
}

impl<T: Traversal> Iterator for TreeCursor<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.position?;
        self.step();
        Some(current)
    }
}
