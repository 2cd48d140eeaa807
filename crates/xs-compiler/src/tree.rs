use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use xs_core::{CommandId, CommandSyntax, CommandType, ErrorArray, GameVersion};

use crate::node::{BranchLogic, CommandNode, NodeId};
use crate::traversal::{DepthTraversal, Traversal, TreeCursor};
use crate::visitor::{TreeReader, TreeVisitor};

const ROOT: NodeId = NodeId(0);

/// Lifecycle of a tree. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeState {
    Raw,
    Verified,
    Compiled,
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Verified => "verified",
            Self::Compiled => "compiled",
        })
    }
}

/// Arena-backed command tree. Slot 0 is the root sentinel, which is never yielded
/// by traversal.
///
/// Detached nodes stay in the arena but are unreachable from the root.
#[derive(Debug, Clone)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
    state: TreeState,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new()
    }
}

fn root_syntax() -> Arc<CommandSyntax> {
    Arc::new(CommandSyntax {
        id: CommandId::NOP,
        command_type: CommandType::Auxiliary,
        text: "",
        parameters: Vec::new(),
        variadic: None,
        min_game: GameVersion::Threat,
        expression: false,
        script_call: false,
        conditional: false,
    })
}

impl CommandTree {
    pub fn new() -> Self {
        let mut root = CommandNode::new(root_syntax(), Vec::new(), 0);
        root.logic = BranchLogic::Nop;
        Self {
            nodes: vec![root],
            state: TreeState::Raw,
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn state(&self) -> TreeState {
        self.state
    }

    pub(crate) fn advance_state(&mut self, state: TreeState) {
        self.state = self.state.max(state);
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut CommandNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&CommandNode> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Appends `node` as the last top-level command.
    pub fn push(&mut self, node: CommandNode) -> NodeId {
        self.push_child(ROOT, node)
    }

    pub fn push_child(&mut self, parent: NodeId, node: CommandNode) -> NodeId {
        let position = self.children(parent).len();
        self.insert_child(parent, position, node)
    }

    /// Inserts `node` under `parent`; positions past the end append.
    pub fn insert_child(&mut self, parent: NodeId, position: usize, node: CommandNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.attach(parent, position, id);
        id
    }

    /// Unlinks `id` (and its subtree) from its parent.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Moves `id` to become the last child of `parent`.
    pub(crate) fn reparent(&mut self, id: NodeId, parent: NodeId) {
        self.remove(id);
        let position = self.children(parent).len();
        self.attach(parent, position, id);
    }

    fn attach(&mut self, parent: NodeId, position: usize, id: NodeId) {
        let children = &mut self.nodes[parent.0].children;
        let position = position.min(children.len());
        children.insert(position, id);
        self.nodes[id.0].parent = Some(parent);
    }

    pub fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position_in_parent(id)?;
        self.children(parent).get(position + 1).copied()
    }

    /// Next sibling that is not a comment or no-op.
    pub fn next_significant_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position_in_parent(id)?;
        self.children(parent)[position + 1..]
            .iter()
            .copied()
            .find(|sibling| self.node(*sibling).logic != BranchLogic::Nop)
    }

    /// Previous sibling that is not a comment or no-op.
    pub fn previous_significant_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position_in_parent(id)?;
        self.children(parent)[..position]
            .iter()
            .rev()
            .copied()
            .find(|sibling| self.node(*sibling).logic != BranchLogic::Nop)
    }

    /// First node after the subtree of `id` in pre-order, climbing out of blocks as needed.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
    }

    fn preorder_next(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .first()
            .copied()
            .or_else(|| self.successor(id))
    }

    /// First standard node at or after `id` in pre-order.
    ///
    /// This is where control lands when jumping to an auxiliary node.
    pub fn first_standard_from(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current != ROOT && self.node(current).is_standard() {
                return Some(current);
            }
            cursor = self.preorder_next(current);
        }
        None
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Nesting level below the root; top-level commands are at depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count().saturating_sub(1)
    }

    /// Nearest enclosing `while` (or loop macro).
    pub fn enclosing_loop(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|ancestor| self.node(*ancestor).logic == BranchLogic::While)
    }

    pub fn find_label(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|id| self.node(*id).defines_label() == Some(name))
    }

    /// Depth-first pre-order over every reachable node except the root.
    pub fn iter(&self) -> TreeCursor<'_, DepthTraversal> {
        TreeCursor::start(self, ROOT)
    }

    pub fn iter_with<T: Traversal>(&self) -> TreeCursor<'_, T> {
        TreeCursor::start(self, ROOT)
    }

    pub fn to_list(&self) -> Vec<NodeId> {
        self.iter().collect()
    }

    /// Number of reachable nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.children(ROOT).is_empty()
    }

    /// Address one past the last indexed node.
    pub fn end_address(&self) -> u32 {
        self.iter()
            .filter(|id| self.node(*id).is_standard())
            .count() as u32
    }

    /// Runs a mutating pass over a snapshot of the tree in depth-first order.
    ///
    /// A node's failure is recorded and the pass moves on to the next node.
    pub fn transform<V: TreeVisitor>(&mut self, visitor: &mut V, errors: &mut ErrorArray) {
        let nodes = self.to_list();
        let before = errors.len();
        for id in &nodes {
            if let Err(error) = visitor.visit_node(self, *id, errors) {
                let error = error.or_at(self.node(*id).location());
                trace!(pass = V::NAME, line = self.node(*id).line_number, code = %error.code, "node failed");
                errors.push(error);
            }
        }
        debug!(
            pass = V::NAME,
            nodes = nodes.len(),
            errors = errors.len() - before,
            "pass finished"
        );
    }

    /// Read-only counterpart of [`CommandTree::transform`].
    pub fn visit<V: TreeReader>(&self, visitor: &mut V, errors: &mut ErrorArray) {
        let before = errors.len();
        let mut visited = 0usize;
        for id in self.iter() {
            visited += 1;
            if let Err(error) = visitor.visit_node(self, id, errors) {
                let error = error.or_at(self.node(id).location());
                trace!(pass = V::NAME, line = self.node(id).line_number, code = %error.code, "node failed");
                errors.push(error);
            }
        }
        debug!(
            pass = V::NAME,
            nodes = visited,
            errors = errors.len() - before,
            "pass finished"
        );
    }
}
