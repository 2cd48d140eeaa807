use xs_core::{CompilerError, ErrorArray, EMPTY_JUMP};

use crate::node::NodeId;
use crate::tree::CommandTree;
use crate::visitor::TreeVisitor;

/// Numbers standard commands 0, 1, 2, ... in depth-first order; every other
/// node is reset to `EMPTY_JUMP`.
#[derive(Debug, Default)]
pub struct NodeIndexer {
    next: u32,
}

impl NodeIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses handed out so far.
    pub fn count(&self) -> u32 {
        self.next
    }
}

impl TreeVisitor for NodeIndexer {
    const NAME: &'static str = "node-indexer";

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node_mut(node);
        if command.is_standard() {
            command.index = self.next;
            self.next += 1;
        } else {
            command.index = EMPTY_JUMP;
        }
        Ok(())
    }
}
