use xs_core::{CompilerError, ErrorArray};

use crate::node::NodeId;
use crate::tree::CommandTree;

/// A pass that may rewrite the tree. Driven by [`CommandTree::transform`].
///
/// Returning `Err` records the error against the node and the pass continues.
/// Visitors with several findings per node push extras straight into `errors`.
pub trait TreeVisitor {
    const NAME: &'static str;

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        errors: &mut ErrorArray,
    ) -> Result<(), CompilerError>;
}

/// A read-only pass. Driven by [`CommandTree::visit`].
pub trait TreeReader {
    const NAME: &'static str;

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        errors: &mut ErrorArray,
    ) -> Result<(), CompilerError>;
}
