use tracing::trace;
use xs_core::{CommandId, CompilerError, ErrorArray, ScriptFile, SyntaxLibrary};

use crate::error::TreeError;
use crate::node::{BranchLogic, CommandNode, NodeId};
use crate::tree::CommandTree;
use crate::visitor::TreeVisitor;

/// Resolves the jump target of every branch and inserts the hidden jumps that
/// close blocks.
///
/// Targets may be auxiliary nodes (`else`, labels, `end`); the
/// [`LinkageFinalizer`](crate::LinkageFinalizer) moves them onto the standard
/// command where control actually lands.
pub struct NodeLinker<'a> {
    script: &'a ScriptFile,
    library: &'a SyntaxLibrary,
}

impl<'a> NodeLinker<'a> {
    pub fn new(script: &'a ScriptFile, library: &'a SyntaxLibrary) -> Self {
        Self { script, library }
    }

    fn link(&self, tree: &mut CommandTree, node: NodeId) -> Result<(), CompilerError> {
        let command = tree.node(node);
        match command.logic {
            BranchLogic::If | BranchLogic::ElseIf => self.link_conditional(tree, node),
            BranchLogic::SkipIf => {
                let target = block_exit(tree, node, "skip if")?;
                tree.node_mut(node).jump_target = Some(target);
                Ok(())
            }
            BranchLogic::While => {
                let exit = block_exit(tree, node, "while")?;
                tree.node_mut(node).jump_target = Some(exit);
                let back = self.hidden_jump(tree, node, node)?;
                tree.push_child(node, back);
                Ok(())
            }
            BranchLogic::Break => {
                let line_number = command.line_number;
                let enclosing = tree.enclosing_loop(node).ok_or(TreeError::LoopNotFound {
                    keyword: "break",
                    line_number,
                })?;
                let exit = block_exit(tree, enclosing, "while")?;
                self.link_loop_control(tree, node, exit)
            }
            BranchLogic::Continue => {
                let line_number = command.line_number;
                let enclosing = tree.enclosing_loop(node).ok_or(TreeError::LoopNotFound {
                    keyword: "continue",
                    line_number,
                })?;
                self.link_loop_control(tree, node, enclosing)
            }
            BranchLogic::None if command.is_goto() => {
                let Some(name) = command.label_reference().map(str::to_string) else {
                    return Ok(());
                };
                if !self.script.labels.contains(&name) {
                    return Err(TreeError::LabelNotFound { name }.into());
                }
                let target = tree
                    .find_label(&name)
                    .ok_or(TreeError::LabelNotFound { name })?;
                tree.node_mut(node).jump_target = Some(target);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// `if`/`else if`: jump to the next branch of the chain when the condition
    /// fails, and close the branch with a jump past the whole chain.
    fn link_conditional(&self, tree: &mut CommandTree, node: NodeId) -> Result<(), CompilerError> {
        let alternate = tree
            .next_significant_sibling(node)
            .filter(|sibling| {
                matches!(
                    tree.node(*sibling).logic,
                    BranchLogic::ElseIf | BranchLogic::Else
                )
            });

        let Some(alternate) = alternate else {
            let exit = block_exit(tree, node, "if")?;
            tree.node_mut(node).jump_target = Some(exit);
            return Ok(());
        };
        tree.node_mut(node).jump_target = Some(alternate);

        let last_executable = tree
            .children(node)
            .iter()
            .rev()
            .copied()
            .find(|child| tree.node(*child).is_executable());
        if !matches!(last_executable, Some(last) if tree.node(last).ends_flow()) {
            let chain_end = chain_end(tree, alternate);
            let exit = block_exit(tree, chain_end, "if")?;
            let jump = self.hidden_jump(tree, node, exit)?;
            tree.push_child(node, jump);
        }
        Ok(())
    }

    /// `break`/`continue`: the node is auxiliary, so a hidden jump placed first
    /// inside it carries the transfer.
    fn link_loop_control(
        &self,
        tree: &mut CommandTree,
        node: NodeId,
        target: NodeId,
    ) -> Result<(), CompilerError> {
        tree.node_mut(node).jump_target = Some(target);
        let jump = self.hidden_jump(tree, node, target)?;
        tree.insert_child(node, 0, jump);
        Ok(())
    }

    fn hidden_jump(
        &self,
        tree: &CommandTree,
        owner: NodeId,
        target: NodeId,
    ) -> Result<CommandNode, CompilerError> {
        let syntax = self.library.find(CommandId::HIDDEN_JUMP, self.script.game)?;
        let jump = CommandNode::hidden_jump(syntax, tree.node(owner).line_number, target)?;
        trace!(line = jump.line_number, "hidden jump inserted");
        Ok(jump)
    }
}

impl TreeVisitor for NodeLinker<'_> {
    const NAME: &'static str = "node-linker";

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        self.link(tree, node)
            .map_err(|error| error.wrapped("LINK_FAILED", "Linking failed: "))
    }
}

/// Last member of the `else if`/`else` run that starts at `first`.
fn chain_end(tree: &CommandTree, first: NodeId) -> NodeId {
    let mut last = first;
    while tree.node(last).logic == BranchLogic::ElseIf {
        match tree.next_significant_sibling(last) {
            Some(next)
                if matches!(
                    tree.node(next).logic,
                    BranchLogic::ElseIf | BranchLogic::Else
                ) =>
            {
                last = next
            }
            _ => break,
        }
    }
    last
}

/// Where control continues once the block opened by `node` is done.
fn block_exit(tree: &CommandTree, node: NodeId, keyword: &str) -> Result<NodeId, CompilerError> {
    tree.successor(node).ok_or_else(|| {
        CompilerError::new(
            "LINK_FAILED",
            format!(
                "No command follows the '{}' block on line {}.",
                keyword,
                tree.node(node).line_number
            ),
        )
    })
}

#[cfg(test)]
mod linker_tests {
    use super::*;
    use crate::compiler_test_support::*;
    use crate::identify::VariableIdentifier;
    use crate::options::CompileOptions;
    use xs_core::{Argument, Conditional};

    fn link(tree: &mut CommandTree) -> ErrorArray {
        let mut script = script();
        let mut errors = ErrorArray::new();
        tree.transform(
            &mut VariableIdentifier::new(&mut script, CompileOptions::default()),
            &mut errors,
        );
        tree.transform(
            &mut NodeLinker::new(&script, SyntaxLibrary::shared()),
            &mut errors,
        );
        errors
    }

    #[test]
    fn while_exits_forward_and_loops_back() {
        let mut tree = CommandTree::new();
        let head = tree.push(branch(1, Conditional::While, vec![Argument::var("x")]));
        tree.push_child(head, wait(2, 10));
        tree.push_child(head, keyword(CommandId::END, 3));
        let after = tree.push(ret(4));

        let errors = link(&mut tree);

        assert!(errors.is_empty());
        assert_eq!(tree.node(head).jump_target, Some(after));
        let back = *tree.children(head).last().expect("back jump");
        assert!(tree.node(back).hidden);
        assert_eq!(tree.node(back).jump_target, Some(head));
    }

    #[test]
    fn if_else_chain_links_alternates_and_exit_jumps() {
        let mut tree = CommandTree::new();
        let first = tree.push(branch(1, Conditional::If, vec![Argument::var("a")]));
        tree.push_child(first, wait(2, 1));
        let second = tree.push(branch(3, Conditional::ElseIf, vec![Argument::var("b")]));
        tree.push_child(second, ret(4));
        let last = tree.push(keyword(CommandId::ELSE, 5));
        tree.push_child(last, wait(6, 3));
        tree.push_child(last, keyword(CommandId::END, 7));
        let after = tree.push(ret(8));

        let errors = link(&mut tree);

        assert!(errors.is_empty());
        assert_eq!(tree.node(first).jump_target, Some(second));
        assert_eq!(tree.node(second).jump_target, Some(last));

        let exit = *tree.children(first).last().expect("exit jump");
        assert!(tree.node(exit).hidden);
        assert_eq!(tree.node(exit).jump_target, Some(after));
        // the else-if branch returns, so no exit jump is appended
        assert_eq!(tree.children(second).len(), 1);
    }

    #[test]
    fn break_and_continue_target_enclosing_loop() {
        let mut tree = CommandTree::new();
        let head = tree.push(branch(1, Conditional::While, vec![Argument::var("x")]));
        let stop = tree.push_child(head, keyword(CommandId::BREAK, 2));
        let again = tree.push_child(head, keyword(CommandId::CONTINUE, 3));
        tree.push_child(head, keyword(CommandId::END, 4));
        let after = tree.push(ret(5));

        let errors = link(&mut tree);

        assert!(errors.is_empty());
        assert_eq!(tree.node(stop).jump_target, Some(after));
        assert_eq!(tree.node(again).jump_target, Some(head));
        let jump = tree.children(stop)[0];
        assert!(tree.node(jump).hidden);
        assert_eq!(tree.node(jump).jump_target, Some(after));
    }

    #[test]
    fn break_outside_loop_is_a_link_error() {
        let mut tree = CommandTree::new();
        tree.push(keyword(CommandId::BREAK, 1));
        tree.push(ret(2));

        let errors = link(&mut tree);

        assert_eq!(errors.count_code("LINK_FAILED"), 1);
        let error = errors.first().expect("link error");
        assert!(error.message.starts_with("Linking failed: "));
        assert_eq!(error.line_number(), Some(1));
    }

    #[test]
    fn goto_targets_its_label() {
        let mut tree = CommandTree::new();
        let jump = tree.push(goto(1, "finish"));
        tree.push(wait(2, 1));
        let target = tree.push(label(3, "finish"));
        tree.push(ret(4));

        let errors = link(&mut tree);

        assert!(errors.is_empty());
        assert_eq!(tree.node(jump).jump_target, Some(target));

        let mut missing = CommandTree::new();
        missing.push(goto(1, "nowhere"));
        let errors = link(&mut missing);
        assert_eq!(errors.count_code("LINK_FAILED"), 1);
    }
}
