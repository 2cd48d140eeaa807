use xs_core::{CommandType, CompilerError, ErrorArray, LabelArray};

use crate::node::{BranchLogic, NodeId};
use crate::tree::CommandTree;
use crate::visitor::TreeReader;

/// Structural checks on branch constructs.
#[derive(Debug, Default)]
pub struct LogicVerifier;

impl TreeReader for LogicVerifier {
    const NAME: &'static str = "logic-verifier";

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node(node);
        match command.logic {
            BranchLogic::ElseIf | BranchLogic::Else => {
                let follows_if = tree
                    .previous_significant_sibling(node)
                    .is_some_and(|previous| {
                        matches!(tree.node(previous).logic, BranchLogic::If | BranchLogic::ElseIf)
                    });
                if !follows_if {
                    return Err(command.error(
                        "BRANCH_ELSE_ORPHANED",
                        format!("'{}' must follow an 'if' or 'else if'.", command.logic),
                    ));
                }
            }
            BranchLogic::Break | BranchLogic::Continue => {
                if tree.enclosing_loop(node).is_none() {
                    return Err(command.error(
                        "BRANCH_OUTSIDE_LOOP",
                        format!("'{}' must be inside a 'while' loop.", command.logic),
                    ));
                }
            }
            BranchLogic::SkipIf => {
                let guarded = tree
                    .children(node)
                    .iter()
                    .filter(|child| tree.node(**child).logic != BranchLogic::Nop)
                    .collect::<Vec<_>>();
                let single_command =
                    matches!(guarded.as_slice(), [only] if tree.node(**only).is_executable());
                if !single_command {
                    return Err(command.error(
                        "BRANCH_SKIP_IF_TARGET",
                        "'skip if' must guard exactly one executable command.",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Reports `goto`/`gosub` commands naming a label the script never defines.
///
/// Runs after [`VariableIdentifier`](crate::VariableIdentifier) has filled the label table.
pub struct LabelVerifier<'a> {
    labels: &'a LabelArray,
}

impl<'a> LabelVerifier<'a> {
    pub fn new(labels: &'a LabelArray) -> Self {
        Self { labels }
    }
}

impl TreeReader for LabelVerifier<'_> {
    const NAME: &'static str = "label-verifier";

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node(node);
        if !command.is_goto() {
            return Ok(());
        }
        match command.label_reference() {
            Some(name) if !self.labels.contains(name) => Err(command.error(
                "LABEL_UNDEFINED",
                format!("Label '{}' is not defined.", name),
            )),
            _ => Ok(()),
        }
    }
}

/// Checks that control cannot run off the end of the script.
///
/// The top-level block terminates when its last statement is `return` or
/// `goto`, or an `if` chain with an `else` whose every branch terminates.
/// Loops never count as terminating. Fires once, on the last top-level statement.
#[derive(Debug, Default)]
pub struct TerminationVerifier {
    top_level: Option<Vec<NodeId>>,
}

impl TreeReader for TerminationVerifier {
    const NAME: &'static str = "termination-verifier";

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        if tree.parent(node) != Some(tree.root()) {
            return Ok(());
        }
        let top_level = self
            .top_level
            .get_or_insert_with(|| statements(tree, tree.children(tree.root())));
        if top_level.last() != Some(&node) {
            return Ok(());
        }
        if !block_terminates(tree, top_level) {
            return Err(tree.node(node).error(
                "SCRIPT_NOT_TERMINATED",
                "The script can reach its end without a 'return' or 'goto'.",
            ));
        }
        Ok(())
    }
}

/// Whether the tree holds at least one executable command.
pub fn has_executable_commands(tree: &CommandTree) -> bool {
    tree.iter().any(|id| tree.node(id).is_executable())
}

pub(crate) fn no_executable_commands(tree: &CommandTree) -> CompilerError {
    tree.node(tree.root())
        .error("NO_EXECUTABLE_COMMANDS", "No executable commands found")
}

/// Nodes that affect control flow: drops comments, labels and `end`.
fn statements(tree: &CommandTree, block: &[NodeId]) -> Vec<NodeId> {
    block
        .iter()
        .copied()
        .filter(|id| {
            let command = tree.node(*id);
            if command.logic == BranchLogic::Nop || command.hidden {
                return false;
            }
            !(command.syntax.is_type(CommandType::Auxiliary) && command.logic == BranchLogic::None)
        })
        .collect()
}

fn block_terminates(tree: &CommandTree, statements: &[NodeId]) -> bool {
    let Some((&last, earlier)) = statements.split_last() else {
        return false;
    };
    let command = tree.node(last);
    match command.logic {
        BranchLogic::None => command.ends_flow(),
        BranchLogic::Else => {
            let mut branches = vec![last];
            for previous in earlier.iter().rev().copied() {
                match tree.node(previous).logic {
                    BranchLogic::ElseIf => branches.push(previous),
                    BranchLogic::If => {
                        branches.push(previous);
                        return branches.iter().all(|branch| {
                            block_terminates(tree, &statements_of(tree, *branch))
                        });
                    }
                    _ => return false,
                }
            }
            false
        }
        _ => false,
    }
}

fn statements_of(tree: &CommandTree, node: NodeId) -> Vec<NodeId> {
    statements(tree, tree.children(node))
}
