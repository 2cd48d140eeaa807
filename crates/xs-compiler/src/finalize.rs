use xs_core::{CompilerError, DataType, ErrorArray, ParameterValue, EMPTY_JUMP};

use crate::node::NodeId;
use crate::tree::CommandTree;
use crate::visitor::TreeVisitor;

/// Settles every jump on an indexed standard command.
///
/// Auxiliary targets (labels, `else`, `end`, `break`) are replaced by the first
/// standard command at or after them; for `break` and `continue` that is their
/// own hidden jump. Hidden jumps also get their address written into the
/// label-number parameter.
#[derive(Debug, Default)]
pub struct LinkageFinalizer;

impl TreeVisitor for LinkageFinalizer {
    const NAME: &'static str = "linkage-finalizer";

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let Some(target) = tree.node(node).jump_target else {
            return Ok(());
        };
        let unresolved = |tree: &CommandTree| {
            let target = tree.node(target);
            CompilerError::new(
                "LINK_UNRESOLVED",
                format!(
                    "Jump target on line {} ('{}') has no command to land on.",
                    target.line_number, target.line_text
                ),
            )
        };

        let resolved = tree
            .first_standard_from(target)
            .ok_or_else(|| unresolved(tree))?;
        let address = tree.node(resolved).index;
        if address == EMPTY_JUMP {
            return Err(unresolved(tree));
        }

        let command = tree.node_mut(node);
        command.jump_target = Some(resolved);
        if command.hidden {
            if let Some(parameter) = command.parameters.first_mut() {
                parameter.data_type = DataType::Integer;
                parameter.value = ParameterValue::Int(address as i32);
                parameter.text = address.to_string();
            }
            command.line_text = command.syntax.render(&command.parameters);
        }
        Ok(())
    }
}

#[cfg(test)]
mod finalize_tests {
    use super::*;
    use crate::compiler_test_support::*;
    use crate::indexer::NodeIndexer;

    #[test]
    fn auxiliary_targets_move_to_next_standard_command() {
        let mut tree = CommandTree::new();
        let jump = tree.push(goto(1, "done"));
        let target = tree.push(label(2, "done"));
        let landing = tree.push(ret(3));
        tree.node_mut(jump).jump_target = Some(target);
        let mut errors = ErrorArray::new();

        tree.transform(&mut NodeIndexer::new(), &mut errors);
        tree.transform(&mut LinkageFinalizer, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(tree.node(jump).jump_target, Some(landing));
        assert_eq!(tree.node(landing).index, 1);
    }

    #[test]
    fn target_with_nothing_after_it_is_unresolved() {
        let mut tree = CommandTree::new();
        let jump = tree.push(goto(1, "tail"));
        let target = tree.push(label(4, "tail"));
        tree.node_mut(jump).jump_target = Some(target);
        let mut errors = ErrorArray::new();

        tree.transform(&mut NodeIndexer::new(), &mut errors);
        tree.transform(&mut LinkageFinalizer, &mut errors);

        assert_eq!(errors.count_code("LINK_UNRESOLVED"), 1);
        let error = errors.first().expect("unresolved error");
        assert!(error.message.contains("line 4"));
        assert_eq!(error.line_number(), Some(1));
    }
}
