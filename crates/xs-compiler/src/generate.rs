use tracing::trace;
use xs_core::{CommandId, CompilerError, ErrorArray, ScriptCommand, ScriptFile, EMPTY_JUMP};

use crate::error::TreeError;
use crate::identify::script_call_target;
use crate::node::{CommandNode, NodeId};
use crate::tree::CommandTree;
use crate::visitor::TreeReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Dry run: report every parameter problem, emit nothing.
    Verify,
    /// Emit one [`ScriptCommand`] per node into the script's command list.
    Compile,
}

pub struct CommandGenerator<'a> {
    script: &'a mut ScriptFile,
    mode: GeneratorMode,
    end_address: Option<u32>,
    skipped: Vec<NodeId>,
}

impl<'a> CommandGenerator<'a> {
    pub fn new(script: &'a mut ScriptFile, mode: GeneratorMode) -> Self {
        Self {
            script,
            mode,
            end_address: None,
            skipped: Vec::new(),
        }
    }

    pub fn verifier(script: &'a mut ScriptFile) -> Self {
        Self::new(script, GeneratorMode::Verify)
    }

    pub fn compiler(script: &'a mut ScriptFile) -> Self {
        Self::new(script, GeneratorMode::Compile)
    }

    /// Nodes to leave out of the output without reporting them again, such as
    /// macros whose expansion already failed.
    pub fn skipping(mut self, nodes: Vec<NodeId>) -> Self {
        self.skipped = nodes;
        self
    }

    fn verify_node(
        &self,
        command: &CommandNode,
        errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        if command.cmd_comment {
            return Ok(());
        }
        if command.syntax.is(CommandId::UNRECOGNISED) {
            return Err(unrecognised(command));
        }
        for parameter in &command.parameters {
            if let Err(error) = parameter.validate() {
                errors.push(error.or_at(command.location()));
            }
        }
        if command.syntax.is_script_call() {
            self.check_script_call(command)?;
        }
        Ok(())
    }

    fn check_script_call(&self, command: &CommandNode) -> Result<(), CompilerError> {
        let Some(interface) =
            script_call_target(command).and_then(|name| self.script.script_calls.get(name))
        else {
            return Ok(());
        };
        let supplied = command
            .parameters
            .len()
            .saturating_sub(command.syntax.parameter_count());
        if supplied != interface.parameters.len() {
            return Err(command.error(
                "SCRIPT_CALL_ARGUMENT_COUNT",
                format!(
                    "Script '{}' expects {} argument(s), {} supplied.",
                    interface.name,
                    interface.parameters.len(),
                    supplied
                ),
            ));
        }
        Ok(())
    }

    fn compile_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
    ) -> Result<ScriptCommand, CompilerError> {
        let command = tree.node(node);
        if command.is_macro() {
            return Err(command.error(
                "MACRO_UNEXPANDED",
                format!("'{}' must be expanded before compiling.", command.line_text),
            ));
        }
        if !command.cmd_comment && command.syntax.is(CommandId::UNRECOGNISED) {
            return Err(unrecognised(command));
        }

        let jump_index = command
            .jump_target
            .map_or(EMPTY_JUMP, |target| tree.node(target).index);
        let mut parameters = command.parameters.clone();
        for parameter in &mut parameters {
            parameter.generate(self.script, jump_index, command.cmd_comment)?;
        }
        let mut postfix = command.postfix.clone();
        for parameter in &mut postfix {
            parameter.generate(self.script, jump_index, command.cmd_comment)?;
        }

        let output = if command.syntax.is_expression() {
            ScriptCommand::expression(
                command.line_text.clone(),
                &command.syntax,
                parameters,
                postfix,
                command.cmd_comment,
            )
        } else {
            ScriptCommand::new(
                command.line_text.clone(),
                &command.syntax,
                parameters,
                command.cmd_comment,
            )
        };

        if !command.is_standard() {
            let reference = match tree.first_standard_from(node) {
                Some(next) => tree.node(next).index,
                None => self.end_address(tree),
            };
            return Ok(output.with_ref_index(reference));
        }
        if command.logic.is_conditional() {
            if jump_index == EMPTY_JUMP {
                return Err(TreeError::UnassignedJump {
                    line_number: command.line_number,
                }
                .into());
            }
            return Ok(output.with_jump_address(jump_index));
        }
        Ok(output)
    }

    fn end_address(&mut self, tree: &CommandTree) -> u32 {
        *self.end_address.get_or_insert_with(|| tree.end_address())
    }
}

impl TreeReader for CommandGenerator<'_> {
    const NAME: &'static str = "command-generator";

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        match self.mode {
            GeneratorMode::Verify => self.verify_node(tree.node(node), errors),
            GeneratorMode::Compile => {
                if self.skipped.contains(&node) {
                    trace!(line = tree.node(node).line_number, "node skipped");
                    return Ok(());
                }
                let command = self
                    .compile_node(tree, node)
                    .map_err(|error| error.wrapped("COMPILE_FAILED", "Compile failed: "))?;
                self.script.commands.add_output(command);
                Ok(())
            }
        }
    }
}

fn unrecognised(command: &CommandNode) -> CompilerError {
    command.error(
        "COMMAND_UNRECOGNISED",
        format!("'{}' is not a recognised command.", command.line_text),
    )
}

#[cfg(test)]
mod generate_tests {
    use super::*;
    use crate::compiler_test_support::*;
    use crate::finalize::LinkageFinalizer;
    use crate::identify::VariableIdentifier;
    use crate::indexer::NodeIndexer;
    use crate::options::CompileOptions;
    use std::sync::Arc;
    use xs_core::{
        Argument, Conditional, InterfaceParameter, ParameterType, ParameterValue, ScriptInterface,
        StaticScriptResolver,
    };

    #[test]
    fn verify_reports_each_bad_parameter() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::ARRAY_SET,
            vec![Argument::int(1), Argument::string("x"), Argument::int(2)],
            1,
        ));
        tree.push(command(CommandId::UNRECOGNISED, vec![Argument::Unknown("fly".into())], 2));
        let mut script = script();
        let mut errors = ErrorArray::new();

        tree.visit(&mut CommandGenerator::verifier(&mut script), &mut errors);

        assert_eq!(errors.count_code("PARAMETER_TYPE_INVALID"), 2);
        assert_eq!(errors.count_code("COMMAND_UNRECOGNISED"), 1);
        assert!(script.commands.is_empty());
    }

    #[test]
    fn verify_checks_script_call_argument_count() {
        let resolver = StaticScriptResolver::new([ScriptInterface {
            name: "lib.dock".to_string(),
            game: xs_core::GameVersion::TerranConflict,
            parameters: vec![InterfaceParameter {
                name: "station".to_string(),
                kind: ParameterType::Value,
            }],
        }]);
        let mut script = script().with_resolver(Arc::new(resolver));
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::CALL_SCRIPT,
            vec![
                Argument::Null,
                Argument::Null,
                Argument::string("lib.dock"),
                Argument::var("home"),
                Argument::int(3),
            ],
            4,
        ));
        let mut errors = ErrorArray::new();

        tree.transform(
            &mut VariableIdentifier::new(&mut script, CompileOptions::default()),
            &mut errors,
        );
        tree.visit(&mut CommandGenerator::verifier(&mut script), &mut errors);

        assert_eq!(errors.count_code("SCRIPT_CALL_ARGUMENT_COUNT"), 1);
        assert_eq!(errors.first().and_then(CompilerError::line_number), Some(4));
    }

    #[test]
    fn compile_emits_addresses_and_references() {
        let mut tree = CommandTree::new();
        tree.push(comment(1, "setup"));
        let head = tree.push(branch(2, Conditional::If, vec![Argument::var("x")]));
        tree.push_child(head, assign(3, "x", vec![Argument::int(0)]));
        tree.push_child(head, keyword(CommandId::END, 4));
        let after = tree.push(ret(5));
        tree.node_mut(head).jump_target = Some(after);
        let mut script = script();
        let mut errors = ErrorArray::new();

        tree.transform(
            &mut VariableIdentifier::new(&mut script, CompileOptions::default()),
            &mut errors,
        );
        tree.transform(&mut NodeIndexer::new(), &mut errors);
        tree.transform(&mut LinkageFinalizer, &mut errors);
        tree.visit(&mut CommandGenerator::compiler(&mut script), &mut errors);

        assert!(errors.is_empty());
        let standard = &script.commands.standard;
        assert_eq!(standard.len(), 3);
        assert_eq!(standard[0].jump_address, Some(2));
        assert_eq!(standard[1].parameters[0].value, ParameterValue::Int(0));
        assert_eq!(standard[1].postfix.len(), 1);

        let auxiliary = &script.commands.auxiliary;
        assert_eq!(auxiliary.len(), 2);
        assert_eq!(auxiliary[0].ref_index, Some(0));
        assert_eq!(auxiliary[1].line_text, "end");
        assert_eq!(auxiliary[1].ref_index, Some(2));
    }

    #[test]
    fn compile_rejects_unexpanded_macros_but_emits_the_rest() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::DIM_ARRAY,
            vec![Argument::var("list"), Argument::int(1)],
            1,
        ));
        tree.push(ret(2));
        let mut script = script();
        let mut errors = ErrorArray::new();

        tree.transform(&mut NodeIndexer::new(), &mut errors);
        tree.visit(&mut CommandGenerator::compiler(&mut script), &mut errors);

        assert_eq!(errors.count_code("COMPILE_FAILED"), 1);
        let error = errors.first().expect("compile error");
        assert!(error.message.starts_with("Compile failed: "));
        assert_eq!(script.commands.standard.len(), 1);
    }
}
