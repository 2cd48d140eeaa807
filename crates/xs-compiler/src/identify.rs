use tracing::{trace, warn};
use xs_core::{CompilerError, DataType, ErrorArray, ParameterType, ScriptFile};

use crate::node::{CommandNode, NodeId};
use crate::options::CompileOptions;
use crate::tree::CommandTree;
use crate::visitor::TreeVisitor;

/// Fills the variable table and label table, and loads called script interfaces.
pub struct VariableIdentifier<'a> {
    script: &'a mut ScriptFile,
    options: CompileOptions,
}

impl<'a> VariableIdentifier<'a> {
    pub fn new(script: &'a mut ScriptFile, options: CompileOptions) -> Self {
        Self { script, options }
    }

    fn resolve_script_call(&mut self, command: &CommandNode) -> Result<(), CompilerError> {
        let Some(name) = script_call_target(command) else {
            return Ok(());
        };
        match self.script.resolve_script_call(name) {
            Ok(()) => Ok(()),
            Err(error) if self.options.strict_script_calls => Err(error),
            Err(error) => {
                warn!(script = name, line = command.line_number, %error, "script call could not be resolved");
                Ok(())
            }
        }
    }
}

impl TreeVisitor for VariableIdentifier<'_> {
    const NAME: &'static str = "variable-identifier";

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node(node);

        if !command.cmd_comment {
            for parameter in command.parameters_in(self.options.exact_parameter_order) {
                if let Some(name) = parameter.variable_name() {
                    self.script.variables.add(name);
                }
            }

            if let Some(label) = command.defines_label() {
                if let Err(existing) = self.script.labels.add(label, command.line_number) {
                    return Err(command.error(
                        "LABEL_DUPLICATE",
                        format!(
                            "Label '{}' on line {} is already defined on line {}.",
                            label, command.line_number, existing.line_number
                        ),
                    ));
                }
                trace!(label, line = command.line_number, "label registered");
            }
        }

        if command.syntax.is_script_call() {
            self.resolve_script_call(command)?;
        }
        Ok(())
    }
}

/// Counts writes to return-variable parameters.
pub struct ConstantIdentifier<'a> {
    script: &'a mut ScriptFile,
}

impl<'a> ConstantIdentifier<'a> {
    pub fn new(script: &'a mut ScriptFile) -> Self {
        Self { script }
    }
}

impl TreeVisitor for ConstantIdentifier<'_> {
    const NAME: &'static str = "constant-identifier";

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node(node);
        if command.cmd_comment {
            return Ok(());
        }
        for parameter in &command.parameters {
            if !parameter.syntax.is_ret_var() {
                continue;
            }
            if let Some(name) = parameter.variable_name() {
                self.script.variables.add_assignment(name);
            }
        }
        Ok(())
    }
}

/// Literal name of the script a call targets; `None` for calls through a variable.
pub(crate) fn script_call_target(command: &CommandNode) -> Option<&str> {
    command
        .parameters
        .iter()
        .find(|parameter| parameter.kind() == ParameterType::ScriptName)
        .filter(|parameter| parameter.data_type == DataType::String)
        .and_then(|parameter| parameter.value.as_str())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod identify_tests {
    use super::*;
    use crate::compiler_test_support::*;
    use std::sync::Arc;
    use xs_core::{Argument, CommandId, ScriptInterface, StaticScriptResolver};

    #[test]
    fn variables_are_counted_in_display_order() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::WAIT,
            vec![Argument::var("result"), Argument::var("delay")],
            1,
        ));
        tree.push(assign(2, "delay", vec![Argument::int(5)]));
        let mut script = script();
        let mut errors = ErrorArray::new();

        tree.transform(
            &mut VariableIdentifier::new(&mut script, CompileOptions::default()),
            &mut errors,
        );
        tree.transform(&mut ConstantIdentifier::new(&mut script), &mut errors);

        assert!(errors.is_empty());
        assert_eq!(script.variables.id_of("result"), Some(0));
        let delay = script.variables.get("delay").expect("delay identified");
        assert_eq!(delay.id, 1);
        assert_eq!(delay.usage, 2);
        assert_eq!(delay.assignments, 1);
        let result = script.variables.get("result").expect("result identified");
        assert_eq!(result.assignments, 1);
    }

    #[test]
    fn exact_parameter_order_uses_physical_positions() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::WAIT,
            vec![Argument::var("result"), Argument::var("delay")],
            1,
        ));
        let mut script = script();
        let options = CompileOptions {
            exact_parameter_order: true,
            ..CompileOptions::default()
        };

        tree.transform(
            &mut VariableIdentifier::new(&mut script, options),
            &mut ErrorArray::new(),
        );

        assert_eq!(script.variables.id_of("delay"), Some(0));
        assert_eq!(script.variables.id_of("result"), Some(1));
    }

    #[test]
    fn duplicate_labels_report_both_lines() {
        let mut tree = CommandTree::new();
        tree.push(label(2, "start"));
        tree.push(label(9, "start"));
        let mut script = script();
        let mut errors = ErrorArray::new();

        tree.transform(
            &mut VariableIdentifier::new(&mut script, CompileOptions::default()),
            &mut errors,
        );

        assert_eq!(errors.count_code("LABEL_DUPLICATE"), 1);
        let error = errors.first().expect("duplicate error");
        assert_eq!(error.line_number(), Some(9));
        assert!(error.message.contains("line 9"));
        assert!(error.message.contains("line 2"));
    }

    #[test]
    fn commented_commands_contribute_nothing() {
        let mut tree = CommandTree::new();
        tree.push(assign(1, "ghost", vec![Argument::int(1)]).commented());
        tree.push(label(2, "skipped").commented());
        let mut script = script();

        tree.transform(
            &mut VariableIdentifier::new(&mut script, CompileOptions::default()),
            &mut ErrorArray::new(),
        );

        assert!(script.variables.is_empty());
        assert!(script.labels.is_empty());
    }

    fn call(line: usize, target: &str) -> CommandNode {
        command(
            CommandId::CALL_SCRIPT,
            vec![
                Argument::Null,
                Argument::Null,
                Argument::string(target),
                Argument::int(1),
            ],
            line,
        )
    }

    #[test]
    fn unresolved_script_calls_warn_unless_strict() {
        let mut tree = CommandTree::new();
        tree.push(call(1, "lib.known"));
        tree.push(call(2, "lib.missing"));
        let resolver = StaticScriptResolver::new([ScriptInterface {
            name: "lib.known".to_string(),
            game: xs_core::GameVersion::TerranConflict,
            parameters: Vec::new(),
        }]);

        let mut lenient = script().with_resolver(Arc::new(resolver.clone()));
        let mut errors = ErrorArray::new();
        tree.transform(
            &mut VariableIdentifier::new(&mut lenient, CompileOptions::default()),
            &mut errors,
        );
        assert!(errors.is_empty());
        assert!(lenient.script_calls.contains("lib.known"));

        let mut strict = script().with_resolver(Arc::new(resolver));
        let options = CompileOptions {
            strict_script_calls: true,
            ..CompileOptions::default()
        };
        tree.transform(&mut VariableIdentifier::new(&mut strict, options), &mut errors);
        assert_eq!(errors.count_code("SCRIPT_CALL_NOT_FOUND"), 1);
        assert_eq!(errors.first().and_then(CompilerError::line_number), Some(2));
    }
}
