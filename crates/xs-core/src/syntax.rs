use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::CompilerError;
use crate::parameter::{Argument, ScriptParameter};
use crate::types::{GameVersion, ParameterType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandId(pub u16);

impl CommandId {
    pub const UNRECOGNISED: Self = Self(0);
    pub const NOP: Self = Self(1);
    pub const COMMENT: Self = Self(2);
    pub const END: Self = Self(3);
    pub const ELSE: Self = Self(4);
    pub const BREAK: Self = Self(5);
    pub const CONTINUE: Self = Self(6);
    pub const DEFINE_LABEL: Self = Self(7);
    pub const GOTO_LABEL: Self = Self(8);
    pub const GOSUB: Self = Self(9);
    pub const END_SUB: Self = Self(10);
    pub const RETURN: Self = Self(11);
    pub const HIDDEN_JUMP: Self = Self(12);
    pub const EXPRESSION: Self = Self(13);
    pub const CONDITIONAL: Self = Self(14);
    pub const INC: Self = Self(15);
    pub const DEC: Self = Self(16);
    pub const ARRAY_ALLOC: Self = Self(17);
    pub const ARRAY_SET: Self = Self(18);
    pub const ARRAY_GET: Self = Self(19);
    pub const ARRAY_SIZE: Self = Self(20);
    pub const CALL_SCRIPT: Self = Self(21);
    pub const WAIT: Self = Self(22);

    pub const DIM_ARRAY: Self = Self(100);
    pub const FOR_LOOP: Self = Self(101);
    pub const FOR_EACH: Self = Self(102);
    pub const FOR_EACH_COUNTER: Self = Self(103);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Emitted into the standard code array and addressed by index.
    Standard,
    /// Stored alongside the code (comments, labels, block keywords) but never executed.
    Auxiliary,
    /// Editor-only shorthand that must be expanded before linking.
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSyntax {
    pub kind: ParameterType,
    pub display_index: usize,
    pub physical_index: usize,
}

impl ParameterSyntax {
    pub fn new(kind: ParameterType, display_index: usize, physical_index: usize) -> Self {
        Self {
            kind,
            display_index,
            physical_index,
        }
    }

    pub fn is_ret_var(&self) -> bool {
        self.kind.is_ret_var()
    }
}

/// Trailing parameter run of unbounded length (expression tokens, script arguments).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariadicSyntax {
    pub kind: ParameterType,
    pub separator: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSyntax {
    pub id: CommandId,
    pub command_type: CommandType,
    pub text: &'static str,
    pub parameters: Vec<ParameterSyntax>,
    pub variadic: Option<VariadicSyntax>,
    pub min_game: GameVersion,
    pub expression: bool,
    pub script_call: bool,
    pub conditional: bool,
}

impl CommandSyntax {
    pub fn is(&self, id: CommandId) -> bool {
        self.id == id
    }

    pub fn is_type(&self, command_type: CommandType) -> bool {
        self.command_type == command_type
    }

    pub fn is_expression(&self) -> bool {
        self.expression
    }

    pub fn is_script_call(&self) -> bool {
        self.script_call
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    pub fn is_available(&self, game: GameVersion) -> bool {
        game >= self.min_game
    }

    /// Number of fixed (non-variadic) parameters.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Syntax of the parameter shown at `position`, falling back to the variadic tail.
    pub fn parameter_at(&self, position: usize) -> Option<ParameterSyntax> {
        if let Some(parameter) = self.parameters.get(position) {
            return Some(*parameter);
        }
        self.variadic
            .map(|variadic| ParameterSyntax::new(variadic.kind, position, position))
    }

    /// Pairs display-ordered arguments with this syntax's parameters.
    pub fn bind(&self, arguments: Vec<Argument>) -> Result<Vec<ScriptParameter>, CompilerError> {
        self.check_count(arguments.len())?;
        arguments
            .into_iter()
            .enumerate()
            .map(|(position, argument)| Ok(argument.into_parameter(self.slot(position)?)))
            .collect()
    }

    /// Moves already-built parameters into this syntax's slots, in display order.
    pub fn rebind(
        &self,
        parameters: Vec<ScriptParameter>,
    ) -> Result<Vec<ScriptParameter>, CompilerError> {
        self.check_count(parameters.len())?;
        parameters
            .into_iter()
            .enumerate()
            .map(|(position, mut parameter)| {
                parameter.syntax = self.slot(position)?;
                Ok(parameter)
            })
            .collect()
    }

    fn check_count(&self, found: usize) -> Result<(), CompilerError> {
        if found < self.parameter_count()
            || (self.variadic.is_none() && found > self.parameter_count())
        {
            return Err(CompilerError::new(
                "PARAMETER_COUNT",
                format!(
                    "Command '{}' expects {}{} parameter(s), found {}.",
                    self.text,
                    self.parameter_count(),
                    if self.variadic.is_some() { " or more" } else { "" },
                    found
                ),
            ));
        }
        Ok(())
    }

    fn slot(&self, position: usize) -> Result<ParameterSyntax, CompilerError> {
        self.parameter_at(position).ok_or_else(|| {
            CompilerError::new(
                "PARAMETER_COUNT",
                format!("No parameter slot {} in '{}'.", position, self.text),
            )
        })
    }

    /// Renders display text by substituting `{n}` and the `{*}` variadic tail.
    pub fn render(&self, parameters: &[ScriptParameter]) -> String {
        let fixed = self.parameter_count();
        let separator = self.variadic.map(|variadic| variadic.separator).unwrap_or(" ");
        placeholder_regex()
            .replace_all(self.text, |captures: &Captures<'_>| {
                let key = &captures[1];
                if key == "*" {
                    return parameters
                        .iter()
                        .skip(fixed)
                        .map(|parameter| parameter.text.as_str())
                        .collect::<Vec<_>>()
                        .join(separator);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| parameters.get(index))
                    .map(|parameter| parameter.text.clone())
                    .unwrap_or_else(|| "?".to_string())
            })
            .trim()
            .to_string()
    }
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{(\d+|\*)\}").expect("placeholder regex must compile"))
}

struct SyntaxBuilder {
    syntax: CommandSyntax,
}

impl SyntaxBuilder {
    fn new(id: CommandId, command_type: CommandType, text: &'static str) -> Self {
        Self {
            syntax: CommandSyntax {
                id,
                command_type,
                text,
                parameters: Vec::new(),
                variadic: None,
                min_game: GameVersion::Threat,
                expression: false,
                script_call: false,
                conditional: false,
            },
        }
    }

    fn param(mut self, kind: ParameterType) -> Self {
        let index = self.syntax.parameters.len();
        self.syntax
            .parameters
            .push(ParameterSyntax::new(kind, index, index));
        self
    }

    /// Physical (encoded) position of each parameter, listed in display order.
    fn physical(mut self, order: &[usize]) -> Self {
        for (parameter, physical) in self.syntax.parameters.iter_mut().zip(order) {
            parameter.physical_index = *physical;
        }
        self
    }

    fn variadic(mut self, kind: ParameterType, separator: &'static str) -> Self {
        self.syntax.variadic = Some(VariadicSyntax { kind, separator });
        self
    }

    fn min_game(mut self, game: GameVersion) -> Self {
        self.syntax.min_game = game;
        self
    }

    fn expression(mut self) -> Self {
        self.syntax.expression = true;
        self
    }

    fn conditional(mut self) -> Self {
        self.syntax.conditional = true;
        self
    }

    fn script_call(mut self) -> Self {
        self.syntax.script_call = true;
        self
    }

    fn build(self) -> CommandSyntax {
        self.syntax
    }
}

/// Lookup table of command syntax descriptors.
#[derive(Debug, Clone, Default)]
pub struct SyntaxLibrary {
    commands: BTreeMap<CommandId, Arc<CommandSyntax>>,
}

impl SyntaxLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide copy of the built-in syntax table.
    pub fn shared() -> &'static SyntaxLibrary {
        static LIBRARY: OnceLock<SyntaxLibrary> = OnceLock::new();
        LIBRARY.get_or_init(SyntaxLibrary::builtin)
    }

    pub fn insert(&mut self, syntax: CommandSyntax) {
        self.commands.insert(syntax.id, Arc::new(syntax));
    }

    pub fn get(&self, id: CommandId) -> Option<Arc<CommandSyntax>> {
        self.commands.get(&id).cloned()
    }

    pub fn find(&self, id: CommandId, game: GameVersion) -> Result<Arc<CommandSyntax>, CompilerError> {
        let syntax = self.get(id).ok_or_else(|| {
            CompilerError::new(
                "SYNTAX_NOT_FOUND",
                format!("No command syntax with ID {}.", id.0),
            )
        })?;
        if !syntax.is_available(game) {
            return Err(CompilerError::new(
                "SYNTAX_UNAVAILABLE",
                format!("Command '{}' is not available in {}.", syntax.text, game),
            ));
        }
        Ok(syntax)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn builtin() -> Self {
        use CommandType::{Auxiliary, Macro, Standard};
        use ParameterType as P;

        let mut library = Self::new();
        let entries = [
            SyntaxBuilder::new(CommandId::UNRECOGNISED, Standard, "{*}")
                .variadic(P::Value, " ")
                .build(),
            SyntaxBuilder::new(CommandId::NOP, Auxiliary, "").build(),
            SyntaxBuilder::new(CommandId::COMMENT, Auxiliary, "* {0}")
                .param(P::Comment)
                .build(),
            SyntaxBuilder::new(CommandId::END, Auxiliary, "end").build(),
            SyntaxBuilder::new(CommandId::ELSE, Auxiliary, "else").build(),
            SyntaxBuilder::new(CommandId::BREAK, Auxiliary, "break").build(),
            SyntaxBuilder::new(CommandId::CONTINUE, Auxiliary, "continue").build(),
            SyntaxBuilder::new(CommandId::DEFINE_LABEL, Auxiliary, "{0}:")
                .param(P::LabelName)
                .build(),
            SyntaxBuilder::new(CommandId::GOTO_LABEL, Standard, "goto label {0}")
                .param(P::LabelNumber)
                .build(),
            SyntaxBuilder::new(CommandId::GOSUB, Standard, "gosub {0}:")
                .param(P::LabelNumber)
                .build(),
            SyntaxBuilder::new(CommandId::END_SUB, Standard, "endsub").build(),
            SyntaxBuilder::new(CommandId::RETURN, Standard, "return {0}")
                .param(P::Value)
                .build(),
            SyntaxBuilder::new(CommandId::HIDDEN_JUMP, Standard, "jump {0}")
                .param(P::LabelNumber)
                .build(),
            SyntaxBuilder::new(CommandId::EXPRESSION, Standard, "{0} = {*}")
                .param(P::RetVar)
                .variadic(P::ExpressionToken, " ")
                .expression()
                .build(),
            SyntaxBuilder::new(CommandId::CONDITIONAL, Standard, "{0} {*}")
                .param(P::Condition)
                .variadic(P::ExpressionToken, " ")
                .expression()
                .conditional()
                .build(),
            SyntaxBuilder::new(CommandId::INC, Standard, "inc {0} =")
                .param(P::RetVar)
                .min_game(GameVersion::Reunion)
                .build(),
            SyntaxBuilder::new(CommandId::DEC, Standard, "dec {0} =")
                .param(P::RetVar)
                .min_game(GameVersion::Reunion)
                .build(),
            SyntaxBuilder::new(CommandId::ARRAY_ALLOC, Standard, "{0} = array alloc: size={1}")
                .param(P::RetVar)
                .param(P::Number)
                .build(),
            SyntaxBuilder::new(CommandId::ARRAY_SET, Standard, "{0}[{1}] = {2}")
                .param(P::Array)
                .param(P::Number)
                .param(P::Value)
                .build(),
            SyntaxBuilder::new(CommandId::ARRAY_GET, Standard, "{0} = {1}[{2}]")
                .param(P::RetVar)
                .param(P::Array)
                .param(P::Number)
                .build(),
            SyntaxBuilder::new(CommandId::ARRAY_SIZE, Standard, "{0} = size of array {1}")
                .param(P::RetVar)
                .param(P::Array)
                .build(),
            SyntaxBuilder::new(CommandId::CALL_SCRIPT, Standard, "{0} {1} -> call script {2} : {*}")
                .param(P::RetVarIf)
                .param(P::RefObj)
                .param(P::ScriptName)
                .physical(&[1, 2, 0])
                .variadic(P::ScriptArgument, " ")
                .script_call()
                .build(),
            SyntaxBuilder::new(CommandId::WAIT, Standard, "{0} = wait {1} ms")
                .param(P::RetVarIf)
                .param(P::Number)
                .physical(&[1, 0])
                .build(),
            SyntaxBuilder::new(CommandId::DIM_ARRAY, Macro, "{0} = dim {*}")
                .param(P::RetVar)
                .variadic(P::Value, ", ")
                .build(),
            SyntaxBuilder::new(CommandId::FOR_LOOP, Macro, "for {0} = {1} to {2} step {3}")
                .param(P::RetVar)
                .param(P::Number)
                .param(P::Number)
                .param(P::Number)
                .build(),
            SyntaxBuilder::new(CommandId::FOR_EACH, Macro, "for each {0} in array {1}")
                .param(P::RetVar)
                .param(P::Array)
                .build(),
            SyntaxBuilder::new(
                CommandId::FOR_EACH_COUNTER,
                Macro,
                "for each {0} in array {1} using counter {2}",
            )
            .param(P::RetVar)
            .param(P::Array)
            .param(P::RetVar)
            .build(),
        ];

        for syntax in entries {
            library.insert(syntax);
        }
        library
    }
}
