use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use xs_core::{
    Argument, CommandId, CommandSyntax, CommandType, CompilerError, Conditional, ScriptParameter,
    SourceLine, EMPTY_JUMP,
};

use crate::expression::to_postfix;

/// Handle of a node inside its [`CommandTree`](crate::CommandTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn slot(self) -> usize {
        self.0
    }
}

/// Control-flow role of a node, derived from its syntax and conditional prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchLogic {
    None,
    If,
    ElseIf,
    Else,
    SkipIf,
    While,
    Break,
    Continue,
    Nop,
}

impl BranchLogic {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::None => "",
            Self::If => "if",
            Self::ElseIf => "else if",
            Self::Else => "else",
            Self::SkipIf => "skip if",
            Self::While => "while",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Nop => "nop",
        }
    }

    /// Conditionals that branch away when their condition fails.
    pub fn is_conditional(self) -> bool {
        matches!(self, Self::If | Self::ElseIf | Self::SkipIf | Self::While)
    }

    fn derive(syntax: &CommandSyntax, parameters: &[ScriptParameter]) -> Self {
        match syntax.id {
            CommandId::NOP | CommandId::COMMENT => Self::Nop,
            CommandId::ELSE => Self::Else,
            CommandId::BREAK => Self::Break,
            CommandId::CONTINUE => Self::Continue,
            CommandId::FOR_LOOP | CommandId::FOR_EACH | CommandId::FOR_EACH_COUNTER => Self::While,
            _ if syntax.is_conditional() => {
                match parameters.first().and_then(ScriptParameter::conditional) {
                    Some(Conditional::If | Conditional::IfNot) => Self::If,
                    Some(Conditional::ElseIf | Conditional::ElseIfNot) => Self::ElseIf,
                    Some(Conditional::SkipIf | Conditional::SkipIfNot) => Self::SkipIf,
                    Some(Conditional::While | Conditional::WhileNot) => Self::While,
                    Some(Conditional::None) | None => Self::None,
                }
            }
            _ => Self::None,
        }
    }
}

impl fmt::Display for BranchLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One parsed command line and its place in the tree.
#[derive(Debug, Clone)]
pub struct CommandNode {
    pub line_number: usize,
    pub line_text: String,
    pub syntax: Arc<CommandSyntax>,
    pub parameters: Vec<ScriptParameter>,
    pub postfix: Vec<ScriptParameter>,
    pub cmd_comment: bool,
    /// Synthesized by the linker; has no source line of its own.
    pub hidden: bool,
    pub logic: BranchLogic,
    /// Standard-code address, `EMPTY_JUMP` until indexed.
    pub index: u32,
    pub jump_target: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl CommandNode {
    pub fn new(
        syntax: Arc<CommandSyntax>,
        parameters: Vec<ScriptParameter>,
        line_number: usize,
    ) -> Self {
        let postfix = if syntax.is_expression() {
            to_postfix(parameters.get(syntax.parameter_count()..).unwrap_or_default())
        } else {
            Vec::new()
        };
        let line_text = syntax.render(&parameters);
        let logic = BranchLogic::derive(&syntax, &parameters);
        Self {
            line_number,
            line_text,
            syntax,
            parameters,
            postfix,
            cmd_comment: false,
            hidden: false,
            logic,
            index: EMPTY_JUMP,
            jump_target: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Binds display-ordered arguments to `syntax` and builds the node.
    pub fn parse(
        syntax: Arc<CommandSyntax>,
        arguments: Vec<Argument>,
        line_number: usize,
    ) -> Result<Self, CompilerError> {
        let parameters = syntax
            .bind(arguments)
            .map_err(|error| error.or_at(SourceLine::new(line_number, syntax.text)))?;
        Ok(Self::new(syntax, parameters, line_number))
    }

    /// Unconditional jump inserted by the linker.
    pub fn hidden_jump(
        syntax: Arc<CommandSyntax>,
        line_number: usize,
        target: NodeId,
    ) -> Result<Self, CompilerError> {
        let mut node = Self::parse(syntax, vec![Argument::label("?")], line_number)?;
        node.hidden = true;
        node.jump_target = Some(target);
        Ok(node)
    }

    /// Marks the line as a commented-out command: kept in the output, never executed.
    pub fn commented(mut self) -> Self {
        self.cmd_comment = true;
        self.logic = BranchLogic::Nop;
        self.line_text = format!("* {}", self.line_text);
        self
    }

    /// Replaces the rendered text with the text as written in the source.
    pub fn with_text(mut self, line_text: impl Into<String>) -> Self {
        self.line_text = line_text.into();
        self
    }

    pub fn id(&self) -> CommandId {
        self.syntax.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn location(&self) -> SourceLine {
        SourceLine::new(self.line_number, self.line_text.clone())
    }

    pub fn error(&self, code: &str, message: impl Into<String>) -> CompilerError {
        CompilerError::at_line(code, message, self.location())
    }

    /// Emitted into the standard code array and given an address.
    pub fn is_standard(&self) -> bool {
        self.syntax.is_type(CommandType::Standard) && !self.cmd_comment
    }

    pub fn is_macro(&self) -> bool {
        self.syntax.is_type(CommandType::Macro) && !self.cmd_comment
    }

    /// A standard command that is not a branch construct.
    pub fn is_executable(&self) -> bool {
        self.is_standard() && self.logic == BranchLogic::None && !self.hidden
    }

    pub fn is_return(&self) -> bool {
        !self.cmd_comment && self.syntax.is(CommandId::RETURN)
    }

    pub fn is_goto(&self) -> bool {
        !self.cmd_comment
            && (self.syntax.is(CommandId::GOTO_LABEL) || self.syntax.is(CommandId::GOSUB))
    }

    /// Return or goto: control never falls through to the next command.
    pub fn ends_flow(&self) -> bool {
        self.is_return() || (!self.cmd_comment && self.syntax.is(CommandId::GOTO_LABEL))
    }

    pub fn defines_label(&self) -> Option<&str> {
        if self.cmd_comment || !self.syntax.is(CommandId::DEFINE_LABEL) {
            return None;
        }
        self.parameters.first().and_then(ScriptParameter::label_name)
    }

    /// Label named by a goto or gosub, including commented ones.
    pub fn label_reference(&self) -> Option<&str> {
        if !(self.syntax.is(CommandId::GOTO_LABEL) || self.syntax.is(CommandId::GOSUB)) {
            return None;
        }
        self.parameters.first().and_then(ScriptParameter::label_name)
    }

    /// Parameters in display order, or physical order when `exact` is set and
    /// exactly the fixed parameters are present.
    pub fn parameters_in(&self, exact: bool) -> Vec<&ScriptParameter> {
        let mut ordered = self.parameters.iter().collect::<Vec<_>>();
        if exact && self.parameters.len() == self.syntax.parameter_count() {
            ordered.sort_by_key(|parameter| parameter.syntax.physical_index);
        }
        ordered
    }
}
