use serde::{Deserialize, Serialize};

use crate::parameter::ScriptParameter;
use crate::syntax::{CommandId, CommandSyntax, CommandType};

/// Immutable compiled form of one command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCommand {
    pub line_text: String,
    pub syntax_id: CommandId,
    pub command_type: CommandType,
    pub parameters: Vec<ScriptParameter>,
    pub postfix: Vec<ScriptParameter>,
    pub is_comment: bool,
    /// Resolved destination of a conditional command.
    pub jump_address: Option<u32>,
    /// For auxiliary commands: address of the standard command that follows.
    pub ref_index: Option<u32>,
}

impl ScriptCommand {
    pub fn new(
        line_text: impl Into<String>,
        syntax: &CommandSyntax,
        parameters: Vec<ScriptParameter>,
        is_comment: bool,
    ) -> Self {
        Self {
            line_text: line_text.into(),
            syntax_id: syntax.id,
            command_type: syntax.command_type,
            parameters,
            postfix: Vec::new(),
            is_comment,
            jump_address: None,
            ref_index: None,
        }
    }

    pub fn expression(
        line_text: impl Into<String>,
        syntax: &CommandSyntax,
        infix: Vec<ScriptParameter>,
        postfix: Vec<ScriptParameter>,
        is_comment: bool,
    ) -> Self {
        Self {
            postfix,
            ..Self::new(line_text, syntax, infix, is_comment)
        }
    }

    pub fn with_jump_address(mut self, address: u32) -> Self {
        self.jump_address = Some(address);
        self
    }

    pub fn with_ref_index(mut self, index: u32) -> Self {
        self.ref_index = Some(index);
        self
    }

    pub fn is_standard(&self) -> bool {
        self.command_type == CommandType::Standard && !self.is_comment
    }
}

/// Output of code generation, split the way the game stores compiled scripts.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandList {
    pub standard: Vec<ScriptCommand>,
    pub auxiliary: Vec<ScriptCommand>,
}

impl CommandList {
    pub fn add_output(&mut self, command: ScriptCommand) {
        if command.is_standard() {
            self.standard.push(command);
        } else {
            self.auxiliary.push(command);
        }
    }

    pub fn clear(&mut self) {
        self.standard.clear();
        self.auxiliary.clear();
    }

    pub fn len(&self) -> usize {
        self.standard.len() + self.auxiliary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.auxiliary.is_empty()
    }
}
