use std::fmt;

use serde::{Deserialize, Serialize};

/// Address sentinel for nodes that have not been assigned an index.
pub const EMPTY_JUMP: u32 = u32::MAX;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GameVersion {
    Threat,
    Reunion,
    #[default]
    TerranConflict,
    AlbionPrelude,
}

impl GameVersion {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Threat => "X2: The Threat",
            Self::Reunion => "X3: Reunion",
            Self::TerranConflict => "X3: Terran Conflict",
            Self::AlbionPrelude => "X3: Albion Prelude",
        }
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Data type of a parameter value as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Null,
    Unknown,
    Variable,
    Constant,
    Integer,
    String,
    Operator,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role a parameter plays in its command syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    RetVar,
    RetVarIf,
    Value,
    Number,
    Variable,
    Array,
    Condition,
    LabelName,
    LabelNumber,
    ScriptName,
    RefObj,
    ScriptArgument,
    ExpressionToken,
    Comment,
}

impl ParameterType {
    pub fn is_ret_var(self) -> bool {
        matches!(self, Self::RetVar | Self::RetVarIf)
    }

    pub fn is_label(self) -> bool {
        matches!(self, Self::LabelName | Self::LabelNumber)
    }

    pub fn accepts(self, data_type: DataType) -> bool {
        use DataType as D;
        match self {
            Self::RetVar | Self::Variable | Self::Array => data_type == D::Variable,
            Self::RetVarIf => matches!(data_type, D::Variable | D::Null),
            Self::Value | Self::ScriptArgument => {
                !matches!(data_type, D::Operator | D::Unknown)
            }
            Self::Number => matches!(data_type, D::Integer | D::Variable | D::Constant),
            Self::Condition => data_type == D::Integer,
            Self::LabelName | Self::Comment => data_type == D::String,
            Self::LabelNumber => matches!(data_type, D::String | D::Integer),
            Self::ScriptName => matches!(data_type, D::String | D::Variable),
            Self::RefObj => matches!(data_type, D::Variable | D::Constant | D::Null),
            Self::ExpressionToken => data_type != D::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RetVar => "return variable",
            Self::RetVarIf => "optional return variable",
            Self::Value => "value",
            Self::Number => "number",
            Self::Variable => "variable",
            Self::Array => "array",
            Self::Condition => "condition",
            Self::LabelName => "label name",
            Self::LabelNumber => "label number",
            Self::ScriptName => "script name",
            Self::RefObj => "reference object",
            Self::ScriptArgument => "script argument",
            Self::ExpressionToken => "expression",
            Self::Comment => "comment",
        }
    }
}

/// Conditional prefix of a conditional command (`if`, `while not`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conditional {
    #[default]
    None,
    While,
    WhileNot,
    If,
    IfNot,
    ElseIf,
    ElseIfNot,
    SkipIf,
    SkipIfNot,
}

impl Conditional {
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::While => 1,
            Self::WhileNot => 2,
            Self::If => 3,
            Self::IfNot => 4,
            Self::ElseIf => 5,
            Self::ElseIfNot => 6,
            Self::SkipIf => 7,
            Self::SkipIfNot => 8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::While,
            2 => Self::WhileNot,
            3 => Self::If,
            4 => Self::IfNot,
            5 => Self::ElseIf,
            6 => Self::ElseIfNot,
            7 => Self::SkipIf,
            8 => Self::SkipIfNot,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::None => "",
            Self::While => "while",
            Self::WhileNot => "while not",
            Self::If => "if",
            Self::IfNot => "if not",
            Self::ElseIf => "else if",
            Self::ElseIfNot => "else if not",
            Self::SkipIf => "skip if",
            Self::SkipIfNot => "skip if not",
        }
    }
}
