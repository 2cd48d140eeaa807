use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CompilerError;
use crate::script::ScriptFile;
use crate::syntax::ParameterSyntax;
use crate::types::{Conditional, DataType, ParameterType, EMPTY_JUMP};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i32),
    String(String),
}

impl ParameterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            Self::String(_) => None,
        }
    }
}

/// A raw, not yet bound, parameter value as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Variable(String),
    Integer(i32),
    String(String),
    Null,
    Constant { name: String, value: i32 },
    Operator(String),
    Label(String),
    Condition(Conditional),
    Comment(String),
    Unknown(String),
}

impl Argument {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn int(value: i32) -> Self {
        Self::Integer(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn op(symbol: impl Into<String>) -> Self {
        Self::Operator(symbol.into())
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self::Label(name.into())
    }

    pub fn into_parameter(self, syntax: ParameterSyntax) -> ScriptParameter {
        let (data_type, value, text) = match self {
            Self::Variable(name) => {
                let text = format!("${}", name);
                (DataType::Variable, ParameterValue::String(name), text)
            }
            Self::Integer(value) => (DataType::Integer, ParameterValue::Int(value), value.to_string()),
            Self::String(value) => {
                let text = format!("'{}'", value);
                (DataType::String, ParameterValue::String(value), text)
            }
            Self::Null => (DataType::Null, ParameterValue::Int(0), "null".to_string()),
            Self::Constant { name, value } => {
                (DataType::Constant, ParameterValue::Int(value), format!("[{}]", name))
            }
            Self::Operator(symbol) => {
                (DataType::Operator, ParameterValue::String(symbol.clone()), symbol)
            }
            Self::Label(name) | Self::Comment(name) => {
                (DataType::String, ParameterValue::String(name.clone()), name)
            }
            Self::Condition(conditional) => (
                DataType::Integer,
                ParameterValue::Int(conditional.code()),
                conditional.keyword().to_string(),
            ),
            Self::Unknown(text) => (DataType::Unknown, ParameterValue::String(text.clone()), text),
        };
        ScriptParameter {
            syntax,
            data_type,
            value,
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParameter {
    pub syntax: ParameterSyntax,
    pub data_type: DataType,
    pub value: ParameterValue,
    pub text: String,
}

impl ScriptParameter {
    pub fn kind(&self) -> ParameterType {
        self.syntax.kind
    }

    /// Name of the variable this parameter refers to, before generation.
    pub fn variable_name(&self) -> Option<&str> {
        match self.data_type {
            DataType::Variable => self.value.as_str(),
            _ => None,
        }
    }

    pub fn label_name(&self) -> Option<&str> {
        if self.syntax.kind.is_label() {
            return self.value.as_str();
        }
        None
    }

    pub fn conditional(&self) -> Option<Conditional> {
        if self.syntax.kind != ParameterType::Condition {
            return None;
        }
        self.value.as_int().and_then(Conditional::from_code)
    }

    /// Checks the value's data type against what the parameter syntax accepts.
    pub fn validate(&self) -> Result<(), CompilerError> {
        if !self.syntax.kind.accepts(self.data_type) {
            return Err(CompilerError::new(
                "PARAMETER_TYPE_INVALID",
                format!(
                    "Invalid {} parameter '{}': {} values are not accepted.",
                    self.syntax.kind.name(),
                    self.text,
                    self.data_type
                ),
            ));
        }

        if let Some(name) = self.variable_name() {
            if !variable_name_regex().is_match(name) {
                return Err(CompilerError::new(
                    "VARIABLE_NAME_INVALID",
                    format!("'{}' is not a valid variable name.", self.text),
                ));
            }
        }
        Ok(())
    }

    /// Resolves the parameter into its compiled value.
    ///
    /// Label numbers become the integer `jump_index`, variables become their
    /// variable-table ID. Command comments are left untouched.
    pub fn generate(
        &mut self,
        script: &ScriptFile,
        jump_index: u32,
        is_comment: bool,
    ) -> Result<(), CompilerError> {
        if is_comment {
            return Ok(());
        }
        self.validate()?;

        if self.syntax.kind == ParameterType::LabelNumber {
            if jump_index == EMPTY_JUMP {
                return Err(CompilerError::new(
                    "JUMP_UNASSIGNED",
                    format!("Jump address for '{}' has not been assigned.", self.text),
                ));
            }
            self.data_type = DataType::Integer;
            self.value = ParameterValue::Int(jump_index as i32);
            return Ok(());
        }

        if let Some(name) = self.variable_name() {
            let id = script.variables.id_of(name).ok_or_else(|| {
                CompilerError::new(
                    "VARIABLE_UNDEFINED",
                    format!("Variable '${}' has not been identified.", name),
                )
            })?;
            self.value = ParameterValue::Int(id as i32);
        }
        Ok(())
    }
}

fn variable_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("variable name regex must compile")
    })
}
