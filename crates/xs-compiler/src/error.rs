use thiserror::Error;
use xs_core::CompilerError;

use crate::tree::TreeState;

/// Faults in tree manipulation or pass sequencing, as opposed to script errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("argument must not be null: {0}")]
    ArgumentNull(&'static str),
    #[error("cannot {operation} a tree in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: TreeState,
    },
    #[error("jump on line {line_number} has no assigned address")]
    UnassignedJump { line_number: usize },
    #[error("label '{name}' does not resolve to a node in the tree")]
    LabelNotFound { name: String },
    #[error("'{keyword}' on line {line_number} is not inside a loop")]
    LoopNotFound {
        keyword: &'static str,
        line_number: usize,
    },
}

impl TreeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidOperation(_) => "TREE_INVALID_OPERATION",
            Self::ArgumentNull(_) => "TREE_ARGUMENT_NULL",
            Self::InvalidState { .. } => "TREE_INVALID_STATE",
            Self::UnassignedJump { .. } => "JUMP_UNASSIGNED",
            Self::LabelNotFound { .. } => "LABEL_NOT_FOUND",
            Self::LoopNotFound { .. } => "LOOP_NOT_FOUND",
        }
    }
}

impl From<TreeError> for CompilerError {
    fn from(error: TreeError) -> Self {
        CompilerError::new(error.code(), error.to_string())
    }
}
