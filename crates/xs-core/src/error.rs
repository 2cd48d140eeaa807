use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source position of a diagnostic: the 1-based line and its display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLine {
    pub line_number: usize,
    pub line_text: String,
}

impl SourceLine {
    pub fn new(line_number: usize, line_text: impl Into<String>) -> Self {
        Self {
            line_number,
            line_text: line_text.into(),
        }
    }
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: '{}'", self.line_number, self.line_text)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub location: Option<SourceLine>,
}

impl CompilerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at_line(
        code: impl Into<String>,
        message: impl Into<String>,
        location: SourceLine,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: Some(location),
        }
    }

    /// Attaches a location unless the error already carries a more precise one.
    pub fn or_at(mut self, location: SourceLine) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    /// Re-codes the error and prefixes its message, keeping the location.
    pub fn wrapped(self, code: &str, prefix: &str) -> Self {
        Self {
            code: code.to_string(),
            message: format!("{}{}", prefix, self.message),
            location: self.location,
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        self.location.as_ref().map(|location| location.line_number)
    }
}

/// Append-only accumulator shared by every compiler pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorArray {
    errors: Vec<CompilerError>,
}

impl ErrorArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CompilerError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompilerError> {
        self.errors.iter()
    }

    pub fn first(&self) -> Option<&CompilerError> {
        self.errors.first()
    }

    pub fn count_code(&self, code: &str) -> usize {
        self.errors.iter().filter(|error| error.code == code).count()
    }

    pub fn into_vec(self) -> Vec<CompilerError> {
        self.errors
    }
}

impl Extend<CompilerError> for ErrorArray {
    fn extend<T: IntoIterator<Item = CompilerError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ErrorArray {
    type Item = &'a CompilerError;
    type IntoIter = std::slice::Iter<'a, CompilerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn wrapped_error_keeps_location_and_prefixes_message() {
        let error = CompilerError::at_line(
            "PARAMETER_TYPE_INVALID",
            "bad value",
            SourceLine::new(4, "$x = 'a'"),
        )
        .wrapped("COMPILE_FAILED", "Compile failed: ");

        assert_eq!(error.code, "COMPILE_FAILED");
        assert_eq!(error.message, "Compile failed: bad value");
        assert_eq!(error.line_number(), Some(4));
        assert_eq!(error.to_string(), "COMPILE_FAILED: Compile failed: bad value");
    }

    #[test]
    fn or_at_does_not_replace_existing_location() {
        let located = CompilerError::at_line("A", "a", SourceLine::new(2, "x"))
            .or_at(SourceLine::new(9, "y"));
        assert_eq!(located.line_number(), Some(2));

        let bare = CompilerError::new("B", "b").or_at(SourceLine::new(9, "y"));
        assert_eq!(bare.line_number(), Some(9));
    }

    #[test]
    fn error_array_counts_codes() {
        let mut errors = ErrorArray::new();
        errors.push(CompilerError::new("A", "one"));
        errors.extend([CompilerError::new("B", "two"), CompilerError::new("A", "three")]);

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.count_code("A"), 2);
        assert_eq!(errors.first().map(|error| error.code.as_str()), Some("A"));

        let json = serde_json::to_string(&errors).expect("errors should serialize");
        assert!(json.contains("\"three\""));
    }
}
