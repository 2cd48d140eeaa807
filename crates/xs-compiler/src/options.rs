use serde::{Deserialize, Serialize};
use xs_core::CompilerError;

/// Switches controlling the compile and verify sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Expand `dim`, `for` and `for each` before linking.
    pub use_macro_commands: bool,
    /// Clear and rebuild the variable and label tables after macro expansion.
    ///
    /// Changes variable IDs relative to a compile without it.
    pub reidentify_after_macros: bool,
    /// Identify variables in physical (encoded) parameter order instead of display order.
    pub exact_parameter_order: bool,
    /// Report unresolvable script calls as errors instead of warnings.
    pub strict_script_calls: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            use_macro_commands: true,
            reidentify_after_macros: false,
            exact_parameter_order: false,
            strict_script_calls: false,
        }
    }
}

impl CompileOptions {
    pub fn from_json(source: &str) -> Result<Self, CompilerError> {
        serde_json::from_str(source).map_err(|error| {
            CompilerError::new(
                "OPTIONS_INVALID",
                format!("Failed to parse compile options: {}", error),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrinterOptions {
    pub use_colour: bool,
}
