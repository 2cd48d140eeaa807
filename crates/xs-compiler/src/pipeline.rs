use tracing::{debug, info};
use xs_core::{ErrorArray, ScriptFile, SyntaxLibrary};

use crate::error::TreeError;
use crate::finalize::LinkageFinalizer;
use crate::generate::CommandGenerator;
use crate::identify::{ConstantIdentifier, VariableIdentifier};
use crate::indexer::NodeIndexer;
use crate::linker::NodeLinker;
use crate::macro_expand::MacroExpander;
use crate::options::CompileOptions;
use crate::tree::{CommandTree, TreeState};
use crate::verify::{
    has_executable_commands, no_executable_commands, LabelVerifier, LogicVerifier,
    TerminationVerifier,
};

impl CommandTree {
    /// Identifies symbols and checks the script, accumulating script errors in `errors`.
    ///
    /// Variable and label tables are rebuilt from scratch, so a raw or verified tree
    /// can be verified again. The tree ends in the verified state whether or not
    /// errors were found.
    pub fn verify(
        &mut self,
        script: &mut ScriptFile,
        errors: &mut ErrorArray,
        options: &CompileOptions,
    ) -> Result<(), TreeError> {
        if self.state() == TreeState::Compiled {
            return Err(TreeError::InvalidState {
                operation: "verify",
                state: self.state(),
            });
        }
        let before = errors.len();
        script.variables.clear_variables();
        script.labels.clear();

        self.identify(script, errors, options);
        self.visit(&mut LabelVerifier::new(&script.labels), errors);
        self.visit(&mut CommandGenerator::verifier(script), errors);
        self.visit(&mut LogicVerifier, errors);
        if !has_executable_commands(self) {
            errors.push(no_executable_commands(self));
        }
        if errors.is_empty() {
            self.visit(&mut TerminationVerifier::default(), errors);
        }

        self.advance_state(TreeState::Verified);
        info!(
            script = %script.name,
            errors = errors.len() - before,
            "script verified"
        );
        Ok(())
    }

    /// Expands macros, links, indexes and generates code into `script.commands`.
    ///
    /// Each pass runs over every node regardless of earlier failures; the output is
    /// only meaningful when `errors` stays empty.
    pub fn compile(
        &mut self,
        script: &mut ScriptFile,
        errors: &mut ErrorArray,
        options: &CompileOptions,
    ) -> Result<(), TreeError> {
        if self.state() != TreeState::Verified {
            return Err(TreeError::InvalidState {
                operation: "compile",
                state: self.state(),
            });
        }
        let before = errors.len();
        let library = SyntaxLibrary::shared();

        let mut unexpanded = Vec::new();
        if options.use_macro_commands {
            let mut expander = MacroExpander::new(script, library);
            self.transform(&mut expander, errors);
            unexpanded = expander.failed().to_vec();
            let expanded = expander.apply(self);
            if options.reidentify_after_macros && expanded > 0 {
                debug!(expanded, "re-identifying after macro expansion");
                script.variables.clear_variables();
                script.labels.clear();
                self.identify(script, errors, options);
            }
        }

        self.transform(&mut NodeLinker::new(script, library), errors);
        self.transform(&mut NodeIndexer::new(), errors);
        self.transform(&mut LinkageFinalizer, errors);

        script.commands.clear();
        self.visit(
            &mut CommandGenerator::compiler(script).skipping(unexpanded),
            errors,
        );

        self.advance_state(TreeState::Compiled);
        info!(
            script = %script.name,
            standard = script.commands.standard.len(),
            auxiliary = script.commands.auxiliary.len(),
            errors = errors.len() - before,
            "script compiled"
        );
        Ok(())
    }

    fn identify(&mut self, script: &mut ScriptFile, errors: &mut ErrorArray, options: &CompileOptions) {
        self.transform(&mut VariableIdentifier::new(script, *options), errors);
        self.transform(&mut ConstantIdentifier::new(script), errors);
    }
}
