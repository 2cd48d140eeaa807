//! Command-tree compiler: macro expansion, symbol identification, linking,
//! indexing, verification and code generation for X-Universe scripts.

pub mod error;
pub mod expression;
pub mod finalize;
pub mod generate;
pub mod identify;
pub mod indexer;
pub mod linker;
pub mod macro_expand;
pub mod node;
pub mod options;
pub mod pipeline;
pub mod printer;
pub mod symbols;
pub mod traversal;
pub mod tree;
pub mod verify;
pub mod visitor;

pub use error::TreeError;
pub use expression::to_postfix;
pub use finalize::LinkageFinalizer;
pub use generate::{CommandGenerator, GeneratorMode};
pub use identify::{ConstantIdentifier, VariableIdentifier};
pub use indexer::NodeIndexer;
pub use linker::NodeLinker;
pub use macro_expand::MacroExpander;
pub use node::{BranchLogic, CommandNode, NodeId};
pub use options::{CompileOptions, PrinterOptions};
pub use printer::NodePrinter;
pub use symbols::{Symbol, SymbolSearcher, SymbolType};
pub use traversal::{BreadthTraversal, DepthTraversal, Traversal, TreeCursor};
pub use tree::{CommandTree, TreeState};
pub use verify::{has_executable_commands, LabelVerifier, LogicVerifier, TerminationVerifier};
pub use visitor::{TreeReader, TreeVisitor};

#[cfg(test)]
pub(crate) mod compiler_test_support {
    use std::sync::Arc;

    use xs_core::{
        Argument, CommandId, CommandSyntax, Conditional, GameVersion, ScriptFile, SyntaxLibrary,
    };

    use crate::node::CommandNode;

    pub(crate) fn syntax(id: CommandId) -> Arc<CommandSyntax> {
        SyntaxLibrary::shared().get(id).expect("builtin syntax")
    }

    pub(crate) fn command(id: CommandId, arguments: Vec<Argument>, line: usize) -> CommandNode {
        CommandNode::parse(syntax(id), arguments, line).expect("test command should parse")
    }

    pub(crate) fn script() -> ScriptFile {
        ScriptFile::new("test.script", GameVersion::TerranConflict)
    }

    pub(crate) fn assign(line: usize, target: &str, tokens: Vec<Argument>) -> CommandNode {
        let mut arguments = vec![Argument::var(target)];
        arguments.extend(tokens);
        command(CommandId::EXPRESSION, arguments, line)
    }

    pub(crate) fn branch(line: usize, conditional: Conditional, tokens: Vec<Argument>) -> CommandNode {
        let mut arguments = vec![Argument::Condition(conditional)];
        arguments.extend(tokens);
        command(CommandId::CONDITIONAL, arguments, line)
    }

    pub(crate) fn keyword(id: CommandId, line: usize) -> CommandNode {
        command(id, Vec::new(), line)
    }

    pub(crate) fn wait(line: usize, milliseconds: i32) -> CommandNode {
        command(
            CommandId::WAIT,
            vec![Argument::Null, Argument::int(milliseconds)],
            line,
        )
    }

    pub(crate) fn ret(line: usize) -> CommandNode {
        command(CommandId::RETURN, vec![Argument::Null], line)
    }

    pub(crate) fn label(line: usize, name: &str) -> CommandNode {
        command(CommandId::DEFINE_LABEL, vec![Argument::label(name)], line)
    }

    pub(crate) fn goto(line: usize, name: &str) -> CommandNode {
        command(CommandId::GOTO_LABEL, vec![Argument::label(name)], line)
    }

    pub(crate) fn comment(line: usize, text: &str) -> CommandNode {
        command(CommandId::COMMENT, vec![Argument::Comment(text.to_string())], line)
    }
}
