use std::io::Write;

use colored::{ColoredString, Colorize};
use xs_core::{CommandId, CompilerError, ErrorArray, EMPTY_JUMP};

use crate::node::{BranchLogic, CommandNode, NodeId};
use crate::options::PrinterOptions;
use crate::tree::CommandTree;
use crate::visitor::TreeReader;

/// Writes one line per node: source line, address, indentation by depth, a
/// category tag, the command text and the jump destination.
pub struct NodePrinter<'w> {
    out: &'w mut dyn Write,
    options: PrinterOptions,
    wrote_header: bool,
}

impl<'w> NodePrinter<'w> {
    pub fn new(out: &'w mut dyn Write, options: PrinterOptions) -> Self {
        Self {
            out,
            options,
            wrote_header: false,
        }
    }

    fn paint(&self, text: String, colour: fn(String) -> ColoredString) -> String {
        if self.options.use_colour {
            colour(text).to_string()
        } else {
            text
        }
    }

    fn print(&mut self, tree: &CommandTree, node: NodeId) -> std::io::Result<()> {
        if !self.wrote_header {
            let banner = format!("==== command tree ({}) ====", tree.state());
            writeln!(self.out, "{}", self.paint(banner, |text| text.bold()))?;
            self.wrote_header = true;
        }

        let command = tree.node(node);
        let index = if command.index == EMPTY_JUMP {
            "-".to_string()
        } else {
            command.index.to_string()
        };
        let (tag, colour) = category(command);
        let tag = self.paint(format!("{:<6}", tag), colour);
        let target = match command.jump_target {
            Some(target) => {
                let destination = tree.node(target);
                if destination.index == EMPTY_JUMP {
                    format!(" -> line {}", destination.line_number)
                } else {
                    format!(" -> {}", destination.index)
                }
            }
            None => String::new(),
        };
        writeln!(
            self.out,
            "{:>4} {:>4} {}{} {}{}",
            command.line_number,
            index,
            "  ".repeat(tree.depth(node)),
            tag,
            command.line_text,
            target
        )
    }
}

fn category(command: &CommandNode) -> (&'static str, fn(String) -> ColoredString) {
    if command.logic == BranchLogic::Nop {
        return ("NOP", |text| text.dimmed());
    }
    if command.logic != BranchLogic::None {
        return (branch_tag(command.logic), |text| text.cyan());
    }
    if command.hidden || command.is_goto() {
        return ("JMP", |text| text.yellow());
    }
    if command.defines_label().is_some() {
        return ("LABEL", |text| text.magenta());
    }
    if command.is_return() {
        return ("RETURN", |text| text.red());
    }
    if command.syntax.is(CommandId::UNRECOGNISED) {
        return ("???", |text| text.bright_red());
    }
    if command.is_macro() {
        return ("MACRO", |text| text.blue());
    }
    ("CMD", |text| text.green())
}

fn branch_tag(logic: BranchLogic) -> &'static str {
    match logic {
        BranchLogic::If => "IF",
        BranchLogic::ElseIf => "ELIF",
        BranchLogic::Else => "ELSE",
        BranchLogic::SkipIf => "SKIP",
        BranchLogic::While => "WHILE",
        BranchLogic::Break => "BREAK",
        BranchLogic::Continue => "CONT",
        BranchLogic::None | BranchLogic::Nop => "",
    }
}

impl TreeReader for NodePrinter<'_> {
    const NAME: &'static str = "node-printer";

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        self.print(tree, node).map_err(|error| {
            CompilerError::new("PRINT_FAILED", format!("Failed to print tree: {}", error))
        })
    }
}

impl CommandTree {
    /// Writes the tree listing to `out`, stopping at the first write failure.
    pub fn print(&self, out: &mut dyn Write, options: PrinterOptions) -> Result<(), CompilerError> {
        let mut errors = ErrorArray::new();
        self.visit(&mut NodePrinter::new(out, options), &mut errors);
        match errors.into_vec().into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
