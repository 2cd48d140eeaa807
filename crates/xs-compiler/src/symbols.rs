use serde::{Deserialize, Serialize};
use xs_core::{CommandId, CompilerError, ErrorArray};

use crate::node::NodeId;
use crate::tree::CommandTree;
use crate::visitor::TreeReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Label,
    Variable,
}

/// One occurrence of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub node: NodeId,
    pub name: String,
    pub kind: SymbolType,
    pub line_number: usize,
    pub line_text: String,
    /// Label definition or a write to the variable.
    pub is_definition: bool,
}

/// Collects every node that defines or references a named label or variable.
pub struct SymbolSearcher<'a> {
    name: &'a str,
    kind: SymbolType,
    results: Vec<Symbol>,
}

impl<'a> SymbolSearcher<'a> {
    pub fn new(name: &'a str, kind: SymbolType) -> Self {
        Self {
            name,
            kind,
            results: Vec::new(),
        }
    }

    pub fn into_results(self) -> Vec<Symbol> {
        self.results
    }
}

impl TreeReader for SymbolSearcher<'_> {
    const NAME: &'static str = "symbol-searcher";

    fn visit_node(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node(node);
        let found = match self.kind {
            SymbolType::Label => {
                if command.label_reference() == Some(self.name) {
                    Some(false)
                } else if command.syntax.is(CommandId::DEFINE_LABEL)
                    && command.parameters.first().and_then(|parameter| parameter.label_name())
                        == Some(self.name)
                {
                    Some(true)
                } else {
                    None
                }
            }
            SymbolType::Variable => command
                .parameters
                .iter()
                .filter(|parameter| parameter.variable_name() == Some(self.name))
                .map(|parameter| parameter.syntax.is_ret_var())
                .reduce(|written, next| written || next),
        };

        if let Some(is_definition) = found {
            self.results.push(Symbol {
                node,
                name: self.name.to_string(),
                kind: self.kind,
                line_number: command.line_number,
                line_text: command.line_text.clone(),
                is_definition,
            });
        }
        Ok(())
    }
}

impl CommandTree {
    /// Every node mentioning `name`, in depth-first order. Commented lines are included.
    pub fn find_all(&self, name: &str, kind: SymbolType) -> Vec<Symbol> {
        let mut searcher = SymbolSearcher::new(name, kind);
        self.visit(&mut searcher, &mut ErrorArray::new());
        searcher.into_results()
    }
}
