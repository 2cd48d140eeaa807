use tracing::{debug, trace};
use xs_core::{
    Argument, CommandId, CompilerError, Conditional, DataType, ErrorArray, ParameterSyntax,
    ParameterType, ScriptFile, ScriptParameter, SyntaxLibrary,
};

use crate::node::{CommandNode, NodeId};
use crate::tree::CommandTree;
use crate::visitor::TreeVisitor;

const ITERATOR_PREFIX: &str = "XS.Iterator";

/// One synthesized command and what goes beneath it.
struct Replacement {
    node: CommandNode,
    children: Vec<CommandNode>,
    adopts_body: bool,
}

impl Replacement {
    fn single(node: CommandNode) -> Self {
        Self {
            node,
            children: Vec::new(),
            adopts_body: false,
        }
    }

    /// Loop head: `children` run first, then the macro's original body.
    fn block(node: CommandNode, children: Vec<CommandNode>) -> Self {
        Self {
            node,
            children,
            adopts_body: true,
        }
    }
}

struct Expansion {
    source: NodeId,
    replacements: Vec<Replacement>,
}

/// Rewrites `dim`, `for` and `for each` into standard commands.
///
/// Runs in two phases: the visit collects expansions without touching the tree,
/// then [`MacroExpander::apply`] splices them in.
pub struct MacroExpander<'a> {
    script: &'a mut ScriptFile,
    library: &'a SyntaxLibrary,
    iterator_counter: usize,
    expansions: Vec<Expansion>,
    failed: Vec<NodeId>,
}

impl<'a> MacroExpander<'a> {
    pub fn new(script: &'a mut ScriptFile, library: &'a SyntaxLibrary) -> Self {
        Self {
            script,
            library,
            iterator_counter: 0,
            expansions: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Macros whose expansion reported an error; they stay in the tree unexpanded.
    pub fn failed(&self) -> &[NodeId] {
        &self.failed
    }

    /// Replaces each planned macro with its expansion; returns how many were expanded.
    pub fn apply(self, tree: &mut CommandTree) -> usize {
        let count = self.expansions.len();
        for expansion in self.expansions {
            let source = expansion.source;
            let (Some(parent), Some(mut position)) =
                (tree.parent(source), tree.position_in_parent(source))
            else {
                continue;
            };
            let body = tree.children(source).to_vec();
            tree.remove(source);

            for replacement in expansion.replacements {
                let id = tree.insert_child(parent, position, replacement.node);
                position += 1;
                for child in replacement.children {
                    tree.push_child(id, child);
                }
                if replacement.adopts_body {
                    for member in &body {
                        tree.reparent(*member, id);
                    }
                }
            }
            trace!(line = tree.node(source).line_number, "macro expanded");
        }
        debug!(expanded = count, "macro expansion applied");
        count
    }

    fn plan(&mut self, command: &CommandNode) -> Result<Vec<Replacement>, CompilerError> {
        match command.id() {
            CommandId::DIM_ARRAY => self.expand_dim(command),
            CommandId::FOR_LOOP => self.expand_for(command),
            CommandId::FOR_EACH | CommandId::FOR_EACH_COUNTER => self.expand_for_each(command),
            _ => Err(CompilerError::new(
                "MACRO_UNKNOWN",
                format!("'{}' has no expansion.", command.syntax.text),
            )),
        }
    }

    /// `$a = dim x, y` becomes an allocation followed by one element store per value.
    fn expand_dim(&mut self, command: &CommandNode) -> Result<Vec<Replacement>, CompilerError> {
        let line = command.line_number;
        let (target, values) = command
            .parameters
            .split_first()
            .ok_or_else(|| invalid_operand("An array target is required."))?;
        let array = variable_of(target, "array")?;
        if values.is_empty() {
            return Err(invalid_operand("An array needs at least one element."));
        }
        let size = i32::try_from(values.len())
            .map_err(|_| invalid_operand("Too many array elements."))?;

        let mut replacements = vec![Replacement::single(self.build(
            CommandId::ARRAY_ALLOC,
            vec![operand(Argument::var(array)), operand(Argument::int(size))],
            line,
        )?)];
        for (element, value) in (0..size).zip(values) {
            replacements.push(Replacement::single(self.build(
                CommandId::ARRAY_SET,
                vec![
                    operand(Argument::var(array)),
                    operand(Argument::int(element)),
                    value.clone(),
                ],
                line,
            )?));
        }
        Ok(replacements)
    }

    /// `for $i = a to b step s` becomes `$i = a - s`, `while $i < b` headed by the step.
    fn expand_for(&mut self, command: &CommandNode) -> Result<Vec<Replacement>, CompilerError> {
        let line = command.line_number;
        let [iterator, start, limit, step] = command.parameters.as_slice() else {
            return Err(invalid_operand("A loop needs an iterator, start, limit and step."));
        };
        let name = variable_of(iterator, "loop iterator")?;
        let step_value = match (step.data_type, step.value.as_int()) {
            (DataType::Integer, Some(value)) if value != 0 => value,
            _ => {
                return Err(CompilerError::new(
                    "MACRO_STEP_INVALID",
                    format!("Loop step '{}' must be a non-zero integer.", step.text),
                ))
            }
        };
        let ascending = step_value > 0;
        let magnitude = i32::try_from(step_value.unsigned_abs())
            .map_err(|_| invalid_operand("Loop step is out of range."))?;
        let (rewind, compare) = if ascending { ("-", "<") } else { ("+", ">") };

        let init = self.build(
            CommandId::EXPRESSION,
            vec![
                operand(Argument::var(name)),
                start.clone(),
                operand(Argument::op(rewind)),
                operand(Argument::int(magnitude)),
            ],
            line,
        )?;
        let guard = self.build(
            CommandId::CONDITIONAL,
            vec![
                operand(Argument::Condition(Conditional::While)),
                operand(Argument::var(name)),
                operand(Argument::op(compare)),
                limit.clone(),
            ],
            line,
        )?;
        let advance = self.counter_step(name, ascending, magnitude, line)?;
        Ok(vec![
            Replacement::single(init),
            Replacement::block(guard, vec![advance]),
        ])
    }

    /// `for each $x in array $a` counts an iterator down from the array size.
    fn expand_for_each(
        &mut self,
        command: &CommandNode,
    ) -> Result<Vec<Replacement>, CompilerError> {
        let line = command.line_number;
        let (Some(item), Some(array)) = (command.parameters.first(), command.parameters.get(1))
        else {
            return Err(invalid_operand("A loop needs an item and an array."));
        };
        variable_of(item, "loop item")?;
        variable_of(array, "array")?;
        let counter = match command.parameters.get(2) {
            Some(counter) => variable_of(counter, "loop counter")?.to_string(),
            None => self.next_iterator_name(),
        };

        let size = self.build(
            CommandId::ARRAY_SIZE,
            vec![operand(Argument::var(&counter)), array.clone()],
            line,
        )?;
        let guard = self.build(
            CommandId::CONDITIONAL,
            vec![
                operand(Argument::Condition(Conditional::While)),
                operand(Argument::var(&counter)),
            ],
            line,
        )?;
        let step = self.counter_step(&counter, false, 1, line)?;
        let fetch = self.build(
            CommandId::ARRAY_GET,
            vec![item.clone(), array.clone(), operand(Argument::var(&counter))],
            line,
        )?;
        Ok(vec![
            Replacement::single(size),
            Replacement::block(guard, vec![step, fetch]),
        ])
    }

    /// `inc`/`dec` when the game has them and the step is one, otherwise a full expression.
    fn counter_step(
        &self,
        name: &str,
        ascending: bool,
        magnitude: i32,
        line: usize,
    ) -> Result<CommandNode, CompilerError> {
        let keyword = if ascending { CommandId::INC } else { CommandId::DEC };
        if magnitude == 1 && self.library.find(keyword, self.script.game).is_ok() {
            return self.build(keyword, vec![operand(Argument::var(name))], line);
        }
        self.build(
            CommandId::EXPRESSION,
            vec![
                operand(Argument::var(name)),
                operand(Argument::var(name)),
                operand(Argument::op(if ascending { "+" } else { "-" })),
                operand(Argument::int(magnitude)),
            ],
            line,
        )
    }

    fn build(
        &self,
        id: CommandId,
        parameters: Vec<ScriptParameter>,
        line: usize,
    ) -> Result<CommandNode, CompilerError> {
        let syntax = self.library.find(id, self.script.game)?;
        let parameters = syntax.rebind(parameters)?;
        Ok(CommandNode::new(syntax, parameters, line))
    }

    fn next_iterator_name(&mut self) -> String {
        loop {
            self.iterator_counter += 1;
            let candidate = format!("{}{}", ITERATOR_PREFIX, self.iterator_counter);
            if !self.script.variables.contains(&candidate) {
                self.script.variables.register(&candidate);
                return candidate;
            }
        }
    }
}

impl TreeVisitor for MacroExpander<'_> {
    const NAME: &'static str = "macro-expander";

    fn visit_node(
        &mut self,
        tree: &mut CommandTree,
        node: NodeId,
        _errors: &mut ErrorArray,
    ) -> Result<(), CompilerError> {
        let command = tree.node(node);
        if !command.is_macro() {
            return Ok(());
        }
        let replacements = match self.plan(command) {
            Ok(replacements) => replacements,
            Err(error) => {
                self.failed.push(node);
                return Err(error.wrapped("MACRO_EXPANSION_FAILED", "Macro expansion failed: "));
            }
        };
        self.expansions.push(Expansion {
            source: node,
            replacements,
        });
        Ok(())
    }
}

fn operand(argument: Argument) -> ScriptParameter {
    argument.into_parameter(ParameterSyntax::new(ParameterType::Value, 0, 0))
}

fn variable_of<'p>(parameter: &'p ScriptParameter, role: &str) -> Result<&'p str, CompilerError> {
    parameter.variable_name().ok_or_else(|| {
        invalid_operand(format!("The {} '{}' must be a variable.", role, parameter.text))
    })
}

fn invalid_operand(message: impl Into<String>) -> CompilerError {
    CompilerError::new("MACRO_OPERAND_INVALID", message)
}

#[cfg(test)]
mod macro_tests {
    use super::*;
    use crate::compiler_test_support::*;
    use xs_core::GameVersion;

    fn expand(tree: &mut CommandTree, script: &mut ScriptFile) -> ErrorArray {
        let mut errors = ErrorArray::new();
        let mut expander = MacroExpander::new(script, SyntaxLibrary::shared());
        tree.transform(&mut expander, &mut errors);
        expander.apply(tree);
        errors
    }

    fn texts(tree: &CommandTree, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .map(|id| tree.node(*id).line_text.clone())
            .collect()
    }

    #[test]
    fn dim_becomes_allocation_and_element_stores() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::DIM_ARRAY,
            vec![
                Argument::var("list"),
                Argument::int(4),
                Argument::var("x"),
                Argument::string("end"),
            ],
            1,
        ));
        let mut script = script();

        let errors = expand(&mut tree, &mut script);

        assert!(errors.is_empty());
        assert_eq!(
            texts(&tree, tree.children(tree.root())),
            vec![
                "$list = array alloc: size=3",
                "$list[0] = 4",
                "$list[1] = $x",
                "$list[2] = 'end'",
            ]
        );
    }

    #[test]
    fn for_loop_becomes_init_and_guarded_while() {
        let mut tree = CommandTree::new();
        let for_loop = tree.push(command(
            CommandId::FOR_LOOP,
            vec![
                Argument::var("i"),
                Argument::int(1),
                Argument::int(10),
                Argument::int(1),
            ],
            1,
        ));
        let body = tree.push_child(for_loop, wait(2, 100));
        let end = tree.push_child(for_loop, keyword(CommandId::END, 3));
        let mut script = script();

        let errors = expand(&mut tree, &mut script);

        assert!(errors.is_empty());
        let top = tree.children(tree.root()).to_vec();
        assert_eq!(texts(&tree, &top), vec!["$i = 1 - 1", "while $i < 10"]);
        let loop_body = tree.children(top[1]).to_vec();
        assert_eq!(tree.node(loop_body[0]).line_text, "inc $i =");
        assert_eq!(&loop_body[1..], &[body, end]);
        assert_eq!(tree.parent(body), Some(top[1]));
    }

    #[test]
    fn descending_loop_without_inc_uses_expressions() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::FOR_LOOP,
            vec![
                Argument::var("i"),
                Argument::int(10),
                Argument::var("low"),
                Argument::int(-2),
            ],
            1,
        ));
        let mut script = ScriptFile::new("old", GameVersion::Threat);

        let errors = expand(&mut tree, &mut script);

        assert!(errors.is_empty());
        let top = tree.children(tree.root()).to_vec();
        assert_eq!(texts(&tree, &top), vec!["$i = 10 + 2", "while $i > $low"]);
        let step = tree.children(top[1])[0];
        assert_eq!(tree.node(step).line_text, "$i = $i - 2");
    }

    #[test]
    fn zero_step_fails_and_leaves_macro_in_place() {
        let mut tree = CommandTree::new();
        let for_loop = tree.push(command(
            CommandId::FOR_LOOP,
            vec![
                Argument::var("i"),
                Argument::int(0),
                Argument::int(5),
                Argument::int(0),
            ],
            7,
        ));
        let mut script = script();

        let errors = expand(&mut tree, &mut script);

        assert_eq!(errors.len(), 1);
        let error = errors.first().expect("error");
        assert_eq!(error.code, "MACRO_EXPANSION_FAILED");
        assert!(error.message.starts_with("Macro expansion failed: "));
        assert_eq!(error.line_number(), Some(7));
        assert_eq!(tree.children(tree.root()), &[for_loop]);
    }

    #[test]
    fn for_each_generates_unused_iterator_name() {
        let mut tree = CommandTree::new();
        tree.push(command(
            CommandId::FOR_EACH,
            vec![Argument::var("ship"), Argument::var("fleet")],
            1,
        ));
        let mut script = script();
        script.variables.add("XS.Iterator1");

        let errors = expand(&mut tree, &mut script);

        assert!(errors.is_empty());
        assert!(script.variables.contains("XS.Iterator2"));
        let top = tree.children(tree.root()).to_vec();
        assert_eq!(
            texts(&tree, &top),
            vec![
                "$XS.Iterator2 = size of array $fleet",
                "while $XS.Iterator2"
            ]
        );
        let body = tree.children(top[1]).to_vec();
        assert_eq!(
            texts(&tree, &body),
            vec!["dec $XS.Iterator2 =", "$ship = $fleet[$XS.Iterator2]"]
        );
    }

    #[test]
    fn for_each_with_counter_uses_the_given_variable() {
        let mut tree = CommandTree::new();
        let each = tree.push(command(
            CommandId::FOR_EACH_COUNTER,
            vec![Argument::var("ship"), Argument::var("fleet"), Argument::var("n")],
            1,
        ));
        let body = tree.push_child(each, wait(2, 100));
        let mut script = script();

        let errors = expand(&mut tree, &mut script);

        assert!(errors.is_empty());
        let top = tree.children(tree.root()).to_vec();
        assert_eq!(
            texts(&tree, &top),
            vec!["$n = size of array $fleet", "while $n"]
        );
        let loop_body = tree.children(top[1]).to_vec();
        assert_eq!(
            texts(&tree, &loop_body[..2]),
            vec!["dec $n =", "$ship = $fleet[$n]"]
        );
        assert_eq!(loop_body[2], body);
        assert!(script
            .variables
            .iter()
            .all(|variable| !variable.name.starts_with(ITERATOR_PREFIX)));
    }
}
