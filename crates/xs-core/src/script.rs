use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::CommandList;
use crate::error::CompilerError;
use crate::types::{GameVersion, ParameterType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Argument,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptVariable {
    pub id: usize,
    pub name: String,
    pub kind: VariableKind,
    pub usage: usize,
    pub assignments: usize,
}

/// Variable table. IDs follow registration order, arguments first.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VariableArray {
    items: Vec<ScriptVariable>,
    by_name: BTreeMap<String, usize>,
}

impl VariableArray {
    pub fn add_argument(&mut self, name: &str) -> usize {
        let id = self.register(name);
        self.items[id].kind = VariableKind::Argument;
        id
    }

    /// Registers `name` if unknown and counts one usage.
    pub fn add(&mut self, name: &str) -> usize {
        let id = self.register(name);
        self.items[id].usage += 1;
        id
    }

    /// Registers `name` if unknown without counting a usage.
    pub fn register(&mut self, name: &str) -> usize {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = self.items.len();
        self.items.push(ScriptVariable {
            id,
            name: name.to_string(),
            kind: VariableKind::Variable,
            usage: 0,
            assignments: 0,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn add_assignment(&mut self, name: &str) -> usize {
        let id = self.register(name);
        self.items[id].assignments += 1;
        id
    }

    pub fn get(&self, name: &str) -> Option<&ScriptVariable> {
        self.by_name.get(name).map(|id| &self.items[*id])
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Drops every non-argument variable and resets argument counters.
    pub fn clear_variables(&mut self) {
        self.items.retain(|variable| variable.kind == VariableKind::Argument);
        self.by_name.clear();
        for (id, variable) in self.items.iter_mut().enumerate() {
            variable.id = id;
            variable.usage = 0;
            variable.assignments = 0;
            self.by_name.insert(variable.name.clone(), id);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScriptVariable> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptLabel {
    pub name: String,
    pub line_number: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabelArray {
    labels: BTreeMap<String, ScriptLabel>,
}

impl LabelArray {
    /// Adds the label unless the name is taken, returning the existing definition on collision.
    pub fn add(&mut self, name: &str, line_number: usize) -> Result<(), ScriptLabel> {
        if let Some(existing) = self.labels.get(name) {
            return Err(existing.clone());
        }
        self.labels.insert(
            name.to_string(),
            ScriptLabel {
                name: name.to_string(),
                line_number,
            },
        );
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&ScriptLabel> {
        self.labels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceParameter {
    pub name: String,
    pub kind: ParameterType,
}

/// Public signature of another script, used to check calls into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInterface {
    pub name: String,
    pub game: GameVersion,
    pub parameters: Vec<InterfaceParameter>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScriptCallCache {
    calls: BTreeMap<String, ScriptInterface>,
}

impl ScriptCallCache {
    pub fn contains(&self, name: &str) -> bool {
        self.calls.contains_key(name)
    }

    pub fn add(&mut self, name: &str, interface: ScriptInterface) {
        self.calls.insert(name.to_string(), interface);
    }

    pub fn get(&self, name: &str) -> Option<&ScriptInterface> {
        self.calls.get(name)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Loads the interface of a script referenced by a script-call command.
pub trait ScriptResolver: Debug + Send + Sync {
    fn load(&self, name: &str, game: GameVersion) -> Result<ScriptInterface, CompilerError>;
}

#[derive(Debug, Default)]
pub struct EmptyScriptResolver;

impl ScriptResolver for EmptyScriptResolver {
    fn load(&self, name: &str, _game: GameVersion) -> Result<ScriptInterface, CompilerError> {
        Err(CompilerError::new(
            "SCRIPT_CALL_NOT_FOUND",
            format!("Script '{}' could not be located.", name),
        ))
    }
}

/// Resolver over an in-memory set of interfaces.
#[derive(Debug, Default, Clone)]
pub struct StaticScriptResolver {
    interfaces: BTreeMap<String, ScriptInterface>,
}

impl StaticScriptResolver {
    pub fn new(interfaces: impl IntoIterator<Item = ScriptInterface>) -> Self {
        Self {
            interfaces: interfaces
                .into_iter()
                .map(|interface| (interface.name.clone(), interface))
                .collect(),
        }
    }
}

impl ScriptResolver for StaticScriptResolver {
    fn load(&self, name: &str, _game: GameVersion) -> Result<ScriptInterface, CompilerError> {
        self.interfaces.get(name).cloned().ok_or_else(|| {
            CompilerError::new(
                "SCRIPT_CALL_NOT_FOUND",
                format!("Script '{}' could not be located.", name),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScriptFile {
    pub name: String,
    pub game: GameVersion,
    pub variables: VariableArray,
    pub labels: LabelArray,
    pub script_calls: ScriptCallCache,
    pub commands: CommandList,
    resolver: Arc<dyn ScriptResolver>,
}

impl ScriptFile {
    pub fn new(name: impl Into<String>, game: GameVersion) -> Self {
        Self {
            name: name.into(),
            game,
            variables: VariableArray::default(),
            labels: LabelArray::default(),
            script_calls: ScriptCallCache::default(),
            commands: CommandList::default(),
            resolver: Arc::new(EmptyScriptResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ScriptResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Loads and caches the interface of `name` unless it is already cached.
    pub fn resolve_script_call(&mut self, name: &str) -> Result<(), CompilerError> {
        if self.script_calls.contains(name) {
            return Ok(());
        }
        let interface = self.resolver.load(name, self.game)?;
        self.script_calls.add(name, interface);
        Ok(())
    }
}

#[cfg(test)]
mod script_tests {
    use super::*;

    #[test]
    fn variables_count_usage_and_assignments_separately() {
        let mut variables = VariableArray::default();
        assert_eq!(variables.add_argument("target"), 0);
        assert_eq!(variables.add("count"), 1);
        assert_eq!(variables.add("count"), 1);
        variables.add_assignment("count");

        let count = variables.get("count").expect("count registered");
        assert_eq!(count.usage, 2);
        assert_eq!(count.assignments, 1);
        assert_eq!(count.kind, VariableKind::Variable);

        variables.clear_variables();
        assert_eq!(variables.len(), 1);
        assert_eq!(variables.id_of("target"), Some(0));
        assert!(!variables.contains("count"));
    }

    #[test]
    fn labels_reject_duplicates_with_first_definition() {
        let mut labels = LabelArray::default();
        labels.add("start", 3).expect("first definition");
        let existing = labels.add("start", 9).expect_err("duplicate should fail");
        assert_eq!(existing.line_number, 3);
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn script_calls_are_loaded_once_through_the_resolver() {
        let resolver = StaticScriptResolver::new([ScriptInterface {
            name: "lib.util".to_string(),
            game: GameVersion::TerranConflict,
            parameters: vec![InterfaceParameter {
                name: "ship".to_string(),
                kind: ParameterType::Value,
            }],
        }]);
        let mut script = ScriptFile::new("main", GameVersion::TerranConflict)
            .with_resolver(Arc::new(resolver));

        script
            .resolve_script_call("lib.util")
            .expect("known script should resolve");
        assert!(script.script_calls.contains("lib.util"));

        let error = script
            .resolve_script_call("lib.missing")
            .expect_err("unknown script should fail");
        assert_eq!(error.code, "SCRIPT_CALL_NOT_FOUND");
        assert_eq!(script.script_calls.len(), 1);
    }
}
