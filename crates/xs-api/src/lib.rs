use serde::{Deserialize, Serialize};
use tracing::info;

pub use xs_compiler::{
    CommandNode, CommandTree, CompileOptions, NodeId, PrinterOptions, Symbol, SymbolType,
    TreeError, TreeState,
};
pub use xs_core::{
    Argument, CommandId, CommandList, CompilerError, ErrorArray, GameVersion, ScriptFile,
    SyntaxLibrary,
};

/// Outcome of verifying and, when clean, compiling one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub script: String,
    pub game: GameVersion,
    pub state: TreeState,
    pub errors: Vec<CompilerError>,
    pub commands: CommandList,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.state == TreeState::Compiled && self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        serde_json::to_string_pretty(self).map_err(|error| {
            CompilerError::new(
                "REPORT_SERIALIZE_FAILED",
                format!("Failed to serialize build report: {}", error),
            )
        })
    }
}

pub fn verify_script(
    tree: &mut CommandTree,
    script: &mut ScriptFile,
    options: &CompileOptions,
) -> Result<ErrorArray, TreeError> {
    let mut errors = ErrorArray::new();
    tree.verify(script, &mut errors, options)?;
    Ok(errors)
}

/// Verifies `tree`, then compiles it only if verification found nothing.
pub fn build_script(
    tree: &mut CommandTree,
    script: &mut ScriptFile,
    options: &CompileOptions,
) -> Result<BuildReport, TreeError> {
    let mut errors = verify_script(tree, script, options)?;
    if errors.is_empty() {
        tree.compile(script, &mut errors, options)?;
    }

    let report = BuildReport {
        script: script.name.clone(),
        game: script.game,
        state: tree.state(),
        errors: errors.into_vec(),
        commands: script.commands.clone(),
    };
    info!(
        script = %report.script,
        state = %report.state,
        errors = report.errors.len(),
        "build finished"
    );
    Ok(report)
}

pub fn build_script_with_json_options(
    tree: &mut CommandTree,
    script: &mut ScriptFile,
    options_json: &str,
) -> Result<BuildReport, CompilerError> {
    let options = CompileOptions::from_json(options_json)?;
    Ok(build_script(tree, script, &options)?)
}

/// Renders the tree listing as text.
pub fn render_tree(tree: &CommandTree, options: PrinterOptions) -> Result<String, CompilerError> {
    let mut out = Vec::new();
    tree.print(&mut out, options)?;
    String::from_utf8(out).map_err(|error| {
        CompilerError::new(
            "PRINT_FAILED",
            format!("Tree listing is not valid UTF-8: {}", error),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xs_core::Conditional;

    fn node(id: CommandId, arguments: Vec<Argument>, line: usize) -> CommandNode {
        let syntax = SyntaxLibrary::shared().get(id).expect("builtin syntax");
        CommandNode::parse(syntax, arguments, line).expect("command should parse")
    }

    fn waiting_loop() -> CommandTree {
        let mut tree = CommandTree::new();
        let head = tree.push(node(
            CommandId::CONDITIONAL,
            vec![Argument::Condition(Conditional::While), Argument::var("busy")],
            1,
        ));
        tree.push_child(
            head,
            node(CommandId::WAIT, vec![Argument::Null, Argument::int(500)], 2),
        );
        tree.push_child(head, node(CommandId::END, Vec::new(), 3));
        tree.push(node(CommandId::RETURN, vec![Argument::Null], 4));
        tree
    }

    #[test]
    fn build_script_compiles_clean_script() {
        let mut tree = waiting_loop();
        let mut script = ScriptFile::new("wait.loop", GameVersion::TerranConflict);

        let report = build_script(&mut tree, &mut script, &CompileOptions::default())
            .expect("build should run");

        assert!(report.is_success());
        assert_eq!(report.state, TreeState::Compiled);
        assert_eq!(report.commands.standard.len(), 4);
        assert_eq!(report.commands.auxiliary.len(), 1);
    }

    #[test]
    fn build_script_stops_after_failed_verification() {
        let mut tree = CommandTree::new();
        tree.push(node(CommandId::BREAK, Vec::new(), 1));
        tree.push(node(CommandId::RETURN, vec![Argument::Null], 2));
        let mut script = ScriptFile::new("broken", GameVersion::TerranConflict);

        let report = build_script(&mut tree, &mut script, &CompileOptions::default())
            .expect("build should run");

        assert!(!report.is_success());
        assert_eq!(report.state, TreeState::Verified);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, "BRANCH_OUTSIDE_LOOP");
        assert!(report.commands.is_empty());
    }

    #[test]
    fn build_script_rejects_compiled_tree() {
        let mut tree = waiting_loop();
        let mut script = ScriptFile::new("wait.loop", GameVersion::TerranConflict);
        build_script(&mut tree, &mut script, &CompileOptions::default())
            .expect("first build should run");

        let error = build_script_with_json_options(&mut tree, &mut script, "{}")
            .expect_err("compiled tree cannot be rebuilt");
        assert_eq!(error.code, "TREE_INVALID_STATE");
    }

    #[test]
    fn json_options_are_validated() {
        let mut tree = waiting_loop();
        let mut script = ScriptFile::new("wait.loop", GameVersion::TerranConflict);

        let error = build_script_with_json_options(&mut tree, &mut script, "strict")
            .expect_err("options must be json");
        assert_eq!(error.code, "OPTIONS_INVALID");
        assert_eq!(tree.state(), TreeState::Raw);
    }

    #[test]
    fn report_serializes_as_camel_case_json() {
        let mut tree = waiting_loop();
        let mut script = ScriptFile::new("wait.loop", GameVersion::TerranConflict);
        let report = build_script(&mut tree, &mut script, &CompileOptions::default())
            .expect("build should run");

        let json = report.to_json().expect("report should serialize");
        assert!(json.contains("\"script\": \"wait.loop\""));
        assert!(json.contains("\"state\": \"compiled\""));
        assert!(json.contains("\"game\": \"terran_conflict\""));
    }

    #[test]
    fn render_tree_lists_every_node() {
        let tree = waiting_loop();
        let listing = render_tree(&tree, PrinterOptions::default()).expect("render should work");

        assert_eq!(listing.lines().count(), 5);
        assert!(listing.contains("WHILE  while $busy"));
    }
}
