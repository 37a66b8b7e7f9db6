use crate::config::{DeclaredKind, LexicalConfig, NodeDeclaration, StateKeyDeclaration, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use lexical_editor::{Editor, NodeKey};
use serde_json::json;
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Name of the sample document to create
    #[arg(short, long, default_value = "example.json")]
    pub document: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Lexical project...".bright_blue().bold());

    let config = starter_config();
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    let document_path = cwd.join(&args.document);
    if !document_path.exists() || args.force {
        let mut editor = config.build_editor()?;
        fs::write(&document_path, sample_document(&mut editor)?)?;
        println!("  {} Created {}", "✓".green(), args.document);
    }

    println!();
    println!("{}", "✨ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Declare custom node types in {}", DEFAULT_CONFIG_NAME.bright_white());
    println!("  2. Run {} to view the tree", format!("lexical inspect {}", args.document).bright_cyan());
    println!("  3. Run {} to validate every document", "lexical check .".bright_cyan());

    Ok(())
}

fn starter_config() -> LexicalConfig {
    LexicalConfig {
        nodes: vec![NodeDeclaration {
            node_type: "heading".to_string(),
            kind: DeclaredKind::Element,
            version: 1,
            replaces: None,
            state_keys: vec![StateKeyDeclaration {
                key: "tag".to_string(),
                flat: true,
                default: json!("h1"),
            }],
        }],
        ..LexicalConfig::default()
    }
}

/// A heading followed by a paragraph, exported through the editor
fn sample_document(editor: &mut Editor) -> Result<String> {
    editor.update(|editor| {
        let heading = editor.create_element("heading")?;
        let title = editor.create_text_node("Welcome to Lexical")?;
        editor.append(&heading, &title)?;

        let paragraph = editor.create_paragraph()?;
        let body = editor.create_text_node("Edit this document and run lexical check.")?;
        editor.append(&paragraph, &body)?;

        editor.append_all(&NodeKey::root(), &[heading, paragraph])
    })?;
    Ok(serde_json::to_string_pretty(&editor.editor_state().to_json()?)?)
}
