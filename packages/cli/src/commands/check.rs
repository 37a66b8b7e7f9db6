use super::{find_documents, load_document};
use crate::config::LexicalConfig;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Exported editor state or a directory of them
    pub input: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, serde::Serialize)]
pub struct CheckReport {
    pub file: String,
    pub nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn check(args: CheckArgs, config: &LexicalConfig) -> Result<()> {
    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        find_documents(&args.input)
    } else {
        return Err(anyhow!("Input path does not exist: {}", args.input.display()));
    };

    let reports: Vec<CheckReport> = files.iter().map(|file| check_file(config, file)).collect();
    let failed = reports.iter().filter(|report| report.error.is_some()).count();
    info!(files = reports.len(), failed, "Checked documents");

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports, failed);
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} documents failed", failed, reports.len()));
    }
    Ok(())
}

/// Parse, commit and validate a single document. Validation always runs
/// here, whatever the configured editor mode.
pub fn check_file(config: &LexicalConfig, file: &Path) -> CheckReport {
    let result = (|| -> Result<usize> {
        let mut editor = config.build_editor()?;
        load_document(&mut editor, file)?;
        let state = editor.editor_state();
        state.validate()?;
        Ok(state.len())
    })();

    match result {
        Ok(nodes) => CheckReport {
            file: file.display().to_string(),
            nodes,
            error: None,
        },
        Err(err) => {
            warn!(file = %file.display(), "Document failed: {:#}", err);
            CheckReport {
                file: file.display().to_string(),
                nodes: 0,
                error: Some(format!("{:#}", err)),
            }
        }
    }
}

fn print_reports(reports: &[CheckReport], failed: usize) {
    println!("🔍 {} Lexical documents", "Checking".green().bold());
    println!();
    for report in reports {
        match &report.error {
            None => println!("   {} {} ({} nodes)", "✓".green(), report.file, report.nodes),
            Some(error) => {
                println!("   {} {}", "✗".red(), report.file);
                println!("     {}", error.red());
            }
        }
    }

    println!();
    println!(
        "✨ {} Check complete!",
        if failed > 0 {
            "Done".red().bold()
        } else {
            "Done".green().bold()
        }
    );
    println!("   Files checked: {}", reports.len());
    if failed > 0 {
        println!("   {} {}", "Failed:".red(), failed);
    }
}
