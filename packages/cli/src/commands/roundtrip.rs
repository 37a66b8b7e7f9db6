use super::load_document;
use crate::config::LexicalConfig;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct RoundtripArgs {
    /// Exported editor state (.json)
    pub input: PathBuf,

    /// Write the re-exported document here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fail unless the re-export is identical to the input
    #[arg(long)]
    pub strict: bool,
}

/// How a document survived import then export
#[derive(Debug, PartialEq, Eq)]
pub enum RoundtripOutcome {
    /// Export equals the input
    Identical,
    /// Export differs from the input (missing defaults were filled in) but
    /// exporting again is stable
    Normalized { first_difference: String },
}

pub fn roundtrip(args: RoundtripArgs, config: &LexicalConfig) -> Result<()> {
    println!("🔁 {} {}", "Round-tripping".green().bold(), args.input.display());

    let original: Value = serde_json::from_str(&fs::read_to_string(&args.input)?)?;
    let (exported, outcome) = roundtrip_document(config, &args.input, &original)?;

    match &outcome {
        RoundtripOutcome::Identical => {
            println!("   {} Export is identical to the input", "✓".green());
        }
        RoundtripOutcome::Normalized { first_difference } => {
            println!("   {} Export was normalized", "~".yellow());
            println!("     first difference at {}", first_difference.bright_white());
        }
    }

    if let Some(output) = &args.output {
        fs::write(output, serde_json::to_string_pretty(&exported)?)?;
        println!("   {} Wrote {}", "✓".green(), output.display());
    }

    if args.strict && outcome != RoundtripOutcome::Identical {
        return Err(anyhow!("{} does not round-trip unchanged", args.input.display()));
    }
    Ok(())
}

/// Import `path`, export it, then import and export the result once more.
/// The second export must equal the first.
pub fn roundtrip_document(
    config: &LexicalConfig,
    path: &std::path::Path,
    original: &Value,
) -> Result<(Value, RoundtripOutcome)> {
    let mut editor = config.build_editor()?;
    load_document(&mut editor, path)?;
    let first: Value = serde_json::from_str(&editor.export_json()?)?;

    let mut again = config.build_editor()?;
    let reparsed = again.parse_editor_state(&first.to_string())?;
    again.set_editor_state(reparsed)?;
    let second: Value = serde_json::from_str(&again.export_json()?)?;

    if let Some(path) = first_difference(&first, &second, "$") {
        return Err(anyhow!("Export is not stable: second export differs at {}", path));
    }

    let outcome = match first_difference(original, &first, "$") {
        None => RoundtripOutcome::Identical,
        Some(first_difference) => {
            debug!(%first_difference, "Export differs from input");
            RoundtripOutcome::Normalized { first_difference }
        }
    };
    Ok((first, outcome))
}

/// JSON path of the first place `a` and `b` disagree
fn first_difference(a: &Value, b: &Value, path: &str) -> Option<String> {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let mut keys: Vec<&String> = left.keys().chain(right.keys()).collect();
            keys.sort();
            keys.dedup();
            keys.into_iter().find_map(|key| match (left.get(key), right.get(key)) {
                (Some(l), Some(r)) => first_difference(l, r, &format!("{}.{}", path, key)),
                _ => Some(format!("{}.{}", path, key)),
            })
        }
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                return Some(format!("{} (length {} vs {})", path, left.len(), right.len()));
            }
            left.iter()
                .zip(right)
                .enumerate()
                .find_map(|(i, (l, r))| first_difference(l, r, &format!("{}[{}]", path, i)))
        }
        _ if a == b => None,
        _ => Some(path.to_string()),
    }
}
