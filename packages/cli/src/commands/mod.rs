pub mod check;
pub mod init;
pub mod inspect;
pub mod roundtrip;

pub use check::{check, CheckArgs};
pub use init::{init, InitArgs};
pub use inspect::{inspect, InspectArgs};
pub use roundtrip::{roundtrip, RoundtripArgs};

use anyhow::{Context, Result};
use lexical_editor::Editor;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Read an exported editor state from `path` and commit it to `editor`
pub(crate) fn load_document(editor: &mut Editor, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let state = editor
        .parse_editor_state(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    editor.set_editor_state(state)?;
    Ok(())
}

/// All `.json` documents under `dir`, skipping the CLI config file.
/// Symlinks are followed; a link back into the tree is reported by the
/// walker and skipped rather than walked again.
pub(crate) fn find_documents(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping directory entry");
                None
            }
        })
    {
        let path = entry.path();
        if path.is_file()
            && path.extension().map(|e| e == "json").unwrap_or(false)
            && path.file_name().map(|n| n != crate::config::DEFAULT_CONFIG_NAME).unwrap_or(true)
        {
            files.push(path.to_path_buf());
        }
    }

    files
}
