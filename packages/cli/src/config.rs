use anyhow::{Context, Result};
use lexical_editor::{Editor, EditorConfig, NodeConfig, StateConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_NAME: &str = "lexical.config.json";

/// Lexical CLI configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalConfig {
    /// Settings handed to every editor the CLI creates
    #[serde(default)]
    pub editor: EditorConfig,

    /// Node types registered on top of root, paragraph and text
    #[serde(default)]
    pub nodes: Vec<NodeDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeclaration {
    #[serde(rename = "type")]
    pub node_type: String,

    pub kind: DeclaredKind,

    #[serde(default = "default_version")]
    pub version: u32,

    /// Built-in type this one is constructed in place of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_keys: Vec<StateKeyDeclaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredKind {
    Element,
    Text,
    Decorator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateKeyDeclaration {
    pub key: String,

    /// Stored at the top level of the node JSON instead of under `$state`
    #[serde(default)]
    pub flat: bool,

    #[serde(default)]
    pub default: Value,
}

fn default_version() -> u32 {
    1
}

impl StateKeyDeclaration {
    /// A config that keeps whatever JSON it is given
    pub fn state_config(&self) -> StateConfig<Value> {
        let default = self.default.clone();
        StateConfig::new(self.key.clone(), move |raw| {
            raw.cloned().unwrap_or_else(|| default.clone())
        })
    }
}

impl NodeDeclaration {
    pub fn node_config(&self) -> NodeConfig {
        let mut config = match self.kind {
            DeclaredKind::Element => NodeConfig::element(self.node_type.clone()),
            DeclaredKind::Text => NodeConfig::text(self.node_type.clone()),
            DeclaredKind::Decorator => NodeConfig::decorator(self.node_type.clone()),
        }
        .version(self.version);

        if let Some(original) = &self.replaces {
            config = config.replaces(original.clone());
        }
        for declared in &self.state_keys {
            let state = declared.state_config();
            config = if declared.flat {
                config.with_flat_state(&state)
            } else {
                config.with_state(&state)
            };
        }
        config
    }
}

impl LexicalConfig {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Return default config if none exists
            Ok(LexicalConfig::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: LexicalConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = %path.display(), nodes = config.nodes.len(), "Loaded config");
        Ok(config)
    }

    /// Resolve an explicit `--config` path or fall back to the working directory
    pub fn resolve(explicit: Option<&PathBuf>, cwd: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load(cwd),
        }
    }

    /// A fresh editor with every declared node type registered. Declaring a
    /// built-in type re-registers it, which is how state keys are attached to
    /// paragraph or text nodes.
    pub fn build_editor(&self) -> Result<Editor> {
        let mut editor = Editor::new(self.editor.clone());
        for declaration in &self.nodes {
            let config = declaration.node_config();
            if editor.registry().contains(&declaration.node_type) {
                editor.reregister_node(config)?;
            } else {
                editor.register_node(config)?;
            }
        }
        Ok(editor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "editor": { "validation": true, "maxTransformPasses": 7 },
            "nodes": [
                { "type": "heading", "kind": "element" },
                { "type": "image", "kind": "decorator", "version": 2,
                  "stateKeys": [{ "key": "id", "flat": true, "default": 0 }] }
            ]
        }"#;

        let config: LexicalConfig = serde_json::from_str(json).unwrap();
        assert!(config.editor.validation);
        assert_eq!(config.editor.max_transform_passes, 7);
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].kind, DeclaredKind::Element);
        assert_eq!(config.nodes[0].version, 1);
        assert_eq!(config.nodes[1].version, 2);
        assert!(config.nodes[1].state_keys[0].flat);
        assert_eq!(config.nodes[1].state_keys[0].default, json!(0));
    }

    #[test]
    fn test_default_config() {
        let config = LexicalConfig::default();
        assert!(config.nodes.is_empty());
        assert_eq!(config.editor, EditorConfig::default());
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = LexicalConfig::load(dir.path()).unwrap();
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "nodes": [{ "type": "quote", "kind": "element" }] }"#,
        )
        .unwrap();

        let config = LexicalConfig::load(dir.path()).unwrap();
        assert_eq!(config.nodes[0].node_type, "quote");
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nodes: ").unwrap();

        let err = LexicalConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_build_editor_registers_declared_types() {
        let config: LexicalConfig = serde_json::from_value(json!({
            "nodes": [
                { "type": "heading", "kind": "element" },
                { "type": "text", "kind": "text", "stateKeys": [{ "key": "lang", "default": "en" }] }
            ]
        }))
        .unwrap();

        let editor = config.build_editor().unwrap();
        let types = editor.registry().node_types();
        assert!(types.contains(&"heading"));
        assert!(types.contains(&"text"));
        let text = editor.registry().class("text").unwrap();
        assert!(text.shared_state().borrow().has_key("lang"));
    }

    #[test]
    fn test_declared_state_falls_back_to_default() {
        let declared = StateKeyDeclaration {
            key: "lang".to_string(),
            flat: false,
            default: json!("en"),
        };
        let state = declared.state_config();
        assert_eq!(state.parse(None), json!("en"));
        assert_eq!(state.parse(Some(&json!("fr"))), json!("fr"));
    }
}
