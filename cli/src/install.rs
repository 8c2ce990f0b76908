//! Hook settings installer.
//!
//! Registers `toolgate hook` as the command for every recognized hook name
//! in the project's settings file, so the host invokes the forwarder at each
//! lifecycle moment. The merge is idempotent and preserves unrelated keys.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use serde_json::json;
use toolgate_protocol::HookEventName;

const HOOK_COMMAND: &str = "toolgate hook";

/// The settings fragment registering the forwarder for one hook name.
fn hook_entry() -> Value {
    json!({
        "type": "command",
        "command": HOOK_COMMAND,
    })
}

fn is_toolgate_hook_installed(hooks_array: &[Value]) -> bool {
    hooks_array.iter().any(|entry| {
        entry
            .get("command")
            .and_then(Value::as_str)
            .is_some_and(|cmd| cmd.contains("toolgate hook"))
    })
}

/// Generate the full settings fragment, one entry per recognized hook name.
pub fn generate_hook_settings() -> Value {
    let mut hooks = serde_json::Map::new();
    for name in HookEventName::recognized() {
        hooks.insert(name.to_string(), json!([hook_entry()]));
    }
    json!({"hooks": hooks})
}

/// Merge the forwarder registration into `<project>/.claude/settings.json`.
/// Existing keys (model, unrelated hooks) are preserved; running twice does
/// not duplicate entries.
pub fn install_project_hooks(project_dir: &Path) -> anyhow::Result<()> {
    let settings_dir = project_dir.join(".claude");
    std::fs::create_dir_all(&settings_dir)
        .with_context(|| format!("failed to create {}", settings_dir.display()))?;
    let settings_path = settings_dir.join("settings.json");

    let mut settings: Value = if settings_path.exists() {
        let content = std::fs::read_to_string(&settings_path)
            .with_context(|| format!("failed to read {}", settings_path.display()))?;
        serde_json::from_str(&content).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };

    let root = settings
        .as_object_mut()
        .context("settings file is not a JSON object")?;
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .context("hooks is not a JSON object")?;

    for name in HookEventName::recognized() {
        let entries = hooks
            .entry(name.to_string())
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .with_context(|| format!("hooks.{name} is not an array"))?;
        if !is_toolgate_hook_installed(entries) {
            entries.push(hook_entry());
        }
    }

    let output = serde_json::to_string_pretty(&settings)?;
    std::fs::write(&settings_path, output)
        .with_context(|| format!("failed to write {}", settings_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn generate_covers_every_recognized_hook() {
        let settings = generate_hook_settings();
        let hooks = settings["hooks"].as_object().expect("hooks object");
        assert_eq!(hooks.len(), HookEventName::recognized().len());
        let pre = hooks["PreToolUse"].as_array().expect("array");
        assert_eq!(pre[0]["command"], json!("toolgate hook"));
    }

    #[test]
    fn install_creates_the_settings_file() {
        let dir = tempfile::tempdir().expect("tmpdir");
        install_project_hooks(dir.path()).expect("install");

        let content =
            std::fs::read_to_string(dir.path().join(".claude").join("settings.json")).unwrap();
        let settings: Value = serde_json::from_str(&content).unwrap();
        let pre = settings["hooks"]["PreToolUse"].as_array().unwrap();
        assert_eq!(pre.len(), 1);
    }

    #[test]
    fn install_is_idempotent() {
        let dir = tempfile::tempdir().expect("tmpdir");
        install_project_hooks(dir.path()).expect("first install");
        install_project_hooks(dir.path()).expect("second install");

        let content =
            std::fs::read_to_string(dir.path().join(".claude").join("settings.json")).unwrap();
        let settings: Value = serde_json::from_str(&content).unwrap();
        for name in HookEventName::recognized() {
            let entries = settings["hooks"][name].as_array().unwrap();
            assert_eq!(entries.len(), 1, "duplicated entry for {name}");
        }
    }

    #[test]
    fn install_preserves_existing_settings() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let settings_dir = dir.path().join(".claude");
        std::fs::create_dir_all(&settings_dir).unwrap();
        std::fs::write(
            settings_dir.join("settings.json"),
            serde_json::to_string_pretty(&json!({
                "model": "opus",
                "hooks": {
                    "PostToolUse": [{"type": "command", "command": "echo done"}]
                }
            }))
            .unwrap(),
        )
        .unwrap();

        install_project_hooks(dir.path()).expect("install");

        let content =
            std::fs::read_to_string(settings_dir.join("settings.json")).unwrap();
        let settings: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(settings["model"], json!("opus"));
        let post = settings["hooks"]["PostToolUse"].as_array().unwrap();
        assert_eq!(post.len(), 2, "existing entry kept, toolgate added");
    }
}
