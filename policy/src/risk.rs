use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::classify_shell_command;

/// Coarse classification of potential irreversible effect, ordered by
/// severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Read,
    Moderate,
    Write,
    Destructive,
}

impl RiskTier {
    /// Display policy: only Read auto-allows, everything else asks.
    pub fn requires_confirmation(self) -> bool {
        self != RiskTier::Read
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Read => "read",
            RiskTier::Moderate => "moderate",
            RiskTier::Write => "write",
            RiskTier::Destructive => "destructive",
        }
    }
}

/// Static tier table for built-in tools and known namespaced actions.
///
/// Shared by both classifiers below. The two disagree on the default for a
/// tool that is absent here: `requires_permission` treats it as dangerous
/// while `risk_tier` returns Moderate. Keep the defaults distinct; callers
/// rely on the coarse gate being the stricter of the two.
fn lookup(tool_name: &str) -> Option<RiskTier> {
    let tier = match tool_name {
        "Read" | "Glob" | "Grep" | "LS" | "NotebookRead" | "TodoRead" | "WebSearch"
        | "AskUserQuestion" => RiskTier::Read,
        "WebFetch" | "TodoWrite" | "Task" | "ExitPlanMode" => RiskTier::Moderate,
        "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => RiskTier::Write,
        "Bash" | "BashOutput" | "KillShell" => RiskTier::Moderate,
        "mcp__filesystem__read_file" | "mcp__filesystem__list_directory" => RiskTier::Read,
        "mcp__filesystem__write_file" | "mcp__filesystem__edit_file" => RiskTier::Write,
        "mcp__filesystem__delete_file" => RiskTier::Destructive,
        _ => return None,
    };
    Some(tier)
}

/// Four-tier classifier over the tool name alone. Unrecognized tools default
/// to Moderate.
pub fn risk_tier(tool_name: &str) -> RiskTier {
    lookup(tool_name).unwrap_or(RiskTier::Moderate)
}

/// Tier classifier that can see the tool input. For the generic shell tool
/// the command text decides; everything else falls back to the name table.
pub fn risk_tier_for(tool_name: &str, tool_input: &Value) -> RiskTier {
    if tool_name == "Bash" {
        let command = tool_input
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("");
        return classify_shell_command(command);
    }
    risk_tier(tool_name)
}

/// Coarse safe/dangerous gate deciding whether any prompt is needed at all.
/// Unrecognized tools are dangerous, deliberately more conservative than the
/// four-tier default.
pub fn requires_permission(tool_name: &str) -> bool {
    match lookup(tool_name) {
        Some(tier) => tier.requires_confirmation(),
        None => true,
    }
}
