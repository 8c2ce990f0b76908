use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Deny,
    Approve,
}

/// One explicit tool rule. Patterns are an exact tool name, the universal
/// wildcard `*`, or a server-level prefix wildcard `prefix__*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRule {
    pub id: String,
    pub tool_pattern: String,
    pub action: RuleAction,
    pub added_by: String,
}

impl HookRule {
    pub fn matches(&self, tool_name: &str) -> bool {
        pattern_matches(&self.tool_pattern, tool_name)
    }
}

fn pattern_matches(pattern: &str, tool_name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("__*") {
        return tool_name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with("__"));
    }
    pattern == tool_name
}

/// Ordered rule collection. Deny rules are consulted before approve rules;
/// within each class the first match wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<HookRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<HookRule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: HookRule) {
        self.rules.push(rule);
    }

    pub fn remove(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.id != rule_id);
        self.rules.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HookRule> {
        self.rules.iter()
    }

    /// First applicable rule for the tool, deny before approve. `None` means
    /// the rules have no opinion.
    pub fn match_rule(&self, tool_name: &str) -> Option<&HookRule> {
        self.rules
            .iter()
            .find(|rule| rule.action == RuleAction::Deny && rule.matches(tool_name))
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|rule| rule.action == RuleAction::Approve && rule.matches(tool_name))
            })
    }
}
