use toolgate_policy::RuleAction;
use toolgate_policy::RuleSet;
use toolgate_policy::requires_permission;
use toolgate_protocol::HookEventName;
use toolgate_protocol::HookPayload;
use toolgate_protocol::RuntimeEvent;

/// Marker the host prepends to notification text that is really a question
/// for the end user.
const QUESTION_MARKER: &str = "[question]";

/// Tool the host uses to pose a structured question.
const QUESTION_TOOL: &str = "AskUserQuestion";

/// What the handler chain decided. The pipeline translates this into a
/// reply, queue traffic and feed events; the chain itself stays pure.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Subagent finished; enrichment may follow.
    SubagentCompleted,
    /// Native permission prompt hit a deny rule.
    PromptDenied { rule_id: String, added_by: String },
    /// Native permission prompt with no deny rule: allow immediately and
    /// deliberately skip the feed (the pre-tool stage will surface it).
    PromptAutoAllowed,
    /// Queued on the Question queue.
    QuestionQueued,
    /// Pre-tool request matched an explicit rule.
    RuleDenied { rule_id: String, added_by: String },
    RuleApproved { rule_id: String },
    /// Pre-tool request the risk engine deems safe: allow explicitly, never
    /// silent passthrough, so this policy stays authoritative over the
    /// host's own judgment.
    SafeAllowed,
    /// Pre-tool request that needs a human decision.
    PermissionQueued,
    /// Nothing matched; informational storage with automatic passthrough.
    Informational,
}

struct Handler {
    name: &'static str,
    applies: fn(&RuntimeEvent, &RuleSet) -> bool,
    run: fn(&RuntimeEvent, &RuleSet) -> Disposition,
}

/// Fixed-precedence handler chain; first applicable handler wins, unmatched
/// events fall through to the default.
const HANDLERS: &[Handler] = &[
    Handler {
        name: "subagent-completion",
        applies: |event, _| event.name == HookEventName::SubagentStop,
        run: |_, _| Disposition::SubagentCompleted,
    },
    Handler {
        name: "permission-prompt",
        applies: |event, _| event.name == HookEventName::PermissionRequest,
        run: |event, rules| {
            let tool_name = event.payload.tool_name().unwrap_or_default();
            match rules.match_rule(tool_name) {
                Some(rule) if rule.action == RuleAction::Deny => Disposition::PromptDenied {
                    rule_id: rule.id.clone(),
                    added_by: rule.added_by.clone(),
                },
                _ => Disposition::PromptAutoAllowed,
            }
        },
    },
    Handler {
        name: "structured-question",
        applies: |event, _| is_question(event),
        run: |_, _| Disposition::QuestionQueued,
    },
    Handler {
        name: "rule-match",
        applies: |event, rules| {
            event.name == HookEventName::PreToolUse
                && event
                    .payload
                    .tool_name()
                    .is_some_and(|tool| rules.match_rule(tool).is_some())
        },
        run: |event, rules| {
            let tool_name = event.payload.tool_name().unwrap_or_default();
            match rules.match_rule(tool_name) {
                Some(rule) if rule.action == RuleAction::Deny => Disposition::RuleDenied {
                    rule_id: rule.id.clone(),
                    added_by: rule.added_by.clone(),
                },
                Some(rule) => Disposition::RuleApproved {
                    rule_id: rule.id.clone(),
                },
                // Unreachable given the predicate; stay total anyway.
                None => Disposition::PermissionQueued,
            }
        },
    },
    Handler {
        name: "safe-tool",
        applies: |event, _| {
            event.name == HookEventName::PreToolUse
                && event
                    .payload
                    .tool_name()
                    .is_some_and(|tool| !requires_permission(tool))
        },
        run: |_, _| Disposition::SafeAllowed,
    },
    Handler {
        name: "permission-required",
        applies: |event, _| event.name == HookEventName::PreToolUse,
        run: |_, _| Disposition::PermissionQueued,
    },
];

fn is_question(event: &RuntimeEvent) -> bool {
    match &event.payload {
        HookPayload::Notification { message } => message
            .as_deref()
            .is_some_and(|text| text.trim_start().starts_with(QUESTION_MARKER)),
        HookPayload::PreToolUse { tool_name, .. } => tool_name == QUESTION_TOOL,
        _ => false,
    }
}

/// Evaluate the chain. The rule list is taken by reference so every dispatch
/// sees the current rules, never a snapshot.
pub fn dispatch_event(event: &RuntimeEvent, rules: &RuleSet) -> Disposition {
    for handler in HANDLERS {
        if (handler.applies)(event, rules) {
            tracing::debug!(
                handler = handler.name,
                hook = event.name.as_str(),
                request_id = %event.request_id,
                "handler matched"
            );
            return (handler.run)(event, rules);
        }
    }
    Disposition::Informational
}
