//! Turn natural language requests into validated MCP commands
//!
//! The completion service is told to answer with a bare JSON command, but
//! nothing it returns is trusted: every completion goes through
//! `validate_candidate` before it becomes a `Command`.

use crate::core::error::InterpretError;
use crate::llm::client::CompletionService;
use crate::mcp::registry;
use crate::mcp::{Command, NarrativeType};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// Interpret a prompt as a single MCP command.
///
/// Makes exactly one completion request. Never panics on bad output and never
/// retries; every outcome is either a `Command` or a typed `InterpretError`.
pub async fn interpret<S: CompletionService>(
    service: &S,
    prompt: &str,
) -> Result<Command, InterpretError> {
    let system = system_instruction();

    let raw = match service.complete(&system, prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "completion service request failed");
            return Err(InterpretError::CompletionServiceUnavailable(e.to_string()));
        }
    };
    debug!(raw = %raw, "completion received");

    let result = parse_completion(&raw);
    if let Err(e) = &result {
        warn!(kind = ?e.kind(), raw = %raw, "rejected completion: {}", e);
    }
    result
}

/// Parse and validate raw completion text
pub fn parse_completion(raw: &str) -> Result<Command, InterpretError> {
    let json_str = extract_json(raw)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| InterpretError::MalformedCompletion(format!("{}: {}", e, raw)))?;
    validate_candidate(&value)
}

/// Extract the outermost JSON object from a completion (tolerates prose or
/// code fences around it)
fn extract_json(response: &str) -> Result<&str, InterpretError> {
    if response.trim().is_empty() {
        return Err(InterpretError::MalformedCompletion("empty completion".into()));
    }
    let start = response
        .find('{')
        .ok_or_else(|| InterpretError::MalformedCompletion("no JSON object found".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| InterpretError::MalformedCompletion("no closing brace found".into()))?;
    Ok(&response[start..=end])
}

/// Check a parsed candidate against the command protocol.
///
/// Also used by the relay's HTTP boundary, so submitted commands get the same
/// treatment as interpreted ones.
pub fn validate_candidate(value: &Value) -> Result<Command, InterpretError> {
    let object = value
        .as_object()
        .ok_or_else(|| InterpretError::UnrecognizedAction("top level is not an object".into()))?;

    match object.get("action").and_then(Value::as_str) {
        Some("insert_narrative") => validate_narrative(object),
        Some("execute_command") => validate_execution(object),
        Some(other) => Err(InterpretError::UnrecognizedAction(other.to_string())),
        None => Err(InterpretError::UnrecognizedAction("missing action".into())),
    }
}

fn validate_narrative(object: &Map<String, Value>) -> Result<Command, InterpretError> {
    let payload = object
        .get("payload")
        .and_then(Value::as_object)
        .ok_or_else(|| InterpretError::InvalidNarrativePayload("missing payload".into()))?;

    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| InterpretError::InvalidNarrativePayload("missing text".into()))?;

    let raw_type = payload
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| InterpretError::InvalidNarrativePayload("missing type".into()))?;
    let kind = NarrativeType::parse(raw_type).ok_or_else(|| {
        InterpretError::InvalidNarrativePayload(format!("unknown type: {}", raw_type))
    })?;

    Ok(Command::narrative(kind, text, line_or_default(payload.get("line_number"))))
}

fn validate_execution(object: &Map<String, Value>) -> Result<Command, InterpretError> {
    let command_id = object
        .get("command")
        .and_then(Value::as_str)
        .or_else(|| object.get("commandId").and_then(Value::as_str))
        .ok_or_else(|| InterpretError::UnknownCommand("missing command".into()))?;

    if !registry::is_known(command_id) {
        // Aliases never validate, but name the identifier so the caller can fix it
        if let Some(identifier) = registry::resolve_alias(command_id) {
            warn!(alias = command_id, identifier, "alias used in place of command id");
            return Err(InterpretError::UnknownCommand(format!(
                "{} (alias of {})",
                command_id, identifier
            )));
        }
        return Err(InterpretError::UnknownCommand(command_id.to_string()));
    }

    Ok(Command::execute(command_id, args_or_default(object.get("args"))))
}

/// Falsy or unusable line numbers become 0. A positive value is kept even
/// when it arrives as a float or a numeric string.
fn line_or_default(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Falsy args become empty; a lone truthy value is wrapped.
fn args_or_default(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        None | Some(Value::Null) | Some(Value::Bool(false)) => Vec::new(),
        Some(Value::String(s)) if s.is_empty() => Vec::new(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

/// System instruction sent with every request
pub fn system_instruction() -> String {
    let narrative_types = NarrativeType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let commands = registry::identifiers()
        .into_iter()
        .map(|id| format!("- {} (aliases: {})", id, registry::aliases_for(id).join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are Aurora Assistant, a JSON-only design agent.
Convert the user's request into exactly one MCP command.

Respond with raw JSON only: no markdown, no comments, no explanations.

There are two actions.

1. insert_narrative - add a narrative to the open document:
{{"action": "insert_narrative", "payload": {{"type": "<one of: {narrative_types}>", "text": "<clear medical instruction or narrative>", "line_number": <integer, default 0>}}}}

2. execute_command - run an editor command:
{{"action": "execute_command", "command": "<command id>", "args": []}}

Known command ids:
{commands}

Use the command id, never the alias.

Examples:
"add urgent note: check vitals" -> {{"action": "insert_narrative", "payload": {{"type": "urgent", "text": "check vitals", "line_number": 0}}}}
"add a regular narrative to monitor temperature hourly on line 15" -> {{"action": "insert_narrative", "payload": {{"type": "normal", "text": "Monitor temperature hourly", "line_number": 15}}}}
"open patient tracker" -> {{"action": "execute_command", "command": "aurora.openPatientTracker", "args": []}}
"hide the narratives" -> {{"action": "execute_command", "command": "aurora.hideNarratives", "args": []}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{FailureKind, McpError, Result};
    use serde_json::json;

    struct Canned(std::result::Result<&'static str, &'static str>);

    impl CompletionService for Canned {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(McpError::LlmError(msg.to_string())),
            }
        }
    }

    /// Records what the interpreter sent
    struct Recording {
        seen: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl CompletionService for Recording {
        async fn complete(&self, system: &str, user: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(r#"{"action":"execute_command","command":"aurora.openBilling"}"#.into())
        }
    }

    #[tokio::test]
    async fn test_urgent_note_scenario() {
        let service = Canned(Ok(
            r#"{"action":"insert_narrative","payload":{"type":"urgent","text":"check vitals","line_number":0}}"#,
        ));
        let cmd = interpret(&service, "add urgent note: check vitals").await.unwrap();
        assert_eq!(cmd, Command::narrative(NarrativeType::Urgent, "check vitals", 0));
    }

    #[tokio::test]
    async fn test_patient_tracker_scenario() {
        let service = Canned(Ok(
            r#"{"action":"execute_command","command":"aurora.openPatientTracker"}"#,
        ));
        let cmd = interpret(&service, "open patient tracker").await.unwrap();
        assert_eq!(cmd, Command::execute("aurora.openPatientTracker", vec![]));
    }

    #[tokio::test]
    async fn test_unknown_command_scenario() {
        let service = Canned(Ok(
            r#"{"action":"execute_command","command":"not.a.real.command"}"#,
        ));
        let err = interpret(&service, "do something").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnknownCommand);
    }

    #[tokio::test]
    async fn test_service_fault_is_a_value() {
        let service = Canned(Err("connection refused"));
        let err = interpret(&service, "open billing").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::CompletionServiceUnavailable);
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_prompt_and_instruction_are_sent() {
        let service = Recording {
            seen: std::sync::Mutex::new(Vec::new()),
        };
        interpret(&service, "open billing").await.unwrap();
        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "open billing");
        assert!(seen[0].0.contains("aurora.openBilling"));
        assert!(seen[0].0.contains("urgent_completed"));
    }

    #[test]
    fn test_malformed_and_empty_completions() {
        for raw in ["", "   ", "I can't help with that", "{\"action\": ", "} {", "{not json}"] {
            let err = parse_completion(raw).unwrap_err();
            assert_eq!(err.kind(), FailureKind::MalformedCompletion, "raw: {:?}", raw);
        }
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let raw = "```json\n{\"action\":\"execute_command\",\"command\":\"aurora.hideNarratives\"}\n```";
        let cmd = parse_completion(raw).unwrap();
        assert_eq!(cmd, Command::execute("aurora.hideNarratives", vec![]));
    }

    #[test]
    fn test_line_number_kept_when_truthy() {
        let cmd = validate_candidate(&json!({
            "action": "insert_narrative",
            "payload": {"type": "normal", "text": "Monitor temperature hourly", "line_number": 15}
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::narrative(NarrativeType::Normal, "Monitor temperature hourly", 15)
        );
    }

    #[test]
    fn test_line_number_falsy_values_default_to_zero() {
        for line in [json!(null), json!(0), json!(false), json!(""), json!(-4), json!("abc")] {
            let cmd = validate_candidate(&json!({
                "action": "insert_narrative",
                "payload": {"type": "draft", "text": "x", "line_number": line}
            }))
            .unwrap();
            assert_eq!(cmd, Command::narrative(NarrativeType::Draft, "x", 0));
        }
    }

    #[test]
    fn test_line_number_absent() {
        let cmd = validate_candidate(&json!({
            "action": "insert_narrative",
            "payload": {"type": "urgent completed", "text": "done"}
        }))
        .unwrap();
        assert_eq!(cmd, Command::narrative(NarrativeType::UrgentCompleted, "done", 0));
    }

    #[test]
    fn test_invalid_narrative_payloads() {
        let cases = [
            json!({"action": "insert_narrative"}),
            json!({"action": "insert_narrative", "payload": "text"}),
            json!({"action": "insert_narrative", "payload": {"type": "urgent"}}),
            json!({"action": "insert_narrative", "payload": {"type": "urgent", "text": ""}}),
            json!({"action": "insert_narrative", "payload": {"text": "check vitals"}}),
            json!({"action": "insert_narrative", "payload": {"type": "", "text": "x"}}),
            json!({"action": "insert_narrative", "payload": {"type": "shouting", "text": "x"}}),
        ];
        for case in cases {
            let err = validate_candidate(&case).unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidNarrativePayload, "case: {}", case);
        }
    }

    #[test]
    fn test_execute_command_args() {
        let with_args = validate_candidate(&json!({
            "action": "execute_command",
            "commandId": "aurora.changeNarrativeType",
            "args": ["urgent", 3]
        }))
        .unwrap();
        assert_eq!(
            with_args,
            Command::execute("aurora.changeNarrativeType", vec![json!("urgent"), json!(3)])
        );

        for args in [json!(null), json!(false), json!(0), json!("")] {
            let cmd = validate_candidate(&json!({
                "action": "execute_command",
                "command": "aurora.openBilling",
                "args": args
            }))
            .unwrap();
            assert_eq!(cmd, Command::execute("aurora.openBilling", vec![]));
        }
    }

    #[test]
    fn test_alias_is_not_an_identifier() {
        let err = validate_candidate(&json!({"action": "execute_command", "command": "billing"}))
            .unwrap_err();
        assert_eq!(
            err,
            InterpretError::UnknownCommand("billing (alias of aurora.openBilling)".into())
        );

        let err = validate_candidate(&json!({"action": "execute_command", "command": "nonsense"}))
            .unwrap_err();
        assert_eq!(err, InterpretError::UnknownCommand("nonsense".into()));

        let err = validate_candidate(&json!({"action": "execute_command"})).unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnknownCommand);
    }

    #[test]
    fn test_null_command_falls_back_to_command_id() {
        let cmd = validate_candidate(&json!({
            "action": "execute_command",
            "command": null,
            "commandId": "aurora.openBilling"
        }))
        .unwrap();
        assert_eq!(cmd, Command::execute("aurora.openBilling", vec![]));

        let err = validate_candidate(&json!({
            "action": "execute_command",
            "command": 7,
            "commandId": null
        }))
        .unwrap_err();
        assert_eq!(err, InterpretError::UnknownCommand("missing command".into()));
    }

    #[test]
    fn test_unrecognized_actions() {
        for case in [
            json!({"action": "delete_everything"}),
            json!({"payload": {"type": "urgent", "text": "x"}}),
            json!({"action": 7}),
            json!([1, 2, 3]),
            json!("insert_narrative"),
        ] {
            let err = validate_candidate(&case).unwrap_err();
            assert_eq!(err.kind(), FailureKind::UnrecognizedAction, "case: {}", case);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn falsy() -> impl Strategy<Value = Option<Value>> {
            prop_oneof![
                Just(None),
                Just(Some(json!(null))),
                Just(Some(json!(0))),
                Just(Some(json!(false))),
                Just(Some(json!(""))),
            ]
        }

        proptest! {
            #[test]
            fn falsy_line_number_defaults_to_zero(
                line in falsy(),
                text in "[a-zA-Z][a-zA-Z ]{0,40}",
                kind in prop::sample::select(NarrativeType::ALL.to_vec()),
            ) {
                let mut payload = json!({"type": kind.as_str(), "text": text.clone()});
                if let Some(line) = line {
                    payload["line_number"] = line;
                }
                let cmd = validate_candidate(&json!({"action": "insert_narrative", "payload": payload}))
                    .unwrap();
                prop_assert_eq!(cmd, Command::narrative(kind, text, 0));
            }

            #[test]
            fn positive_line_number_survives(line in 1u64..100_000) {
                let cmd = validate_candidate(&json!({
                    "action": "insert_narrative",
                    "payload": {"type": "normal", "text": "x", "line_number": line}
                }))
                .unwrap();
                prop_assert_eq!(cmd, Command::narrative(NarrativeType::Normal, "x", line));
            }

            #[test]
            fn arbitrary_text_never_panics(raw in ".{0,200}") {
                let _ = parse_completion(&raw);
            }
        }
    }
}
