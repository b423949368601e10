use crate::models::LogLine;
use serde::Deserialize;
use serde_json::Value;

/// Phrases in `system` frames that mean the peer considers the job over.
const CLOSURE_PHRASES: [&str; 4] = [
    "execution completed",
    "execution finished",
    "connection closed",
    "session closed",
];

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Output { is_error: bool, text: String },
    InputPrompt(String),
    Status(String),
    Error(String),
    System(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalSignal {
    Completed,
    Failed,
}

/// Decodes one raw channel payload. Malformed payloads and unrecognized frame
/// kinds yield `None`; nothing at this boundary ever propagates an error to
/// the session.
pub fn decode(raw: &str) -> Option<FrameEvent> {
    let frame: RawFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::debug!(error = %error, "discarding malformed frame");
            return None;
        }
    };

    match frame.kind.as_str() {
        "output" => {
            let is_error = frame
                .content
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let text = frame.content.get("text").and_then(Value::as_str)?.to_string();
            Some(FrameEvent::Output { is_error, text })
        }
        "input_prompt" => frame
            .content
            .as_str()
            .map(|text| FrameEvent::InputPrompt(text.to_string())),
        "status" => string_or_field(&frame.content, "status").map(FrameEvent::Status),
        "error" => string_or_field(&frame.content, "message").map(FrameEvent::Error),
        "system" => frame
            .content
            .as_str()
            .map(|text| FrameEvent::System(text.to_string())),
        other => {
            tracing::debug!(kind = other, "ignoring unrecognized frame kind");
            None
        }
    }
}

fn string_or_field(content: &Value, field: &str) -> Option<String> {
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }
    content
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl FrameEvent {
    /// The transcript effect of this event, per the stream contract: prompts
    /// are informational output, status frames render as `Status: <status>`.
    pub fn to_log_line(&self) -> LogLine {
        match self {
            Self::Output { is_error: true, text } => LogLine::error(text.clone()),
            Self::Output { is_error: false, text } => LogLine::output(text.clone()),
            Self::InputPrompt(text) => LogLine::output(text.clone()),
            Self::Status(status) => LogLine::system(format!("Status: {}", status)),
            Self::Error(message) => LogLine::error(message.clone()),
            Self::System(text) => LogLine::system(text.clone()),
        }
    }

    /// Whether this event announces the end of the job. Terminal status is
    /// derived from frame content, not from channel closure.
    pub fn terminal_signal(&self) -> Option<TerminalSignal> {
        match self {
            Self::Status(status) => {
                let normalized = status.to_lowercase();
                if normalized.contains("completed") {
                    Some(TerminalSignal::Completed)
                } else if normalized.contains("failed") {
                    Some(TerminalSignal::Failed)
                } else {
                    None
                }
            }
            Self::Error(_) => Some(TerminalSignal::Failed),
            Self::System(text) => {
                let normalized = text.to_lowercase();
                CLOSURE_PHRASES
                    .iter()
                    .any(|phrase| normalized.contains(phrase))
                    .then_some(TerminalSignal::Completed)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, FrameEvent, TerminalSignal};
    use crate::models::LogKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_output_frame() {
        let event = decode(r#"{"type":"output","content":{"isError":false,"text":"Hello"}}"#)
            .expect("output frame");
        assert_eq!(
            event,
            FrameEvent::Output {
                is_error: false,
                text: "Hello".to_string()
            }
        );
        assert_eq!(event.to_log_line().kind, LogKind::Output);
        assert_eq!(event.terminal_signal(), None);
    }

    #[test]
    fn error_output_classifies_as_error_line() {
        let event = decode(r#"{"type":"output","content":{"isError":true,"text":"bad"}}"#)
            .expect("output frame");
        assert_eq!(event.to_log_line().kind, LogKind::Error);
    }

    #[test]
    fn decodes_status_frame_in_both_shapes() {
        let flat = decode(r#"{"type":"status","content":"Completed"}"#).expect("status frame");
        let nested =
            decode(r#"{"type":"status","content":{"status":"completed"}}"#).expect("status frame");
        assert_eq!(flat.terminal_signal(), Some(TerminalSignal::Completed));
        assert_eq!(nested.terminal_signal(), Some(TerminalSignal::Completed));
        assert_eq!(nested.to_log_line().text, "Status: completed");
    }

    #[test]
    fn failed_status_signals_failure() {
        let event = decode(r#"{"type":"status","content":"failed"}"#).expect("status frame");
        assert_eq!(event.terminal_signal(), Some(TerminalSignal::Failed));
    }

    #[test]
    fn decodes_error_frame_in_both_shapes() {
        let flat = decode(r#"{"type":"error","content":"boom"}"#).expect("error frame");
        assert_eq!(flat, FrameEvent::Error("boom".to_string()));
        assert_eq!(flat.terminal_signal(), Some(TerminalSignal::Failed));

        let nested =
            decode(r#"{"type":"error","content":{"message":"boom"}}"#).expect("error frame");
        assert_eq!(nested, FrameEvent::Error("boom".to_string()));
    }

    #[test]
    fn system_closure_phrase_signals_completion() {
        let event =
            decode(r#"{"type":"system","content":"Execution finished."}"#).expect("system frame");
        assert_eq!(event.terminal_signal(), Some(TerminalSignal::Completed));

        let chatty = decode(r#"{"type":"system","content":"warming up"}"#).expect("system frame");
        assert_eq!(chatty.terminal_signal(), None);
    }

    #[test]
    fn input_prompt_is_informational_output() {
        let event =
            decode(r#"{"type":"input_prompt","content":"n = "}"#).expect("input_prompt frame");
        let line = event.to_log_line();
        assert_eq!(line.kind, LogKind::Output);
        assert_eq!(line.text, "n = ");
    }

    #[test]
    fn malformed_payloads_are_swallowed() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#"{"content":"no type"}"#), None);
        assert_eq!(decode(r#"{"type":"output","content":"wrong shape"}"#), None);
        assert_eq!(decode(r#"{"type":"status","content":42}"#), None);
    }

    #[test]
    fn unrecognized_kind_is_ignored() {
        assert_eq!(decode(r#"{"type":"telemetry","content":"x"}"#), None);
    }
}
