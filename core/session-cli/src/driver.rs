//! The event loop: one ordered stream of protocol messages and user actions.
//!
//! A reader thread pushes raw lines into a channel; the loop applies each
//! event to the controller completely before taking the next one.

use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, warn};
use trailhead_core::protocol::{parse_message_value, ErrorInfo, InboundMessage, MAX_MESSAGE_BYTES};
use trailhead_core::{SessionController, SessionError, Transport};

/// A user action, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    RunAgain,
    /// Replaces the pending-input buffer.
    Input { text: String },
    /// Answers the pending prompt with the input buffer.
    Submit,
    Resolve {
        index: usize,
        value: String,
        /// Generation the caller saw; defaults to the current one.
        #[serde(default)]
        generation: Option<u64>,
        /// Prompt text the caller saw; defaults to the entry's current text.
        #[serde(default)]
        prompt: Option<String>,
    },
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Message(InboundMessage),
    Action(UserAction),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub messages: usize,
    pub actions: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<DriverEvent>, ErrorInfo> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ErrorInfo::new(
            "message_too_large",
            "line exceeded maximum size",
        ));
    }

    let value: Value = serde_json::from_str(line).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("line was not valid JSON: {}", err))
    })?;

    if value.get("action").is_some() {
        let action = serde_json::from_value::<UserAction>(value).map_err(|err| {
            ErrorInfo::new("invalid_action", format!("unrecognized action: {}", err))
        })?;
        return Ok(Some(DriverEvent::Action(action)));
    }

    parse_message_value(value).map(|message| Some(DriverEvent::Message(message)))
}

pub fn apply<T: Transport>(
    controller: &mut SessionController<T>,
    event: DriverEvent,
) -> Result<(), SessionError> {
    match event {
        DriverEvent::Message(message) => {
            controller.handle(message);
            Ok(())
        }
        DriverEvent::Action(UserAction::RunAgain) => controller.run_again().map(|_| ()),
        DriverEvent::Action(UserAction::Input { text }) => {
            controller.set_input(text);
            Ok(())
        }
        DriverEvent::Action(UserAction::Submit) => controller.submit_input(),
        DriverEvent::Action(UserAction::Resolve {
            index,
            value,
            generation,
            prompt,
        }) => {
            let mut captured = controller.prompt_ref(index)?;
            if let Some(generation) = generation {
                captured.generation = generation;
            }
            if let Some(prompt) = prompt {
                captured.prompt = prompt;
            }
            controller.resolve(&captured, value)
        }
        DriverEvent::Action(UserAction::Teardown) => {
            controller.teardown();
            Ok(())
        }
    }
}

/// Consumes `source` to the end, applying every event in arrival order.
pub fn drive<T: Transport>(
    controller: &mut SessionController<T>,
    source: Box<dyn BufRead + Send>,
) -> LoopStats {
    let (sender, receiver) = mpsc::channel();
    let reader = thread::spawn(move || {
        for line in source.lines() {
            let failed = line.is_err();
            if sender.send(line).is_err() || failed {
                break;
            }
        }
    });

    let mut stats = LoopStats::default();
    for line in receiver {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Failed to read input; stopping");
                break;
            }
        };

        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, "Rejected input line");
                stats.rejected += 1;
                continue;
            }
        };

        match &event {
            DriverEvent::Message(message) => {
                debug!(kind = message.kind(), "Inbound message");
                stats.messages += 1;
            }
            DriverEvent::Action(action) => {
                debug!(action = ?action, "User action");
                stats.actions += 1;
            }
        }

        if let Err(err) = apply(controller, event) {
            error!(error = %err, "Action failed");
            stats.failed += 1;
        }
    }

    if reader.join().is_err() {
        warn!("Input reader thread panicked");
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use trailhead_core::protocol::OutboundMessage;
    use trailhead_core::{ConsistencyError, ProcessState, ProcessTarget, SessionConfig};

    fn source(lines: &[String]) -> Box<dyn BufRead + Send> {
        Box::new(Cursor::new(lines.join("\n").into_bytes()))
    }

    #[test]
    fn parses_actions_and_messages() {
        assert_eq!(
            parse_line(r#"{"action":"run_again"}"#).expect("parse"),
            Some(DriverEvent::Action(UserAction::RunAgain))
        );
        assert_eq!(
            parse_line(r#"{"action":"resolve","index":2,"value":"y"}"#).expect("parse"),
            Some(DriverEvent::Action(UserAction::Resolve {
                index: 2,
                value: "y".to_string(),
                generation: None,
                prompt: None,
            }))
        );
        assert!(matches!(
            parse_line(r#"{"type":"EXIT","data":{"pid":3}}"#),
            Ok(Some(DriverEvent::Message(InboundMessage::Exit(_))))
        ));
        assert_eq!(parse_line("   ").expect("blank"), None);
    }

    #[test]
    fn rejects_unknown_actions_and_bad_json() {
        assert_eq!(
            parse_line(r#"{"action":"dance"}"#).unwrap_err().code,
            "invalid_action"
        );
        assert_eq!(parse_line("nope").unwrap_err().code, "invalid_json");
        assert_eq!(
            parse_line(r#"{"type":"EXIT","data":{"pid":0}}"#)
                .unwrap_err()
                .code,
            "invalid_pid"
        );
    }

    #[test]
    fn drives_an_interactive_run() {
        let mut controller = SessionController::new(Vec::new(), SessionConfig::default());
        controller.run(ProcessTarget::new("greet", "./greet.py"));
        let request_id = controller
            .session()
            .map(|s| s.request_id().to_string())
            .expect("session");

        let lines = vec![
            format!(
                r#"{{"type":"RUNNING","data":{{"request_id":"{}","pid":12}}}}"#,
                request_id
            ),
            r#"{"type":"STDOUT","data":{"data":"Name? ","is_input_prompt":true}}"#.to_string(),
            String::new(),
            "garbage".to_string(),
            r#"{"action":"input","text":"Ada"}"#.to_string(),
            r#"{"action":"submit"}"#.to_string(),
            r#"{"action":"submit"}"#.to_string(),
            r#"{"type":"EXIT","data":{"pid":12}}"#.to_string(),
        ];

        let stats = drive(&mut controller, source(&lines));

        assert_eq!(
            stats,
            LoopStats {
                messages: 3,
                actions: 3,
                rejected: 1,
                failed: 1,
            }
        );
        assert_eq!(controller.state(), Some(ProcessState::Exited));
        assert_eq!(
            controller.transport()[1..],
            [
                OutboundMessage::Stdin {
                    data: "Ada".to_string(),
                    pid: 12
                },
                OutboundMessage::Inspect {
                    path: "./greet.py".to_string()
                },
            ]
        );
    }

    #[test]
    fn resolve_with_stale_generation_fails() {
        let mut controller = SessionController::new(Vec::new(), SessionConfig::default());
        controller.run(ProcessTarget::new("greet", "./greet.py"));
        let request_id = controller
            .session()
            .map(|s| s.request_id().to_string())
            .expect("session");
        controller.handle(
            parse_message_value(serde_json::json!({
                "type": "RUNNING",
                "data": {"request_id": request_id, "pid": 12}
            }))
            .expect("running"),
        );
        controller.handle(
            parse_message_value(serde_json::json!({
                "type": "STDOUT",
                "data": {"data": "Name? ", "is_input_prompt": true}
            }))
            .expect("prompt"),
        );

        let stale = DriverEvent::Action(UserAction::Resolve {
            index: 0,
            value: "Ada".to_string(),
            generation: Some(0),
            prompt: None,
        });
        let err = apply(&mut controller, stale).unwrap_err();
        assert!(err.is_consistency());
        assert!(controller.pending_prompt().is_some());
    }

    #[test]
    fn resolve_with_mismatched_prompt_text_fails() {
        let mut controller = SessionController::new(Vec::new(), SessionConfig::default());
        controller.run(ProcessTarget::new("greet", "./greet.py"));
        let request_id = controller
            .session()
            .map(|s| s.request_id().to_string())
            .expect("session");
        let lines = vec![
            format!(
                r#"{{"type":"RUNNING","data":{{"request_id":"{}","pid":12}}}}"#,
                request_id
            ),
            r#"{"type":"STDOUT","data":{"data":"Name? ","is_input_prompt":true}}"#.to_string(),
        ];
        drive(&mut controller, source(&lines));
        controller.transport_mut().clear();

        let event = parse_line(r#"{"action":"resolve","index":0,"value":"Ada","prompt":"Age? "}"#)
            .expect("parse")
            .expect("event");
        let err = apply(&mut controller, event).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Consistency(ConsistencyError::StaleIndex { index: 0 })
        ));
        assert!(controller.transport().is_empty());
        assert!(controller.pending_prompt().is_some());
    }
}
