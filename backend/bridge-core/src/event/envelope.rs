use crate::error::ProtocolError;
use crate::event::{CommandKind, EventKind, WireName};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const COMMAND_FIELD: &str = "command";
const RESULT_FIELD: &str = "result";
const ERROR_FIELD: &str = "error";
const DEFAULT_SOURCE: &str = "daemon";

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// Notification exactly as the daemon writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Command exactly as the daemon reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl WireCommand {
    pub fn new(command: CommandKind, params: Option<Value>) -> Self {
        Self {
            command: command.encode().to_string(),
            params,
        }
    }
}

/// A decoded, validated notification.
///
/// `command` is lifted out of the wire `data` object; `payload` holds the rest
/// of `data` (`None` when nothing else was sent). Command-result envelopes
/// always carry a `command` plus a payload or a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: EventKind,
    pub command: Option<CommandKind>,
    pub payload: Option<Value>,
    pub message: Option<String>,
    pub source: String,
    pub timestamp: String,
}

impl Envelope {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            command: None,
            payload: None,
            message: None,
            source: default_source(),
            timestamp: String::new(),
        }
    }

    pub fn with_command(mut self, command: CommandKind) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Success result in the shape the daemon emits.
    pub fn command_success(command: CommandKind, message: impl Into<String>, result: Option<Value>) -> Self {
        let envelope = Envelope::new(EventKind::CommandSuccess)
            .with_command(command)
            .with_message(message);
        match result {
            Some(result) => envelope.with_payload(Value::Object(Map::from_iter([(
                RESULT_FIELD.to_string(),
                result,
            )]))),
            None => envelope,
        }
    }

    /// Error result in the shape the daemon emits.
    pub fn command_error(command: CommandKind, error: impl Into<String>) -> Self {
        let error = error.into();
        Envelope::new(EventKind::CommandError)
            .with_command(command)
            .with_message(format!("Command {command} failed: {error}"))
            .with_payload(Value::Object(Map::from_iter([(
                ERROR_FIELD.to_string(),
                Value::String(error),
            )])))
    }

    /// Parse one JSON notification line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let wire: WireEvent = serde_json::from_str(line)?;
        Self::from_wire(wire)
    }

    pub fn from_wire(wire: WireEvent) -> Result<Self, ProtocolError> {
        let kind = EventKind::decode(&wire.event_type)
            .ok_or_else(|| ProtocolError::unknown_event(&wire.event_type))?;

        let (command_name, payload) = split_command(wire.data);
        let command = command_name.as_deref().and_then(CommandKind::decode);

        if kind.is_command_result() {
            match (&command_name, command) {
                (None, _) => {
                    return Err(ProtocolError::malformed_result(kind.encode(), "missing command"));
                }
                (Some(name), None) => {
                    return Err(ProtocolError::malformed_result(
                        kind.encode(),
                        format!("unknown command '{name}'"),
                    ));
                }
                (Some(_), Some(_)) => {}
            }
            if payload.is_none() && wire.message.is_none() {
                return Err(ProtocolError::malformed_result(
                    kind.encode(),
                    "neither payload nor message present",
                ));
            }
        }

        Ok(Self {
            kind,
            command,
            payload,
            message: wire.message,
            source: wire.source,
            timestamp: wire.timestamp,
        })
    }

    pub fn to_wire(&self) -> WireEvent {
        let data = match (&self.payload, self.command) {
            (None, None) => None,
            (Some(payload), None) => Some(payload.clone()),
            (payload, Some(command)) => {
                let mut object = match payload {
                    Some(Value::Object(object)) => object.clone(),
                    Some(other) => Map::from_iter([(RESULT_FIELD.to_string(), other.clone())]),
                    None => Map::new(),
                };
                object.insert(
                    COMMAND_FIELD.to_string(),
                    Value::String(command.encode().to_string()),
                );
                Some(Value::Object(object))
            }
        };

        WireEvent {
            event_type: self.kind.encode().to_string(),
            data,
            timestamp: self.timestamp.clone(),
            source: self.source.clone(),
            message: self.message.clone(),
            metadata: None,
        }
    }

    /// The `result` member of a success payload.
    pub fn result(&self) -> Option<&Value> {
        self.payload.as_ref()?.get(RESULT_FIELD)
    }

    /// The service's error text, falling back to the human-readable message.
    pub fn error_message(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|payload| payload.get(ERROR_FIELD))
            .and_then(Value::as_str)
            .or(self.message.as_deref())
    }
}

/// Lift `data.command` out of the payload; an object left empty becomes `None`.
fn split_command(data: Option<Value>) -> (Option<String>, Option<Value>) {
    match data {
        Some(Value::Object(mut object)) => {
            let command = match object.remove(COMMAND_FIELD) {
                Some(Value::String(name)) => Some(name),
                Some(other) => Some(other.to_string()),
                None => None,
            };
            let payload = if object.is_empty() {
                None
            } else {
                Some(Value::Object(object))
            };
            (command, payload)
        }
        other => (None, other),
    }
}
