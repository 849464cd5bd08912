use serde::Serialize;
use thiserror::Error;

/// Why the interpreter could not produce a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    #[error("Completion service unavailable: {0}")]
    CompletionServiceUnavailable(String),

    #[error("Malformed completion: {0}")]
    MalformedCompletion(String),

    #[error("Invalid narrative payload: {0}")]
    InvalidNarrativePayload(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unrecognized action: {0}")]
    UnrecognizedAction(String),
}

impl InterpretError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::CompletionServiceUnavailable(_) => FailureKind::CompletionServiceUnavailable,
            Self::MalformedCompletion(_) => FailureKind::MalformedCompletion,
            Self::InvalidNarrativePayload(_) => FailureKind::InvalidNarrativePayload,
            Self::UnknownCommand(_) => FailureKind::UnknownCommand,
            Self::UnrecognizedAction(_) => FailureKind::UnrecognizedAction,
        }
    }
}

/// Relay failures surfaced by `ConnectionSlot::forward`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No active control surface connection")]
    NoActiveConnection,

    #[error("Write to connection {0} failed")]
    TransportWriteFault(crate::relay::ConnectionId),
}

impl RelayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NoActiveConnection => FailureKind::NoActiveConnection,
            Self::TransportWriteFault(_) => FailureKind::TransportWriteFault,
        }
    }
}

/// Flat failure taxonomy with stable machine-readable reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CompletionServiceUnavailable,
    MalformedCompletion,
    InvalidNarrativePayload,
    UnknownCommand,
    UnrecognizedAction,
    NoActiveConnection,
    TransportWriteFault,
}

impl FailureKind {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CompletionServiceUnavailable => "completion_service_unavailable",
            Self::MalformedCompletion => "malformed_completion",
            Self::InvalidNarrativePayload => "invalid_narrative_payload",
            Self::UnknownCommand => "unknown_command",
            Self::UnrecognizedAction => "unrecognized_action",
            Self::NoActiveConnection => "no_active_connection",
            Self::TransportWriteFault => "transport_write_fault",
        }
    }
}

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error(transparent)]
    Interpret(#[from] InterpretError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Relay rejected command: {0}")]
    RelayRejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;
