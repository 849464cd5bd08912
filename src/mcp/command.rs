//! MCP command data model
//!
//! The wire form is the same JSON the completion service is asked to emit,
//! so a validated command is relayed to the editor unchanged in shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated instruction for the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Command {
    /// Insert a narrative block into the open document
    #[serde(rename = "insert_narrative")]
    NarrativeInsertion { payload: Narrative },

    /// Run a registered editor command
    #[serde(rename = "execute_command")]
    CommandExecution {
        #[serde(rename = "command", alias = "commandId")]
        command_id: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Command {
    pub fn narrative(kind: NarrativeType, text: impl Into<String>, line: u64) -> Self {
        Self::NarrativeInsertion {
            payload: Narrative {
                kind,
                text: text.into(),
                line,
            },
        }
    }

    pub fn execute(command_id: impl Into<String>, args: Vec<Value>) -> Self {
        Self::CommandExecution {
            command_id: command_id.into(),
            args,
        }
    }

    /// Discriminator as it appears on the wire
    pub fn action(&self) -> &'static str {
        match self {
            Self::NarrativeInsertion { .. } => "insert_narrative",
            Self::CommandExecution { .. } => "execute_command",
        }
    }

    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    #[serde(rename = "type")]
    pub kind: NarrativeType,
    pub text: String,
    #[serde(rename = "line_number", default)]
    pub line: u64,
}

/// Narrative categories understood by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeType {
    Normal,
    Urgent,
    Draft,
    #[serde(alias = "urgent completed")]
    UrgentCompleted,
    #[serde(alias = "draft completed")]
    DraftCompleted,
}

impl NarrativeType {
    pub const ALL: [NarrativeType; 5] = [
        NarrativeType::Normal,
        NarrativeType::Urgent,
        NarrativeType::Draft,
        NarrativeType::UrgentCompleted,
        NarrativeType::DraftCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeType::Normal => "normal",
            NarrativeType::Urgent => "urgent",
            NarrativeType::Draft => "draft",
            NarrativeType::UrgentCompleted => "urgent_completed",
            NarrativeType::DraftCompleted => "draft_completed",
        }
    }

    /// Lenient parse: case-insensitive, with space or hyphen accepted in
    /// place of the underscore ("urgent completed" is what models often say).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}
