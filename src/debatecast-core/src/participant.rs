//! Debate sides and the personas bound to them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// One of the two debate participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Side1,
    Side2,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Side1, Side::Side2];

    /// The opposing side.
    pub fn other(self) -> Side {
        match self {
            Side::Side1 => Side::Side2,
            Side::Side2 => Side::Side1,
        }
    }

    /// Identifier used in documents and prompts (`side1`, `side2`).
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Side1 => "side1",
            Side::Side2 => "side2",
        }
    }

    /// Label the judge uses in its verdict (`Side 1`, `Side 2`).
    pub fn verdict_label(self) -> &'static str {
        match self {
            Side::Side1 => "Side 1",
            Side::Side2 => "Side 2",
        }
    }

    /// Name read aloud in the narration.
    pub fn friendly_name(self) -> &'static str {
        match self {
            Side::Side1 => "AI 1",
            Side::Side2 => "AI 2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = DebateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "side1" | "1" => Ok(Side::Side1),
            "side2" | "2" => Ok(Side::Side2),
            other => Err(DebateError::ValidationError(format!(
                "Unknown side '{}'. Expected side1 or side2",
                other
            ))),
        }
    }
}

/// Per-debate configuration of one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Instructions sent to the model as its system prompt.
    #[serde(default)]
    pub instructions: String,
    /// Voice used when synthesizing this side's responses.
    #[serde(default)]
    pub voice_id: String,
}

impl Persona {
    pub fn new(instructions: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            voice_id: voice_id.into(),
        }
    }
}
