use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

use super::HEARTBEAT_TAG;

/// Compartment an agent's heartbeat is squawked under.
pub const HEARTBEAT_COMPARTMENT: &str = "heartbeat";

/// Status word an agent repeats on its heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AgentStatus {
    #[default]
    Idle,
    Wait,
    Prep,
    Run,
    Stop,
}

impl AgentStatus {
    #[must_use]
    pub const fn as_word(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Wait => "wait",
            AgentStatus::Prep => "prep",
            AgentStatus::Run => "run",
            AgentStatus::Stop => "stop",
        }
    }

    #[must_use]
    pub fn to_payload(self) -> String {
        format!("{}{}", HEARTBEAT_TAG, self.as_word())
    }

    /// Parses the body that follows the `H` tag.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown status word.
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        body.parse()
    }
}

impl FromStr for AgentStatus {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "wait" => Ok(AgentStatus::Wait),
            "prep" => Ok(AgentStatus::Prep),
            "run" => Ok(AgentStatus::Run),
            "stop" => Ok(AgentStatus::Stop),
            _ => Err(FrameError::UnknownStatus {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_word())
    }
}
