//! Command payloads carried inside transport frames.
//!
//! A payload is one tag character followed by a tag-specific body. Every
//! body except the heartbeat is a small `<Test ...>` element; see
//! [`TestBody`].
mod body;
mod commands;
mod fields;
mod heartbeat;
mod report;


use crate::error::FrameError;

pub use body::{Child, TestBody};
pub use commands::{FinishCommand, StartCommand, UpdateCommand};
pub use fields::{addressed_to, timestamp};
pub use heartbeat::{AgentStatus, HEARTBEAT_COMPARTMENT};
pub use report::MetricsReport;

pub const START_TAG: char = 'S';
pub const FINISH_TAG: char = 'F';
pub const UPDATE_TAG: char = 'U';
pub const METRICS_TAG: char = 'M';
pub const HEARTBEAT_TAG: char = 'H';

/// Any payload this crate knows how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(StartCommand),
    Update(UpdateCommand),
    Finish(FinishCommand),
    Metrics(MetricsReport),
    Heartbeat(AgentStatus),
}

/// Splits a payload into its tag and body.
#[must_use]
pub fn split_tag(payload: &str) -> Option<(char, &str)> {
    let mut chars = payload.chars();
    let tag = chars.next()?;
    Some((tag, chars.as_str()))
}

impl Command {
    /// Parses a full payload. Unknown tags yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is empty or a known tag carries a
    /// malformed body.
    pub fn parse(payload: &str) -> Result<Option<Self>, FrameError> {
        let (tag, body) = split_tag(payload).ok_or(FrameError::MissingTag)?;
        let command = match tag {
            START_TAG => Command::Start(StartCommand::parse(body)?),
            UPDATE_TAG => Command::Update(UpdateCommand::parse(body)?),
            FINISH_TAG => Command::Finish(FinishCommand::parse(body)?),
            METRICS_TAG => Command::Metrics(MetricsReport::parse(body)?),
            HEARTBEAT_TAG => Command::Heartbeat(AgentStatus::parse(body)?),
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    #[must_use]
    pub fn to_payload(&self) -> String {
        match self {
            Command::Start(command) => command.to_payload(),
            Command::Update(command) => command.to_payload(),
            Command::Finish(command) => command.to_payload(),
            Command::Metrics(report) => report.to_payload(),
            Command::Heartbeat(status) => status.to_payload(),
        }
    }
}
