use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame is not valid UTF-8.")]
    NotUtf8,
    #[error("Frame has no sender delimiter.")]
    MissingDelimiter,
    #[error("Sender delimiter at byte {index} is past the address prefix.")]
    MisplacedDelimiter { index: usize },
    #[error("Invalid sender address '{value}'.")]
    InvalidSender { value: String },
    #[error("Frame has no command tag.")]
    MissingTag,
    #[error("Malformed body: {reason}.")]
    MalformedBody { reason: &'static str },
    #[error("Expected <{expected}>, found <{found}>.")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },
    #[error("Body is missing <{element}>.")]
    MissingElement { element: &'static str },
    #[error("Body is missing the '{name}' attribute.")]
    MissingAttribute { name: &'static str },
    #[error("Invalid value '{value}' for {field}.")]
    InvalidField { field: &'static str, value: String },
    #[error("Unknown heartbeat status '{value}'.")]
    UnknownStatus { value: String },
}
