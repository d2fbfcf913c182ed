use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid boolean '{value}'. Expected true/false, yes/no, on/off, or 1/0.")]
    InvalidBoolean { value: String },
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Value must be <= {max}.")]
    ValueTooLarge { max: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid multicast endpoint '{value}'. Expected 'a.b.c.d:port'.")]
    InvalidEndpoint { value: String },
    #[error("'{value}' is not an IPv4 multicast group (224.0.0.0/4).")]
    NotMulticast { value: String },
    #[error("Invalid request mode '{value}'. Use bymessage or byuser.")]
    InvalidRequestMode { value: String },
    #[error("{min_field} must be <= {max_field}.")]
    RangeInverted {
        min_field: &'static str,
        max_field: &'static str,
    },
    #[error("Unknown test class '{name}'. Known classes: {known}.")]
    UnknownClass { name: String, known: String },
    #[error("Test '{class}' failed before issuing any requests.")]
    RunFailed { class: String },
    #[error("Failed to build runtime: {source}")]
    RuntimeBuildFailed {
        #[source]
        source: std::io::Error,
    },
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
