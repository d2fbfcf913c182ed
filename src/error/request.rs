use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request type already registered: {name}")]
    DuplicateType { name: String },
    #[error("{step} failed for key '{key}': {message}")]
    Operation {
        step: &'static str,
        key: String,
        message: String,
    },
    #[error("Connection '{connection}' failed: {message}")]
    Connection { connection: String, message: String },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
}
