use super::{ConfigError, PoolError, RequestError, TransportError, ValidationError};

impl From<&'static str> for ValidationError {
    fn from(message: &'static str) -> Self {
        ValidationError::TestExpectation { message }
    }
}

impl From<String> for ValidationError {
    fn from(value: String) -> Self {
        ValidationError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for ConfigError {
    fn from(message: &'static str) -> Self {
        ConfigError::TestExpectation { message }
    }
}

impl From<String> for ConfigError {
    fn from(value: String) -> Self {
        ConfigError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for PoolError {
    fn from(message: &'static str) -> Self {
        PoolError::TestExpectation { message }
    }
}

impl From<String> for PoolError {
    fn from(value: String) -> Self {
        PoolError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for TransportError {
    fn from(message: &'static str) -> Self {
        TransportError::TestExpectation { message }
    }
}

impl From<String> for TransportError {
    fn from(value: String) -> Self {
        TransportError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for RequestError {
    fn from(message: &'static str) -> Self {
        RequestError::TestExpectation { message }
    }
}
