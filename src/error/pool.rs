use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker count must be between {min} and {max}, got {value}.")]
    InvalidThreadCount {
        value: usize,
        min: usize,
        max: usize,
    },
    #[error("Pending capacity must be >= 1.")]
    ZeroCapacity,
    #[error("Failed to spawn pool thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Pool has been closed.")]
    Closed,
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
