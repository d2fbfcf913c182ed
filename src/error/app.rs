use thiserror::Error;

use super::{
    ConfigError, FrameError, PoolError, RequestError, TransportError, ValidationError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CLI error: {source}")]
    Clap {
        #[from]
        source: clap::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Request error: {0}")]
    Request(#[from] RequestError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation<E>(error: E) -> Self
    where
        E: Into<ValidationError>,
    {
        error.into().into()
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn pool<E>(error: E) -> Self
    where
        E: Into<PoolError>,
    {
        error.into().into()
    }

    pub fn transport<E>(error: E) -> Self
    where
        E: Into<TransportError>,
    {
        error.into().into()
    }

    pub fn frame<E>(error: E) -> Self
    where
        E: Into<FrameError>,
    {
        error.into().into()
    }

    pub fn request<E>(error: E) -> Self
    where
        E: Into<RequestError>,
    {
        error.into().into()
    }
}
