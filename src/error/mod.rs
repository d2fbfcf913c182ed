mod app;
mod config;
mod frame;
mod pool;
mod request;
mod transport;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use frame::FrameError;
pub use pool::PoolError;
pub use request::RequestError;
pub use transport::TransportError;
pub use validation::ValidationError;
