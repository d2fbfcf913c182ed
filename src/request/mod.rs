//! The contract between the runner and the code that actually exercises a
//! system under test.
//!
//! A [`LoadTest`] is created fresh for every run from a factory in the
//! [`RequestRegistry`]. It hands out one [`Request`] per work item; the
//! runner calls [`Request::do_request`] on a pool worker with that worker's
//! connection state.
mod builtins;
mod registry;
mod set_get;

#[cfg(test)]
mod tests;

use std::any::Any;

use rand::{Rng, thread_rng};
use tracing::warn;

use crate::error::RequestError;
use crate::settings::TestSettings;

pub use builtins::{BASIC_SET_GET, MemoryOps, NULL_SET_GET, NullOps, register_builtins};
pub use registry::{LoadTestFactory, RequestRegistry, request_registry};
pub use set_get::{SetGetOps, SetGetTest};

/// State a worker thread carries from one request to the next, such as an
/// open client. Dropped when the run ends.
pub type Connection = Option<Box<dyn Any + Send>>;

/// One unit of load.
pub trait Request: Send + Sync + 'static {
    /// Performs the request. `connection` holds whatever the previous
    /// request on this worker thread left there.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails; the runner reports it
    /// through [`Request::exception_thrown`].
    fn do_request(&self, connection: &mut Connection) -> Result<(), RequestError>;

    fn exception_thrown(&self, message: &str) {
        warn!("Request failed: {}", message);
    }
}

/// A named kind of test.
pub trait LoadTest: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Last word on the settings, applied after every other source.
    fn override_settings(&self, _settings: &mut TestSettings) {}

    /// Runs once before any request is issued.
    ///
    /// # Errors
    ///
    /// Returns an error when the test cannot start; the run is abandoned.
    fn prep_for_test(&self, _settings: &TestSettings) -> Result<(), RequestError> {
        Ok(())
    }

    /// Builds the next request. `settings` are the latest live settings.
    fn new_request(&self, settings: &TestSettings) -> Box<dyn Request>;

    /// Named values sampled on every metrics tick, if the test keeps any.
    fn metrics(&self) -> Option<Vec<(String, f64)>> {
        None
    }

    /// Runs once when the test ends, after the pool has closed or when prep
    /// or pool startup failed.
    fn finish_test(&self) {}
}

/// Uppercase ASCII text with a length drawn from `min..=max`.
#[must_use]
pub fn random_payload(min: u64, max: u64) -> String {
    let mut rng = thread_rng();
    let len = if max <= min {
        min
    } else {
        rng.gen_range(min..=max)
    };
    let len = usize::try_from(len).unwrap_or(usize::MAX);
    (0..len).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect()
}
