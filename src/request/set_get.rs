use std::sync::{Arc, Mutex};

use rand::{Rng, thread_rng};
use tracing::warn;

use crate::error::RequestError;
use crate::metrics::{GetSetMetrics, Operation};
use crate::settings::{RequestMode, TestSettings};
use crate::sync::lock;

use super::{Connection, LoadTest, Request, random_payload};

const STEP_CONNECT: &str = "Initiating Channel";
const STEP_SET: &str = "Set";
const STEP_GET: &str = "Get";

/// Get and Set against some store. Implementors only talk to the store;
/// timing, key generation and error context come from [`SetGetTest`].
pub trait SetGetOps: Send + Sync + 'static {
    /// Prepares the worker's connection to `target`. Called before every
    /// request; reuse what `connection` already holds.
    ///
    /// # Errors
    ///
    /// Returns a message when the target cannot be reached.
    fn connect(&self, _connection: &mut Connection, _target: &str) -> Result<(), String> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a message when the store rejects the write.
    fn set(&self, connection: &mut Connection, key: &str, value: &str) -> Result<(), String>;

    /// # Errors
    ///
    /// Returns a message when the store rejects the read.
    fn get(&self, connection: &mut Connection, key: &str) -> Result<(), String>;

    /// Runs once when the test finishes.
    fn finish(&self) {}
}

/// A [`LoadTest`] issuing Set then Get per request, as selected by the
/// scenario, and counting both in [`GetSetMetrics`].
pub struct SetGetTest<O> {
    name: String,
    ops: Arc<O>,
    metrics: Arc<GetSetMetrics>,
}

impl<O: SetGetOps> SetGetTest<O> {
    #[must_use]
    pub fn new(name: &str, ops: O) -> Self {
        Self {
            name: name.to_owned(),
            ops: Arc::new(ops),
            metrics: Arc::new(GetSetMetrics::new()),
        }
    }

    #[must_use]
    pub fn counters(&self) -> &GetSetMetrics {
        &self.metrics
    }
}

impl<O: SetGetOps> LoadTest for SetGetTest<O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn override_settings(&self, settings: &mut TestSettings) {
        settings.request_mode = RequestMode::ByMessage;
    }

    fn prep_for_test(&self, _settings: &TestSettings) -> Result<(), RequestError> {
        self.metrics.reset();
        Ok(())
    }

    fn new_request(&self, settings: &TestSettings) -> Box<dyn Request> {
        Box::new(SetGetRequest {
            ops: Arc::clone(&self.ops),
            metrics: Arc::clone(&self.metrics),
            key: format!("{:016x}", thread_rng().r#gen::<u64>()),
            target: settings.connection.clone(),
            can_set: settings.scenario_has("set"),
            can_get: settings.scenario_has("get"),
            message_min: settings.message_min,
            message_max: settings.message_max,
            step: Mutex::new(STEP_CONNECT),
        })
    }

    fn metrics(&self) -> Option<Vec<(String, f64)>> {
        Some(self.metrics.sample().to_pairs())
    }

    fn finish_test(&self) {
        self.ops.finish();
    }
}

struct SetGetRequest<O> {
    ops: Arc<O>,
    metrics: Arc<GetSetMetrics>,
    key: String,
    target: String,
    can_set: bool,
    can_get: bool,
    message_min: u64,
    message_max: u64,
    step: Mutex<&'static str>,
}

impl<O: SetGetOps> SetGetRequest<O> {
    fn enter(&self, step: &'static str) {
        *lock(&self.step) = step;
    }

    fn failed(&self, step: &'static str, message: String) -> RequestError {
        RequestError::Operation {
            step,
            key: self.key.clone(),
            message,
        }
    }
}

impl<O: SetGetOps> Request for SetGetRequest<O> {
    fn do_request(&self, connection: &mut Connection) -> Result<(), RequestError> {
        self.enter(STEP_CONNECT);
        self.ops
            .connect(connection, &self.target)
            .map_err(|message| RequestError::Connection {
                connection: self.target.clone(),
                message,
            })?;
        if self.can_set {
            self.enter(STEP_SET);
            let value = random_payload(self.message_min, self.message_max);
            self.metrics
                .timed(Operation::Set, || self.ops.set(connection, &self.key, &value))
                .map_err(|message| self.failed(STEP_SET, message))?;
        }
        if self.can_get {
            self.enter(STEP_GET);
            self.metrics
                .timed(Operation::Get, || self.ops.get(connection, &self.key))
                .map_err(|message| self.failed(STEP_GET, message))?;
        }
        Ok(())
    }

    fn exception_thrown(&self, message: &str) {
        let step = *lock(&self.step);
        warn!(
            "Request failed: {} [step: {}, key: {}]",
            message, step, self.key
        );
    }
}
