use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::sync::lock;

use super::registry::RequestRegistry;
use super::set_get::{SetGetOps, SetGetTest};
use super::{Connection, LoadTest, LoadTestFactory};

/// Does nothing; measures the runner itself.
#[derive(Debug, Default)]
pub struct NullOps;

impl SetGetOps for NullOps {
    fn set(&self, _connection: &mut Connection, _key: &str, _value: &str) -> Result<(), String> {
        Ok(())
    }

    fn get(&self, _connection: &mut Connection, _key: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Per-worker session kept in the connection slot.
#[derive(Debug, Default)]
struct MemorySession {
    operations: u64,
}

/// An in-process key/value store shared by every worker of one run.
#[derive(Debug, Default)]
pub struct MemoryOps {
    store: Mutex<HashMap<String, String>>,
}

impl MemoryOps {
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.store).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn touch(connection: &mut Connection) -> Result<(), String> {
        let session = connection
            .as_mut()
            .and_then(|state| state.downcast_mut::<MemorySession>())
            .ok_or_else(|| "no memory session on this worker".to_owned())?;
        session.operations = session.operations.saturating_add(1);
        Ok(())
    }
}

impl SetGetOps for MemoryOps {
    fn connect(&self, connection: &mut Connection, target: &str) -> Result<(), String> {
        let target = target.trim();
        if !(target.is_empty() || target.eq_ignore_ascii_case("memory")) {
            return Err(format!("unsupported target '{}'", target));
        }
        let connected = connection
            .as_ref()
            .is_some_and(|state| state.is::<MemorySession>());
        if !connected {
            *connection = Some(Box::new(MemorySession::default()));
        }
        Ok(())
    }

    fn set(&self, connection: &mut Connection, key: &str, value: &str) -> Result<(), String> {
        Self::touch(connection)?;
        lock(&self.store).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    // A miss is a normal cache outcome, not a failure.
    fn get(&self, connection: &mut Connection, key: &str) -> Result<(), String> {
        Self::touch(connection)?;
        let _hit = lock(&self.store).contains_key(key);
        Ok(())
    }

    fn finish(&self) {
        let mut store = lock(&self.store);
        debug!("Memory store held {} keys", store.len());
        store.clear();
    }
}

pub const BASIC_SET_GET: &str = "BasicSetGet";
pub const NULL_SET_GET: &str = "NullSetGet";

/// Adds the builtin test types to `registry`.
pub fn register_builtins(registry: &RequestRegistry) {
    let builtins: [(&str, LoadTestFactory); 2] = [
        (
            BASIC_SET_GET,
            Arc::new(|| -> Arc<dyn LoadTest> {
                Arc::new(SetGetTest::new(BASIC_SET_GET, MemoryOps::default()))
            }),
        ),
        (
            NULL_SET_GET,
            Arc::new(|| -> Arc<dyn LoadTest> { Arc::new(SetGetTest::new(NULL_SET_GET, NullOps)) }),
        ),
    ];
    for (name, factory) in builtins {
        if let Err(err) = registry.register(name, factory) {
            debug!("Skipping builtin: {}", err);
        }
    }
}
