use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::error::RequestError;
use crate::error::{AppError, AppResult};
use crate::metrics::Operation;
use crate::settings::{RequestMode, TestSettings};

#[derive(Default)]
struct FlakyOps {
    sets: AtomicUsize,
}

impl SetGetOps for FlakyOps {
    fn set(&self, _connection: &mut Connection, _key: &str, value: &str) -> Result<(), String> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if value.len() > 4 {
            return Err("value too large".to_owned());
        }
        Ok(())
    }

    fn get(&self, _connection: &mut Connection, _key: &str) -> Result<(), String> {
        Ok(())
    }
}

#[test]
fn registry_rejects_duplicates_and_resolves_fresh_tests() -> AppResult<()> {
    let registry = RequestRegistry::with_builtins();
    if registry.names() != vec![BASIC_SET_GET.to_owned(), NULL_SET_GET.to_owned()] {
        return Err(AppError::validation(format!("names {:?}", registry.names())));
    }
    let factory: LoadTestFactory =
        Arc::new(|| -> Arc<dyn LoadTest> { Arc::new(SetGetTest::new(NULL_SET_GET, NullOps)) });
    if registry.register(NULL_SET_GET, factory).is_ok() {
        return Err(AppError::validation("duplicate registration accepted"));
    }
    let first = registry
        .resolve(BASIC_SET_GET)
        .ok_or_else(|| AppError::validation("builtin missing"))?;
    let second = registry
        .resolve(BASIC_SET_GET)
        .ok_or_else(|| AppError::validation("builtin missing"))?;
    if Arc::ptr_eq(&first, &second) {
        return Err(AppError::validation("factory reused an instance"));
    }
    if registry.resolve("NoSuchTest").is_some() || registry.contains("basicsetget") {
        return Err(AppError::validation("unknown name resolved"));
    }
    Ok(())
}

#[test]
fn set_get_follows_scenario_and_counts_both_operations() -> AppResult<()> {
    let test = SetGetTest::new("memory", MemoryOps::default());
    let mut settings = TestSettings {
        request_mode: RequestMode::ByUser,
        ..TestSettings::default()
    };
    test.override_settings(&mut settings);
    if settings.request_mode != RequestMode::ByMessage {
        return Err(AppError::validation("set/get tests run by message"));
    }
    test.prep_for_test(&settings)?;
    let mut connection: Connection = None;
    for _ in 0..3 {
        test.new_request(&settings).do_request(&mut connection)?;
    }
    if test.counters().counter(Operation::Set).iterations() != 3
        || test.counters().counter(Operation::Get).iterations() != 3
    {
        return Err(AppError::validation("operations not counted"));
    }
    if connection.is_none() {
        return Err(AppError::validation("connection state was not kept"));
    }

    settings.scenario = "Get".to_owned();
    test.new_request(&settings).do_request(&mut connection)?;
    if test.counters().counter(Operation::Set).iterations() != 3 {
        return Err(AppError::validation("get-only scenario issued a set"));
    }
    let metrics = test
        .metrics()
        .ok_or_else(|| AppError::validation("set/get test keeps metrics"))?;
    if metrics.len() != 10 {
        return Err(AppError::validation(format!("metric count {}", metrics.len())));
    }
    Ok(())
}

#[test]
fn failures_carry_step_and_key() -> AppResult<()> {
    let test = SetGetTest::new("flaky", FlakyOps::default());
    let settings = TestSettings {
        message_min: 8,
        message_max: 8,
        ..TestSettings::default()
    };
    let mut connection: Connection = None;
    match test.new_request(&settings).do_request(&mut connection) {
        Err(RequestError::Operation { step: "Set", key, .. }) if key.len() == 16 => {}
        other => return Err(AppError::validation(format!("unexpected {:?}", other))),
    }
    if test.counters().counter(Operation::Set).iterations() != 0
        || test.counters().counter(Operation::Get).iterations() != 0
    {
        return Err(AppError::validation("failed request was counted"));
    }
    Ok(())
}

#[test]
fn memory_test_rejects_foreign_targets() -> AppResult<()> {
    let test = SetGetTest::new("memory", MemoryOps::default());
    let settings = TestSettings {
        connection: "tcp://db:5432".to_owned(),
        ..TestSettings::default()
    };
    let mut connection: Connection = None;
    match test.new_request(&settings).do_request(&mut connection) {
        Err(RequestError::Connection { .. }) => Ok(()),
        other => Err(AppError::validation(format!("unexpected {:?}", other))),
    }
}

#[test]
fn random_payload_respects_bounds() -> AppResult<()> {
    for _ in 0..20 {
        let payload = random_payload(3, 6);
        if !(3..=6).contains(&payload.len()) || !payload.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(AppError::validation(format!("payload {:?}", payload)));
        }
    }
    if random_payload(5, 2).len() != 5 {
        return Err(AppError::validation("inverted range not clamped to min"));
    }
    Ok(())
}
