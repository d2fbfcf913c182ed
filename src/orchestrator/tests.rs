use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::error::{AppError, AppResult};
use crate::feeder::{RunOutcome, RunnerOptions};
use crate::protocol::{FinishCommand, StartCommand, UpdateCommand};
use crate::request::{NULL_SET_GET, RequestRegistry};
use crate::router::CommandRouter;
use crate::settings::{SettingsPatch, TestSettings, UNUSED};

const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 6);

fn options() -> RunnerOptions {
    RunnerOptions {
        settle: Duration::ZERO,
        metrics_interval: Duration::from_millis(20),
        pending_capacity: None,
        stop_timeout: Duration::from_secs(15),
    }
}

/// Paced so a run stays alive until it is told to stop.
fn slow_settings() -> TestSettings {
    TestSettings {
        total_requests: 1_000_000,
        workers: 2,
        request_rate: 10,
        ..TestSettings::default()
    }
}

fn build(base: TestSettings) -> (Arc<Orchestrator>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = Arc::new(Orchestrator::new(
        LOCAL,
        Arc::new(RequestRegistry::with_builtins()),
        base,
        options(),
        sink.clone(),
    ));
    (orchestrator, sink)
}

fn start(class: &str, patch: SettingsPatch) -> StartCommand {
    StartCommand {
        time: "t".to_owned(),
        target_ip: UNUSED.to_owned(),
        class: class.to_owned(),
        settings: patch,
    }
}

fn poll_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn unknown_class_and_foreign_target_launch_nothing() -> AppResult<()> {
    let (orchestrator, sink) = build(slow_settings());
    if orchestrator.start(&start("NoSuchTest", SettingsPatch::default())) {
        return Err(AppError::validation("unknown class launched"));
    }
    let foreign = start(NULL_SET_GET, SettingsPatch::default());
    let foreign = foreign.targeted(Some(Ipv4Addr::new(10, 0, 0, 5)));
    if orchestrator.start(&foreign) {
        return Err(AppError::validation("foreign target launched"));
    }
    if !orchestrator.running().is_empty() || !sink.heartbeats().is_empty() {
        return Err(AppError::validation("state changed for an ignored Start"));
    }

    let (own, _sink) = build(slow_settings());
    let own_target = start(NULL_SET_GET, SettingsPatch::default()).targeted(Some(LOCAL));
    if !own.start(&own_target) {
        return Err(AppError::validation("own target ignored"));
    }
    own.stop_all();
    Ok(())
}

#[test]
fn restart_keeps_one_run_and_finish_removes_it() -> AppResult<()> {
    let (orchestrator, sink) = build(slow_settings());
    if !orchestrator.start(&start(NULL_SET_GET, SettingsPatch::default())) {
        return Err(AppError::validation("first start failed"));
    }
    let first = orchestrator
        .run(NULL_SET_GET)
        .ok_or_else(|| AppError::validation("first run missing"))?;
    if !orchestrator.start(&start(NULL_SET_GET, SettingsPatch::default())) {
        return Err(AppError::validation("second start failed"));
    }
    if first.outcome() != Some(RunOutcome::Stopped) {
        return Err(AppError::validation("replaced run still going"));
    }
    if orchestrator.running() != vec![NULL_SET_GET.to_owned()] {
        return Err(AppError::validation(format!("running {:?}", orchestrator.running())));
    }
    if !orchestrator.finish(&FinishCommand::new(NULL_SET_GET)) {
        return Err(AppError::validation("finish found nothing"));
    }
    if orchestrator.run(NULL_SET_GET).is_some() || orchestrator.finish(&FinishCommand::new(NULL_SET_GET)) {
        return Err(AppError::validation("finished run still registered"));
    }
    let heartbeats = sink.heartbeats();
    let idles = heartbeats.iter().filter(|payload| payload.as_str() == "Hidle").count();
    if idles != 1 || heartbeats.last().map(String::as_str) != Some("Hidle") {
        return Err(AppError::validation(format!("heartbeats {:?}", heartbeats)));
    }
    Ok(())
}

#[test]
fn update_reaches_the_running_test() -> AppResult<()> {
    let (orchestrator, _sink) = build(slow_settings());
    let patch = SettingsPatch {
        request_rate: Some(40),
        message_max: Some(300),
        ..SettingsPatch::default()
    };
    if orchestrator.update(&UpdateCommand::new(NULL_SET_GET, &patch)) {
        return Err(AppError::validation("update without a run succeeded"));
    }
    if !orchestrator.start(&start(NULL_SET_GET, SettingsPatch::default())) {
        return Err(AppError::validation("start failed"));
    }
    if !orchestrator.update(&UpdateCommand::new(NULL_SET_GET, &patch)) {
        return Err(AppError::validation("update not applied"));
    }
    let settings = orchestrator
        .run(NULL_SET_GET)
        .map(|run| run.settings())
        .ok_or_else(|| AppError::validation("run missing"))?;
    orchestrator.stop_all();
    if settings.request_rate != 40 || settings.message_max != 300 || settings.workers != 2 {
        return Err(AppError::validation(format!("settings {:?}", settings)));
    }
    Ok(())
}

#[test]
fn completed_run_announces_prep_run_stop_idle() -> AppResult<()> {
    let (orchestrator, sink) = build(TestSettings::default());
    let patch = SettingsPatch {
        total_requests: Some(5),
        workers: Some(1),
        ..SettingsPatch::default()
    };
    if !orchestrator.start(&start(NULL_SET_GET, patch)) {
        return Err(AppError::validation("start failed"));
    }
    let finished = poll_until(Duration::from_secs(10), || {
        orchestrator.run(NULL_SET_GET).is_some_and(|run| run.outcome().is_some())
            && sink.heartbeats().len() == 4
    });
    if !finished {
        return Err(AppError::validation(format!("heartbeats {:?}", sink.heartbeats())));
    }
    if sink.heartbeats() != ["Hprep", "Hrun", "Hstop", "Hidle"] {
        return Err(AppError::validation(format!("heartbeats {:?}", sink.heartbeats())));
    }
    let last = sink.broadcasts().last().cloned().unwrap_or_default();
    if !last.starts_with("M<Test") || !last.contains("finished=\"True\"") {
        return Err(AppError::validation(format!("final broadcast {}", last)));
    }
    if !orchestrator.running().is_empty() {
        return Err(AppError::validation("completed run still listed as running"));
    }
    Ok(())
}

#[test]
fn router_dispatches_commands_and_drops_garbage() -> AppResult<()> {
    let (orchestrator, _sink) = build(slow_settings());
    let router = CommandRouter::new();
    orchestrator.register_with(&router);
    let sender = Ipv4Addr::new(10, 0, 0, 1);

    if !router.dispatch(sender, "S<Test><Class>NullSetGet") {
        return Err(AppError::validation("start handler missing"));
    }
    if !orchestrator.running().is_empty() {
        return Err(AppError::validation("malformed start launched"));
    }
    let payload = start(NULL_SET_GET, SettingsPatch::default()).to_payload();
    let _dispatched = router.dispatch(sender, &payload);
    if orchestrator.running() != vec![NULL_SET_GET.to_owned()] {
        return Err(AppError::validation("start frame ignored"));
    }
    let _dispatched = router.dispatch(sender, &FinishCommand::new(NULL_SET_GET).to_payload());
    if orchestrator.run(NULL_SET_GET).is_some() {
        return Err(AppError::validation("finish frame ignored"));
    }
    Ok(())
}
