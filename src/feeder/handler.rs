use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::pool::{WorkHandler, WorkOutcome};
use crate::request::Connection;
use crate::settings::LiveSettings;
use crate::stop::StopSignal;
use crate::sync::lock;

use super::item::LoadItem;

/// Connection state per worker thread, kept across the items it runs.
#[derive(Clone, Default)]
pub(crate) struct Connections {
    slots: Arc<Mutex<HashMap<ThreadId, Connection>>>,
}

impl Connections {
    fn take(&self, thread: ThreadId) -> Connection {
        lock(&self.slots).remove(&thread).flatten()
    }

    fn keep(&self, thread: ThreadId, connection: Connection) {
        lock(&self.slots).insert(thread, connection);
    }

    /// Drops every worker's state and returns how many were open.
    pub(crate) fn release(&self) -> usize {
        let mut slots = lock(&self.slots);
        let open = slots.values().filter(|state| state.is_some()).count();
        slots.clear();
        open
    }
}

/// Drives each [`LoadItem`] on a pool worker: hands it the worker's
/// connection, reports failures and enforces the request rate.
pub(crate) struct RunHandler {
    connections: Connections,
    settings: Mutex<LiveSettings>,
    stop: StopSignal,
}

/// How long an item must hold its worker so that `workers` workers together
/// issue at most `request_rate` requests per second.
pub(crate) fn pacing_interval(workers: usize, request_rate: u64) -> Option<Duration> {
    if request_rate == 0 {
        return None;
    }
    let workers = u64::try_from(workers).unwrap_or(u64::MAX);
    let micros = workers
        .saturating_mul(1_000_000)
        .checked_div(request_rate)?;
    Some(Duration::from_micros(micros))
}

impl RunHandler {
    pub(crate) fn new(connections: Connections, settings: LiveSettings, stop: StopSignal) -> Self {
        Self {
            connections,
            settings: Mutex::new(settings),
            stop,
        }
    }

    fn pacing(&self) -> Option<Duration> {
        let mut live = lock(&self.settings);
        let settings = live.current();
        pacing_interval(settings.workers, settings.request_rate)
    }
}

impl WorkHandler<LoadItem> for RunHandler {
    fn started(&self, item: &LoadItem) {
        item.mark_started(Instant::now());
    }

    fn run(&self, item: &LoadItem) -> Result<(), String> {
        let thread = thread::current().id();
        let mut connection = self.connections.take(thread);
        let result = item.request().do_request(&mut connection);
        self.connections.keep(thread, connection);
        result.map_err(|err| err.to_string())
    }

    fn completed(&self, item: &LoadItem, outcome: &WorkOutcome) {
        match outcome {
            WorkOutcome::Completed => {}
            WorkOutcome::Failed { message } => item.request().exception_thrown(message),
            // Reported from the watchdog thread, which must not be held.
            WorkOutcome::TimedOut => {
                item.request().exception_thrown("request timed out");
                item.mark_done();
                return;
            }
        }
        if let (Some(interval), Some(started)) = (self.pacing(), item.work_started()) {
            let held = started.elapsed();
            if held < interval {
                drop(self.stop.sleep(interval.saturating_sub(held)));
            }
        }
        item.mark_done();
    }
}
