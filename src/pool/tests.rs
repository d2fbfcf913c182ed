use super::*;
use crate::error::{AppError, AppResult};
use crossbeam_channel::Receiver;
use std::sync::Mutex;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

struct Job {
    id: usize,
    priority: Option<i64>,
    timeout: Option<Duration>,
    hang: Option<Receiver<()>>,
}

impl Job {
    fn plain(id: usize) -> Self {
        Self {
            id,
            priority: None,
            timeout: None,
            hang: None,
        }
    }

    fn ranked(id: usize, priority: i64) -> Self {
        Self {
            priority: Some(priority),
            ..Self::plain(id)
        }
    }
}

impl WorkItem for Job {
    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn same_item(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

struct RankedJob(Job);

impl WorkItem for RankedJob {
    const ORDERING: QueueOrdering = QueueOrdering::Priority;

    fn priority(&self) -> Option<i64> {
        self.0.priority
    }
}

struct StrictJob(Job);

impl WorkItem for StrictJob {
    const ORDERING: QueueOrdering = QueueOrdering::StrictPriority;

    fn priority(&self) -> Option<i64> {
        self.0.priority
    }
}

trait AsJob {
    fn job(&self) -> &Job;
}

impl AsJob for Job {
    fn job(&self) -> &Job {
        self
    }
}

impl AsJob for RankedJob {
    fn job(&self) -> &Job {
        &self.0
    }
}

impl AsJob for StrictJob {
    fn job(&self) -> &Job {
        &self.0
    }
}

#[derive(Default)]
struct Journal {
    ran: Mutex<Vec<usize>>,
    finished: Mutex<Vec<(usize, WorkOutcome)>>,
}

#[derive(Clone, Default)]
struct Recorder {
    journal: Arc<Journal>,
    fail_ids: Vec<usize>,
    panic_ids: Vec<usize>,
}

impl Recorder {
    fn ran(&self) -> Vec<usize> {
        lock(&self.journal.ran).clone()
    }

    fn finished(&self) -> Vec<(usize, WorkOutcome)> {
        lock(&self.journal.finished).clone()
    }
}

impl<T: WorkItem + AsJob> WorkHandler<T> for Recorder {
    fn run(&self, item: &T) -> Result<(), String> {
        let job = item.job();
        lock(&self.journal.ran).push(job.id);
        if let Some(gate) = job.hang.as_ref() {
            drop(gate.recv());
        }
        if self.fail_ids.contains(&job.id) {
            return Err(format!("job {} failed", job.id));
        }
        if self.panic_ids.contains(&job.id) {
            panic!("job {} exploded", job.id);
        }
        Ok(())
    }

    fn completed(&self, item: &T, outcome: &WorkOutcome) {
        lock(&self.journal.finished).push((item.job().id, outcome.clone()));
    }
}

fn poll_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn config(max_threads: usize, capacity: Option<usize>) -> PoolConfig {
    PoolConfig {
        pending_capacity: capacity,
        join_timeout: Duration::from_secs(2),
        ..PoolConfig::named("test", max_threads)
    }
}

#[test]
fn rejects_out_of_range_thread_counts() -> AppResult<()> {
    for threads in [0, MAX_THREADS.saturating_add(1)] {
        match WorkerPool::<Job>::new(config(threads, None), Recorder::default()) {
            Err(PoolError::InvalidThreadCount { value, .. }) if value == threads => {}
            Err(err) => return Err(AppError::pool(format!("unexpected error: {}", err))),
            Ok(_) => return Err(AppError::pool(format!("{} threads accepted", threads))),
        }
    }
    Ok(())
}

#[test]
fn enqueue_fails_exactly_at_capacity() -> AppResult<()> {
    let cap = 4;
    let pool = WorkerPool::<Job>::with_preload(config(2, Some(cap)), Recorder::default(), Vec::new())?;
    for id in 0..cap {
        if !pool.enqueue(Job::plain(id)) {
            return Err(AppError::pool("enqueue under capacity rejected"));
        }
    }
    if pool.enqueue(Job::plain(cap)) {
        return Err(AppError::pool("enqueue over capacity admitted"));
    }
    if pool.pending_work_items() != cap || pool.available_capacity() != 0 {
        return Err(AppError::pool("pending count drifted"));
    }
    if pool.peak_usage() != cap || pool.total_capacity() != Some(cap) {
        return Err(AppError::pool("capacity bookkeeping wrong"));
    }
    Ok(())
}

#[test]
fn five_items_complete_exactly_once() -> AppResult<()> {
    let recorder = Recorder::default();
    let pool = WorkerPool::new(config(2, Some(10)), recorder.clone())?;
    for id in 0..5 {
        if !pool.enqueue(Job::plain(id)) {
            return Err(AppError::pool("enqueue rejected"));
        }
    }
    if !pool.wait_idle(SETTLE_TIMEOUT) {
        return Err(AppError::pool("pool did not drain"));
    }

    let mut finished: Vec<usize> = recorder.finished().into_iter().map(|(id, _)| id).collect();
    finished.sort_unstable();
    if finished != vec![0, 1, 2, 3, 4] {
        return Err(AppError::pool(format!("completions {:?}", finished)));
    }
    let mut ran = recorder.ran();
    ran.sort_unstable();
    if ran != vec![0, 1, 2, 3, 4] || pool.pending_work_items() != 0 {
        return Err(AppError::pool(format!("dispatches {:?}", ran)));
    }
    Ok(())
}

#[test]
fn priority_items_dispatch_in_ascending_order() -> AppResult<()> {
    let recorder = Recorder::default();
    let pool = WorkerPool::with_preload(config(1, None), recorder.clone(), Vec::new())?;
    for (id, priority) in [(0, 3), (1, 1), (2, 2)] {
        pool.enqueue(RankedJob(Job::ranked(id, priority)));
    }
    pool.open();
    if !pool.wait_idle(SETTLE_TIMEOUT) {
        return Err(AppError::pool("pool did not drain"));
    }
    let ran = recorder.ran();
    if ran != vec![1, 2, 0] {
        return Err(AppError::pool(format!("dispatch order {:?}", ran)));
    }
    Ok(())
}

#[test]
fn strict_mode_drains_lowest_level_first() -> AppResult<()> {
    let recorder = Recorder::default();
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    let mut first = Job::ranked(0, 1);
    first.hang = Some(gate);

    let pool = WorkerPool::new(config(1, None), recorder.clone())?;
    pool.enqueue(StrictJob(first));
    if !poll_until(SETTLE_TIMEOUT, || recorder.ran() == vec![0]) {
        return Err(AppError::pool("first item never started"));
    }

    pool.enqueue(StrictJob(Job::ranked(1, 4)));
    pool.enqueue(StrictJob(Job::ranked(2, 2)));
    if pool.current_threshold() != 1 {
        return Err(AppError::pool(format!(
            "threshold {} while level 1 runs",
            pool.current_threshold()
        )));
    }
    drop(release);

    if !pool.wait_idle(SETTLE_TIMEOUT) {
        return Err(AppError::pool("pool did not drain"));
    }
    let ran = recorder.ran();
    if ran != vec![0, 2, 1] {
        return Err(AppError::pool(format!("strict order {:?}", ran)));
    }
    Ok(())
}

struct RaisingHint(Recorder);

impl WorkHandler<StrictJob> for RaisingHint {
    fn run(&self, item: &StrictJob) -> Result<(), String> {
        WorkHandler::<StrictJob>::run(&self.0, item)
    }

    fn completed(&self, item: &StrictJob, outcome: &WorkOutcome) {
        WorkHandler::<StrictJob>::completed(&self.0, item, outcome);
    }

    fn threshold_hint(&self, lowest_pending: i64) -> i64 {
        lowest_pending.saturating_add(10)
    }
}

#[test]
fn threshold_hint_cannot_admit_above_lowest_level() -> AppResult<()> {
    let recorder = Recorder::default();
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    let mut first = Job::ranked(0, 1);
    first.hang = Some(gate);

    let pool = WorkerPool::with_preload(
        config(2, None),
        RaisingHint(recorder.clone()),
        [StrictJob(first), StrictJob(Job::ranked(1, 7))],
    )?;
    pool.open();
    if !poll_until(SETTLE_TIMEOUT, || recorder.ran().contains(&0)) {
        return Err(AppError::pool("level 1 item never started"));
    }
    std::thread::sleep(Duration::from_millis(300));
    let threshold = pool.current_threshold();
    let ran = recorder.ran();
    drop(release);
    if threshold > 1 || ran != vec![0] {
        return Err(AppError::pool(format!(
            "threshold {} ran {:?} while level 1 runs",
            threshold, ran
        )));
    }

    if !pool.wait_idle(SETTLE_TIMEOUT) {
        return Err(AppError::pool("pool did not drain"));
    }
    if recorder.ran() != vec![0, 1] {
        return Err(AppError::pool(format!("strict order {:?}", recorder.ran())));
    }
    Ok(())
}

#[test]
fn hung_item_is_abandoned_and_slot_replaced() -> AppResult<()> {
    let recorder = Recorder::default();
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    let pool = WorkerPool::new(config(1, None), recorder.clone())?;
    let mut stuck = Job::plain(0);
    stuck.timeout = Some(Duration::from_millis(50));
    stuck.hang = Some(gate);
    pool.enqueue(stuck);

    if !poll_until(SETTLE_TIMEOUT, || {
        recorder.finished().contains(&(0, WorkOutcome::TimedOut))
    }) {
        return Err(AppError::pool("timeout never reported"));
    }
    if pool.total_threads() != 1 {
        return Err(AppError::pool("slot count changed"));
    }

    pool.enqueue(Job::plain(1));
    if !poll_until(SETTLE_TIMEOUT, || {
        recorder.finished().contains(&(1, WorkOutcome::Completed))
    }) {
        return Err(AppError::pool("replacement worker did not serve new work"));
    }

    drop(release);
    std::thread::sleep(Duration::from_millis(50));
    let reports_for_stuck = recorder
        .finished()
        .iter()
        .filter(|(id, _)| *id == 0)
        .count();
    if reports_for_stuck != 1 {
        return Err(AppError::pool(format!(
            "stuck item reported {} times",
            reports_for_stuck
        )));
    }
    Ok(())
}

#[test]
fn failures_and_panics_are_reported_and_pool_continues() -> AppResult<()> {
    let recorder = Recorder {
        fail_ids: vec![1],
        panic_ids: vec![2],
        ..Recorder::default()
    };
    let pool = WorkerPool::new(config(1, None), recorder.clone())?;
    for id in 0..4 {
        pool.enqueue(Job::plain(id));
    }
    if !pool.wait_idle(SETTLE_TIMEOUT) {
        return Err(AppError::pool("pool did not drain"));
    }

    let finished = recorder.finished();
    let outcome_of = |wanted: usize| {
        finished
            .iter()
            .find(|(id, _)| *id == wanted)
            .map(|(_, outcome)| outcome.clone())
    };
    if outcome_of(0) != Some(WorkOutcome::Completed) || outcome_of(3) != Some(WorkOutcome::Completed)
    {
        return Err(AppError::pool("healthy items not completed"));
    }
    if outcome_of(1)
        != Some(WorkOutcome::Failed {
            message: "job 1 failed".to_owned(),
        })
    {
        return Err(AppError::pool("error not reported"));
    }
    match outcome_of(2) {
        Some(WorkOutcome::Failed { message }) if message.contains("exploded") => Ok(()),
        other => Err(AppError::pool(format!("panic reported as {:?}", other))),
    }
}

#[test]
fn enqueue_replace_coalesces_same_identity() -> AppResult<()> {
    let pool = WorkerPool::<Job>::with_preload(config(1, None), Recorder::default(), Vec::new())?;
    let mut original = Job::plain(7);
    original.timeout = Some(Duration::from_secs(1));
    pool.enqueue(original);
    pool.enqueue(Job::plain(8));
    if !pool.enqueue_replace(Job::plain(7)) {
        return Err(AppError::pool("replace rejected"));
    }
    let pending: Vec<(usize, Option<Duration>)> = pool
        .pending_items()
        .iter()
        .map(|job| (job.id, job.timeout))
        .collect();
    if pending != vec![(8, None), (7, None)] {
        return Err(AppError::pool(format!("pending {:?}", pending)));
    }
    if !pool.remove(&Job::plain(8)) || pool.purge() != 1 || pool.peek().is_some() {
        return Err(AppError::pool("remove/purge failed"));
    }
    Ok(())
}

#[test]
fn close_is_bounded_with_a_stuck_worker() -> AppResult<()> {
    let (_release, gate) = crossbeam_channel::bounded::<()>(0);
    let recorder = Recorder::default();
    let pool = WorkerPool::new(
        PoolConfig {
            join_timeout: Duration::from_millis(100),
            ..config(2, None)
        },
        recorder.clone(),
    )?;
    let mut stuck = Job::plain(0);
    stuck.hang = Some(gate);
    pool.enqueue(stuck);
    pool.enqueue(Job::plain(1));
    if !poll_until(SETTLE_TIMEOUT, || pool.active_threads() == 1 && recorder.ran().len() == 2) {
        return Err(AppError::pool("items did not start"));
    }

    let started = Instant::now();
    pool.close();
    if started.elapsed() > Duration::from_secs(2) {
        return Err(AppError::pool("close was not bounded"));
    }
    if !pool.is_closed() || pool.enqueue(Job::plain(2)) {
        return Err(AppError::pool("closed pool still admits work"));
    }
    Ok(())
}

#[test]
fn thread_introspection_tracks_phases() -> AppResult<()> {
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    let recorder = Recorder::default();
    let pool = WorkerPool::new(config(3, None), recorder.clone())?;
    if !poll_until(SETTLE_TIMEOUT, || pool.blocked_threads() == 3) {
        return Err(AppError::pool("workers never parked"));
    }
    let mut held = Job::plain(0);
    held.hang = Some(gate);
    pool.enqueue(held);
    if !poll_until(SETTLE_TIMEOUT, || {
        pool.active_threads() == 1 && pool.blocked_threads() == 2
    }) {
        return Err(AppError::pool(format!("phases {:?}", pool.worker_states())));
    }
    drop(release);
    if !pool.wait_idle(SETTLE_TIMEOUT) || pool.total_threads() != 3 {
        return Err(AppError::pool("pool did not settle"));
    }
    Ok(())
}
