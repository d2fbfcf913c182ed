use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, ValidationError};
use crate::pool::{PoolConfig, WorkerPool};
use crate::protocol::AgentStatus;
use crate::request::LoadTest;
use crate::settings::{LiveSettings, RequestMode, SettingsPatch, TestSettings};
use crate::stop::{StopHandle, StopSignal, stop_channel};
use crate::sync::{join_with_timeout, lock};

use super::handler::{Connections, RunHandler};
use super::strategy::{Feed, Fed, Meter};
use super::{RunReporter, RunnerOptions};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    /// The test could not be prepared or its pool could not start.
    Failed,
}

/// One test executing on its own feeder thread.
pub struct TestRun {
    class: String,
    description: String,
    settings: Mutex<LiveSettings>,
    stop: Mutex<StopHandle>,
    announce: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    outcome: Arc<Mutex<Option<RunOutcome>>>,
    stop_timeout: Duration,
}

struct RunContext {
    test: Arc<dyn LoadTest>,
    settings: LiveSettings,
    options: RunnerOptions,
    reporter: Arc<dyn RunReporter>,
    stop: StopSignal,
    description: String,
}

impl TestRun {
    /// Applies the test's overrides to `settings`, validates them and
    /// starts the feeder thread.
    ///
    /// # Errors
    ///
    /// Returns an error when the final settings are invalid or the thread
    /// cannot be spawned.
    pub fn spawn(
        test: Arc<dyn LoadTest>,
        mut settings: TestSettings,
        options: RunnerOptions,
        reporter: Arc<dyn RunReporter>,
        description: &str,
    ) -> AppResult<Self> {
        test.override_settings(&mut settings);
        settings.validate()?;
        let class = test.name().to_owned();
        let live = LiveSettings::new(settings);
        let (stop, signal) = stop_channel();
        let announce = Arc::new(AtomicBool::new(true));
        let outcome = Arc::new(Mutex::new(None));
        let stop_timeout = options.stop_timeout;
        let context = RunContext {
            test,
            settings: live.clone(),
            options,
            reporter,
            stop: signal,
            description: description.to_owned(),
        };
        let thread = {
            let announce = Arc::clone(&announce);
            let outcome = Arc::clone(&outcome);
            thread::Builder::new()
                .name(format!("feeder-{}", class))
                .spawn(move || {
                    let reporter = Arc::clone(&context.reporter);
                    let result = execute(context);
                    *lock(&outcome) = Some(result);
                    if announce.load(Ordering::Acquire) {
                        reporter.status(AgentStatus::Idle);
                    }
                })
                .map_err(AppError::from)?
        };
        Ok(Self {
            class,
            description: description.to_owned(),
            settings: Mutex::new(live),
            stop: Mutex::new(stop),
            announce,
            thread: Mutex::new(Some(thread)),
            outcome,
            stop_timeout,
        })
    }

    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Latest live settings.
    #[must_use]
    pub fn settings(&self) -> TestSettings {
        lock(&self.settings).current().clone()
    }

    /// Publishes `patch` to the running test; later work items see it.
    ///
    /// # Errors
    ///
    /// Returns the validation error when the patched settings are invalid.
    /// The running test keeps its previous settings.
    pub fn update(&self, patch: &SettingsPatch) -> Result<TestSettings, ValidationError> {
        match lock(&self.settings).apply(patch) {
            Ok(updated) => {
                info!("Test {} updated: {:?}", self.description, patch);
                Ok(updated)
            }
            Err(err) => {
                warn!("Dropping Update for {}: {}", self.description, err);
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Option<RunOutcome> {
        *lock(&self.outcome)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    /// Stops the run and waits, up to the stop timeout, for it to wind down.
    pub fn stop(&self) {
        lock(&self.stop).trigger();
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle {
            let detached = join_with_timeout(vec![handle], self.stop_timeout);
            if detached > 0 {
                warn!("Test {} did not stop within {:?}", self.description, self.stop_timeout);
            }
        }
    }

    /// Stops the run without the final idle announcement, for a run that
    /// is being replaced.
    pub fn supersede(&self) {
        self.announce.store(false, Ordering::Release);
        self.stop();
    }

    /// Blocks until the feeder thread exits.
    #[must_use]
    pub fn join(&self) -> Option<RunOutcome> {
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("Feeder thread for {} panicked", self.description);
        }
        self.outcome()
    }
}

impl Drop for TestRun {
    fn drop(&mut self) {
        lock(&self.stop).trigger();
    }
}

impl std::fmt::Debug for TestRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRun")
            .field("class", &self.class)
            .field("outcome", &self.outcome())
            .finish_non_exhaustive()
    }
}

fn pool_config(name: &str, settings: &TestSettings, options: &RunnerOptions) -> PoolConfig {
    PoolConfig {
        pending_capacity: Some(options.pending_capacity.unwrap_or(settings.workers).max(1)),
        default_timeout: (settings.max_allowed_latency_ms > 0)
            .then(|| Duration::from_millis(settings.max_allowed_latency_ms)),
        ..PoolConfig::named(name, settings.workers)
    }
}

fn execute(context: RunContext) -> RunOutcome {
    let RunContext {
        test,
        mut settings,
        options,
        reporter,
        stop,
        description,
    } = context;
    info!("Test {} has started", description);
    reporter.status(AgentStatus::Prep);

    let initial = settings.current().clone();
    if let Err(err) = test.prep_for_test(&initial) {
        warn!("Test {} could not be prepared: {}", description, err);
        test.finish_test();
        return RunOutcome::Failed;
    }
    let connections = Connections::default();
    let handler = RunHandler::new(connections.clone(), settings.clone(), stop.clone());
    let pool = match WorkerPool::new(pool_config(test.name(), &initial, &options), handler) {
        Ok(pool) => pool,
        Err(err) => {
            warn!("Test {} could not start its pool: {}", description, err);
            test.finish_test();
            return RunOutcome::Failed;
        }
    };
    reporter.status(AgentStatus::Run);

    let mut meter = Meter::new(Arc::clone(&test), Arc::clone(&reporter), options.metrics_interval);
    let fed = {
        let mut feed = Feed {
            test: test.as_ref(),
            pool: &pool,
            settings: &mut settings,
            stop: &stop,
            meter: &mut meter,
            settle: options.settle,
        };
        match initial.request_mode {
            RequestMode::ByMessage => feed.by_message(),
            RequestMode::ByUser => feed.by_user(),
        }
    };

    pool.close();
    let released = connections.release();
    debug!("Released {} worker connections", released);

    let outcome = match fed {
        Fed::Completed => {
            info!("Test {} has completed", description);
            reporter.status(AgentStatus::Stop);
            RunOutcome::Completed
        }
        Fed::Stopped => {
            info!("Test {} has been stopped", description);
            RunOutcome::Stopped
        }
    };
    test.finish_test();
    outcome
}
