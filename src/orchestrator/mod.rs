//! Agent-side command and control.
//!
//! The [`Orchestrator`] turns Start, Update and Finish commands into
//! [`TestRun`]s, at most one per class. [`Agent`] wires it to a control
//! group: it registers the command handlers, listens, and keeps a
//! heartbeat repeating.
mod agent;
mod sink;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};

use crate::feeder::{RunnerOptions, TestRun};
use crate::protocol::{FINISH_TAG, FinishCommand, START_TAG, StartCommand, UPDATE_TAG, UpdateCommand};
use crate::request::RequestRegistry;
use crate::router::CommandRouter;
use crate::settings::TestSettings;
use crate::sync::lock;

pub use agent::{Agent, AgentOptions};
pub use sink::{ControlPlaneSink, FrameSink, RecordingSink};

use sink::AgentReporter;

pub struct Orchestrator {
    local_ip: Ipv4Addr,
    registry: Arc<RequestRegistry>,
    base: TestSettings,
    runner: RunnerOptions,
    sink: Arc<dyn FrameSink>,
    tests: Mutex<HashMap<String, Arc<TestRun>>>,
}

impl Orchestrator {
    /// `base` holds the settings every Start begins from before the
    /// frame's own fields are applied.
    #[must_use]
    pub fn new(
        local_ip: Ipv4Addr,
        registry: Arc<RequestRegistry>,
        base: TestSettings,
        runner: RunnerOptions,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            local_ip,
            registry,
            base,
            runner,
            sink,
            tests: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn local_ip(&self) -> Ipv4Addr {
        self.local_ip
    }

    /// Launches the commanded test, replacing any run of the same class.
    /// Returns `true` when a run was started.
    #[must_use]
    pub fn start(&self, command: &StartCommand) -> bool {
        if !command.targets(self.local_ip) {
            debug!("Ignoring Start for {} addressed to {}", command.class, command.target_ip);
            return false;
        }
        let class = command.class.trim();
        let Some(test) = self.registry.resolve(class) else {
            warn!("Ignoring Start for unknown request type '{}'", class);
            return false;
        };
        let mut settings = self.base.clone();
        command.settings.apply_to(&mut settings);

        let previous = lock(&self.tests).remove(class);
        if let Some(previous) = previous {
            info!("Replacing running test {}", class);
            previous.supersede();
        }
        let reporter = Arc::new(AgentReporter::new(Arc::clone(&self.sink)));
        match TestRun::spawn(
            test,
            settings,
            self.runner.clone(),
            reporter,
            &format!("agent - {}", class),
        ) {
            Ok(run) => {
                info!("Started {} with {:?}", class, run.settings());
                lock(&self.tests).insert(class.to_owned(), Arc::new(run));
                true
            }
            Err(err) => {
                warn!("Could not start {}: {}", class, err);
                false
            }
        }
    }

    /// Applies the command's fields to the live settings of a running test.
    /// Returns `true` when a run was updated.
    #[must_use]
    pub fn update(&self, command: &UpdateCommand) -> bool {
        if !command.targets(self.local_ip) {
            return false;
        }
        let run = lock(&self.tests).get(command.class.trim()).cloned();
        match run {
            Some(run) if !run.is_finished() => run.update(&command.settings).is_ok(),
            Some(_) | None => {
                debug!("Ignoring Update for {}: not running", command.class);
                false
            }
        }
    }

    /// Stops and forgets the run of the commanded class. Returns `true`
    /// when a run was removed.
    #[must_use]
    pub fn finish(&self, command: &FinishCommand) -> bool {
        if !command.targets(self.local_ip) {
            return false;
        }
        let run = lock(&self.tests).remove(command.class.trim());
        match run {
            Some(run) => {
                run.stop();
                info!("Finished {}", command.class);
                true
            }
            None => false,
        }
    }

    /// Classes with a run that has not ended.
    #[must_use]
    pub fn running(&self) -> Vec<String> {
        let mut classes: Vec<String> = lock(&self.tests)
            .iter()
            .filter(|(_, run)| !run.is_finished())
            .map(|(class, _)| class.clone())
            .collect();
        classes.sort();
        classes
    }

    #[must_use]
    pub fn run(&self, class: &str) -> Option<Arc<TestRun>> {
        lock(&self.tests).get(class).cloned()
    }

    pub fn stop_all(&self) {
        let runs: Vec<Arc<TestRun>> = lock(&self.tests).drain().map(|(_, run)| run).collect();
        for run in runs {
            run.stop();
        }
    }

    /// Installs Start, Finish and Update handlers on `router`. Malformed
    /// bodies are dropped.
    pub fn register_with(self: &Arc<Self>, router: &CommandRouter) {
        let weak = Arc::downgrade(self);
        router.register(
            START_TAG,
            handler(&weak, |orchestrator, body| {
                let _handled = orchestrator.start(&StartCommand::parse(body)?);
                Ok(())
            }),
        );
        router.register(
            FINISH_TAG,
            handler(&weak, |orchestrator, body| {
                let _handled = orchestrator.finish(&FinishCommand::parse(body)?);
                Ok(())
            }),
        );
        router.register(
            UPDATE_TAG,
            handler(&weak, |orchestrator, body| {
                let _handled = orchestrator.update(&UpdateCommand::parse(body)?);
                Ok(())
            }),
        );
    }
}

fn handler(
    weak: &Weak<Orchestrator>,
    action: fn(&Orchestrator, &str) -> Result<(), crate::error::FrameError>,
) -> crate::router::CommandHandler {
    let weak = Weak::clone(weak);
    Arc::new(move |sender, body| {
        let Some(orchestrator) = weak.upgrade() else {
            return;
        };
        if let Err(err) = action(&orchestrator, body) {
            debug!("Dropping malformed command from {}: {}", sender, err);
        }
    })
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("local_ip", &self.local_ip)
            .field("running", &self.running())
            .finish_non_exhaustive()
    }
}
