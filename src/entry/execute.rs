use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::controller::{AgentBoard, Controller, FleetTotals, LineWriter, Watcher, watch_line};
use crate::error::{AppError, AppResult, ValidationError};
use crate::feeder::{RunOutcome, RunReporter, RunnerOptions, TestRun};
use crate::orchestrator::{Agent, AgentOptions};
use crate::protocol::{AgentStatus, MetricsReport};
use crate::request::request_registry;
use crate::router::command_router;
use crate::settings::TestSettings;
use crate::shutdown::wait_for_shutdown;
use crate::transport::ControlPlane;

use super::plan::{Network, RunPlan};

pub(super) async fn execute_plan(plan: RunPlan) -> AppResult<()> {
    match plan {
        RunPlan::Agent { network, agent } => run_agent(network, agent).await,
        RunPlan::Local {
            class,
            settings,
            runner,
            local_ip,
        } => run_local(&class, settings, runner, local_ip).await,
        RunPlan::Start {
            network,
            class,
            settings,
            target,
        } => {
            let _sent = controller(network).start(&class, &settings, target)?;
            Ok(())
        }
        RunPlan::Update {
            network,
            class,
            patch,
            target,
        } => {
            let _sent = controller(network).update(&class, &patch, target)?;
            Ok(())
        }
        RunPlan::Finish {
            network,
            class,
            target,
        } => {
            let _sent = controller(network).finish(&class, target)?;
            Ok(())
        }
        RunPlan::Watch { network, board } => run_watch(network, board).await,
        RunPlan::List => {
            for name in request_registry().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn controller(network: Network) -> Controller {
    let plane = Arc::new(ControlPlane::new(network.transport));
    Controller::new(plane, network.group)
}

async fn run_agent(network: Network, options: AgentOptions) -> AppResult<()> {
    let plane = Arc::new(ControlPlane::new(network.transport));
    let agent = Agent::start(
        Arc::clone(&plane),
        Arc::clone(command_router()),
        Arc::clone(request_registry()),
        options,
    )?;
    wait_for_shutdown().await;
    info!("Shutdown requested");
    tokio::task::spawn_blocking(move || agent.shutdown()).await?;
    plane.stop_all();
    Ok(())
}

async fn run_watch(network: Network, board: AgentBoard) -> AppResult<()> {
    let plane = Arc::new(ControlPlane::new(network.transport));
    let writer: LineWriter = Arc::new(|line: &str| println!("{}", line));
    let watcher = Arc::new(Watcher::new(board, writer));
    let router = command_router();
    watcher.register_with(router);
    plane.start_listener(network.group, router.frame_handler())?;
    info!("Watching {}", network.group);

    wait_for_shutdown().await;
    Watcher::unregister_from(router);
    plane.stop_all();
    let now = std::time::Instant::now();
    for line in watcher.board().summary_at(now) {
        println!("{}", line);
    }
    Ok(())
}

/// Prints every sample of a local run the way `watch` prints fleet lines.
struct ConsoleReporter {
    local_ip: Ipv4Addr,
}

impl RunReporter for ConsoleReporter {
    fn status(&self, status: AgentStatus) {
        info!("Local run is now {}", status);
    }

    fn metrics(&self, report: &MetricsReport) {
        println!(
            "{}",
            watch_line(self.local_ip, report, &FleetTotals::from_report(report))
        );
    }
}

async fn run_local(
    class: &str,
    settings: TestSettings,
    runner: RunnerOptions,
    local_ip: Ipv4Addr,
) -> AppResult<()> {
    let test = request_registry().resolve(class).ok_or_else(|| {
        AppError::validation(ValidationError::UnknownClass {
            name: class.to_owned(),
            known: request_registry().names().join(", "),
        })
    })?;
    let reporter = Arc::new(ConsoleReporter { local_ip });
    let run = Arc::new(TestRun::spawn(
        test,
        settings,
        runner,
        reporter,
        &format!("local - {}", class),
    )?);

    let waiter = Arc::clone(&run);
    let mut finished = tokio::task::spawn_blocking(move || waiter.join());
    let outcome = tokio::select! {
        joined = &mut finished => joined?,
        () = wait_for_shutdown() => {
            info!("Stopping {}", class);
            let stopper = Arc::clone(&run);
            tokio::task::spawn_blocking(move || stopper.stop()).await?;
            finished.await?
        }
    };
    match outcome {
        Some(RunOutcome::Completed) => Ok(()),
        Some(RunOutcome::Stopped) | None => {
            warn!("{} did not run to completion", class);
            Ok(())
        }
        Some(RunOutcome::Failed) => Err(AppError::validation(ValidationError::RunFailed {
            class: class.to_owned(),
        })),
    }
}
