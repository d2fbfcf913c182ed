use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tracing::warn;

use crate::args::{Command, SquawkArgs, TestFlags};
use crate::config::test_settings;
use crate::config::types::ConfigFile;
use crate::controller::AgentBoard;
use crate::error::{AppError, AppResult, ValidationError};
use crate::feeder::RunnerOptions;
use crate::orchestrator::AgentOptions;
use crate::request::request_registry;
use crate::settings::{SettingsPatch, TestSettings};
use crate::transport::{SocketOptions, TransportOptions};

/// Where and how to reach the control group.
pub(super) struct Network {
    pub(super) group: SocketAddrV4,
    pub(super) transport: TransportOptions,
}

pub(super) enum RunPlan {
    Agent {
        network: Network,
        agent: AgentOptions,
    },
    Local {
        class: String,
        settings: TestSettings,
        runner: RunnerOptions,
        local_ip: Ipv4Addr,
    },
    Start {
        network: Network,
        class: String,
        settings: TestSettings,
        target: Option<Ipv4Addr>,
    },
    Update {
        network: Network,
        class: String,
        patch: SettingsPatch,
        target: Option<Ipv4Addr>,
    },
    Finish {
        network: Network,
        class: String,
        target: Option<Ipv4Addr>,
    },
    Watch {
        network: Network,
        board: AgentBoard,
    },
    List,
}

pub(super) fn build_plan(args: SquawkArgs, config: Option<&ConfigFile>) -> AppResult<RunPlan> {
    let network = Network {
        group: args.multicast,
        transport: TransportOptions {
            local_ip: args.local_ip,
            socket: SocketOptions {
                ttl: args.ttl,
                loopback: args.loopback,
                ..SocketOptions::default()
            },
            squawk_interval: Duration::from_millis(args.squawk_interval_ms),
            ..TransportOptions::default()
        },
    };
    let runner = RunnerOptions {
        settle: Duration::from_millis(args.settle_ms),
        metrics_interval: Duration::from_millis(args.metrics_interval_ms),
        ..RunnerOptions::default()
    };

    let plan = match args.command {
        Command::Agent => {
            let mut agent = AgentOptions::new(network.group);
            agent.squawk_interval = network.transport.squawk_interval;
            agent.settings = test_settings(config, &TestFlags::default());
            agent.runner = runner;
            RunPlan::Agent { network, agent }
        }
        Command::Run(run) => {
            let class = known_class(&run.class)?;
            let settings = test_settings(config, &run.test);
            settings.validate()?;
            RunPlan::Local {
                class,
                settings,
                runner,
                local_ip: args.local_ip.unwrap_or(Ipv4Addr::LOCALHOST),
            }
        }
        Command::Start(start) => {
            let settings = test_settings(config, &start.test);
            settings.validate()?;
            RunPlan::Start {
                network,
                class: start.class,
                settings,
                target: start.target,
            }
        }
        Command::Update(update) => {
            let patch = update.test.to_patch();
            if patch.updatable().is_empty() {
                warn!(
                    "Update for {} carries none of message-min, message-max, total-requests or request-rate",
                    update.class
                );
            }
            RunPlan::Update {
                network,
                class: update.class,
                patch,
                target: update.target,
            }
        }
        Command::Finish(finish) => RunPlan::Finish {
            network,
            class: finish.class,
            target: finish.target,
        },
        Command::Watch(watch) => RunPlan::Watch {
            network,
            board: AgentBoard::with_stale_after(Duration::from_secs(watch.stale_secs)),
        },
        Command::List => RunPlan::List,
    };
    Ok(plan)
}

fn known_class(name: &str) -> AppResult<String> {
    let registry = request_registry();
    let name = name.trim();
    if registry.contains(name) {
        return Ok(name.to_owned());
    }
    Err(AppError::validation(ValidationError::UnknownClass {
        name: name.to_owned(),
        known: registry.names().join(", "),
    }))
}
