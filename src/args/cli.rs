use std::net::{Ipv4Addr, SocketAddrV4};

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::settings::{RequestMode, SettingsPatch};
use crate::transport::DEFAULT_GROUP;

use super::parsers::{parse_bool, parse_group};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Distributed load generator: worker pools on every agent, started, tuned and watched over a multicast control group."
)]
pub struct SquawkArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a config file (.toml or .json); defaults to squawk.toml or squawk.json
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    /// Log at debug level unless SQUAWK_LOG or RUST_LOG is set
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Control group endpoint (multicast IPv4 address and port)
    #[arg(
        long,
        global = true,
        env = "SQUAWK_MULTICAST",
        default_value_t = DEFAULT_GROUP,
        value_parser = parse_group
    )]
    pub multicast: SocketAddrV4,

    /// Address stamped on outbound frames and matched against targetIP
    #[arg(long = "local-ip", global = true, env = "SQUAWK_LOCAL_IP")]
    pub local_ip: Option<Ipv4Addr>,

    /// Deliver our own frames to listeners on this host
    #[arg(
        long,
        global = true,
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = parse_bool
    )]
    pub loopback: bool,

    /// Multicast time-to-live
    #[arg(long, global = true, default_value_t = 1)]
    pub ttl: u32,

    /// Heartbeat repeat interval in milliseconds
    #[arg(long = "squawk-interval-ms", global = true, default_value_t = 10_000)]
    pub squawk_interval_ms: u64,

    /// Pause after the last request before the final metrics sample, in milliseconds
    #[arg(long = "settle-ms", global = true, default_value_t = 10_000)]
    pub settle_ms: u64,

    /// Metrics sampling interval in milliseconds
    #[arg(long = "metrics-interval-ms", global = true, default_value_t = 5_000)]
    pub metrics_interval_ms: u64,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Join the control group and run tests on command
    Agent,
    /// Run one registered test locally, without control traffic
    Run(RunArgs),
    /// Start a test on the addressed agents
    Start(StartArgs),
    /// Change the load shape of a running test
    Update(UpdateArgs),
    /// Stop a test on the addressed agents
    Finish(FinishArgs),
    /// Print agent heartbeats and fleet metrics
    Watch(WatchArgs),
    /// List registered request types
    List,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Registered request type to run
    #[arg(long)]
    pub class: String,

    #[command(flatten)]
    pub test: TestFlags,
}

#[derive(Debug, Args, Clone)]
pub struct StartArgs {
    #[arg(long)]
    pub class: String,

    /// Only the agent with this address acts; all agents when omitted
    #[arg(long)]
    pub target: Option<Ipv4Addr>,

    #[command(flatten)]
    pub test: TestFlags,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    #[arg(long)]
    pub class: String,

    #[arg(long)]
    pub target: Option<Ipv4Addr>,

    #[command(flatten)]
    pub test: TestFlags,
}

#[derive(Debug, Args, Clone)]
pub struct FinishArgs {
    #[arg(long)]
    pub class: String,

    #[arg(long)]
    pub target: Option<Ipv4Addr>,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Seconds of silence before an agent is shown as lost
    #[arg(long = "stale-secs", default_value_t = 30)]
    pub stale_secs: u64,
}

/// Load shape overrides; unset flags leave the configured value alone.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
pub struct TestFlags {
    /// Operations per request; contains "set" and/or "get"
    #[arg(long)]
    pub scenario: Option<String>,

    /// Connection string handed to the request type
    #[arg(long)]
    pub connection: Option<String>,

    /// Smallest generated payload in bytes
    #[arg(long = "message-min")]
    pub message_min: Option<u64>,

    /// Largest generated payload in bytes
    #[arg(long = "message-max")]
    pub message_max: Option<u64>,

    /// Requests to issue in bymessage mode
    #[arg(long = "total-requests")]
    pub total_requests: Option<u64>,

    /// Aggregate requests per second (0 = unthrottled)
    #[arg(long = "request-rate")]
    pub request_rate: Option<u64>,

    /// Worker threads (1-100)
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long = "user-data")]
    pub user_data: Option<String>,

    #[arg(long = "trigger-ip")]
    pub trigger_ip: Option<String>,

    /// Admission strategy
    #[arg(long, value_enum, ignore_case = true)]
    pub mode: Option<RequestMode>,

    /// Simulated users in byuser mode
    #[arg(long)]
    pub users: Option<u64>,

    /// Seconds over which users are brought online
    #[arg(long = "ramp-up")]
    pub ramp_up: Option<u64>,

    /// Seconds a byuser run lasts
    #[arg(long)]
    pub duration: Option<u64>,

    /// Shortest user think time in seconds
    #[arg(long = "rate-min")]
    pub rate_min: Option<u64>,

    /// Longest user think time in seconds (exclusive)
    #[arg(long = "rate-max")]
    pub rate_max: Option<u64>,

    /// Per-request timeout in milliseconds (0 = none)
    #[arg(long = "max-latency")]
    pub max_latency: Option<u64>,
}

impl TestFlags {
    #[must_use]
    pub fn to_patch(&self) -> SettingsPatch {
        SettingsPatch {
            scenario: self.scenario.clone(),
            connection: self.connection.clone(),
            message_min: self.message_min,
            message_max: self.message_max,
            total_requests: self.total_requests,
            request_rate: self.request_rate,
            workers: self.workers,
            user_data: self.user_data.clone(),
            trigger_ip: self.trigger_ip.clone(),
            request_mode: self.mode,
            users: self.users,
            ramp_up_secs: self.ramp_up,
            duration_secs: self.duration,
            rate_min_secs: self.rate_min,
            rate_max_secs: self.rate_max,
            max_allowed_latency_ms: self.max_latency,
        }
    }
}
