use std::net::{Ipv4Addr, SocketAddrV4};

use clap::Parser;

use super::*;
use crate::error::{AppError, AppResult};
use crate::settings::RequestMode;
use crate::transport::DEFAULT_GROUP;

#[test]
fn globals_default_when_absent() -> AppResult<()> {
    let args = SquawkArgs::try_parse_from(["squawk", "agent"])?;
    if !matches!(args.command, Command::Agent) {
        return Err(AppError::validation("Expected agent subcommand"));
    }
    if args.multicast != DEFAULT_GROUP || !args.loopback || args.ttl != 1 {
        return Err(AppError::validation(format!("Unexpected globals {:?}", args)));
    }
    if args.local_ip.is_some() || args.config.is_some() {
        return Err(AppError::validation("Unexpected optional globals"));
    }
    Ok(())
}

#[test]
fn globals_are_accepted_after_the_subcommand() -> AppResult<()> {
    let args = SquawkArgs::try_parse_from([
        "squawk",
        "watch",
        "--multicast",
        "239.1.2.3:5000",
        "--loopback",
        "off",
        "--local-ip",
        "10.1.1.1",
        "--stale-secs",
        "5",
    ])?;
    if args.multicast != SocketAddrV4::new(Ipv4Addr::new(239, 1, 2, 3), 5000) {
        return Err(AppError::validation("Unexpected multicast"));
    }
    if args.loopback || args.local_ip != Some(Ipv4Addr::new(10, 1, 1, 1)) {
        return Err(AppError::validation("Unexpected loopback or local ip"));
    }
    match args.command {
        Command::Watch(watch) if watch.stale_secs == 5 => Ok(()),
        other => Err(AppError::validation(format!("Unexpected command {:?}", other))),
    }
}

#[test]
fn unicast_group_is_rejected() -> AppResult<()> {
    if SquawkArgs::try_parse_from(["squawk", "--multicast", "10.0.0.1:5000", "agent"]).is_ok() {
        return Err(AppError::validation("Unicast group accepted"));
    }
    if SquawkArgs::try_parse_from(["squawk", "--multicast", "239.1.2.3", "agent"]).is_ok() {
        return Err(AppError::validation("Group without port accepted"));
    }
    Ok(())
}

#[test]
fn start_flags_become_a_patch() -> AppResult<()> {
    let args = SquawkArgs::try_parse_from([
        "squawk",
        "start",
        "--class",
        "BasicSetGet",
        "--target",
        "10.0.0.9",
        "--workers",
        "4",
        "--mode",
        "ByUser",
        "--ramp-up",
        "30",
        "--max-latency",
        "250",
    ])?;
    let Command::Start(start) = args.command else {
        return Err(AppError::validation("Expected start subcommand"));
    };
    if start.class != "BasicSetGet" || start.target != Some(Ipv4Addr::new(10, 0, 0, 9)) {
        return Err(AppError::validation("Unexpected class or target"));
    }
    let patch = start.test.to_patch();
    if patch.workers != Some(4)
        || patch.request_mode != Some(RequestMode::ByUser)
        || patch.ramp_up_secs != Some(30)
        || patch.max_allowed_latency_ms != Some(250)
    {
        return Err(AppError::validation(format!("Unexpected patch {:?}", patch)));
    }
    if patch.total_requests.is_some() || patch.scenario.is_some() {
        return Err(AppError::validation("Unset flags leaked into the patch"));
    }
    Ok(())
}

#[test]
fn finish_requires_a_class() -> AppResult<()> {
    if SquawkArgs::try_parse_from(["squawk", "finish"]).is_ok() {
        return Err(AppError::validation("Finish without class accepted"));
    }
    let args = SquawkArgs::try_parse_from(["squawk", "finish", "--class", "NullSetGet"])?;
    match args.command {
        Command::Finish(finish) if finish.class == "NullSetGet" && finish.target.is_none() => Ok(()),
        other => Err(AppError::validation(format!("Unexpected command {:?}", other))),
    }
}

#[test]
fn bool_parser_accepts_common_spellings() -> AppResult<()> {
    for (value, expected) in [("yes", true), ("ON", true), ("0", false), ("false", false)] {
        if parse_bool(value)? != expected {
            return Err(AppError::validation(format!("Unexpected value for {}", value)));
        }
    }
    if parse_bool("maybe").is_ok() {
        return Err(AppError::validation("Accepted 'maybe'"));
    }
    Ok(())
}

#[test]
fn class_is_a_named_flag_on_test_commands() -> AppResult<()> {
    for line in [
        &["squawk", "start", "--class", "BasicSetGet", "--workers", "8", "--total-requests", "10000"][..],
        &["squawk", "update", "--class", "BasicSetGet", "--request-rate", "200"][..],
        &["squawk", "finish", "--class", "BasicSetGet"][..],
        &["squawk", "run", "--class", "BasicSetGet", "--total-requests", "40"][..],
    ] {
        if let Err(err) = SquawkArgs::try_parse_from(line.iter().copied()) {
            return Err(AppError::validation(format!("{:?} rejected: {}", line, err)));
        }
    }
    if SquawkArgs::try_parse_from(["squawk", "start", "BasicSetGet"]).is_ok() {
        return Err(AppError::validation("positional class accepted"));
    }
    Ok(())
}
