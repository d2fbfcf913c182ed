use std::net::{Ipv4Addr, SocketAddrV4};

use clap::{CommandFactory, FromArgMatches};
use tempfile::tempdir;

use super::types::ConfigFile;
use super::{apply_config, load_config, load_config_file, test_settings};
use crate::args::{Command, SquawkArgs, TestFlags};
use crate::error::{AppError, AppResult, ConfigError};
use crate::settings::RequestMode;

fn parse(argv: &[&str]) -> AppResult<(SquawkArgs, clap::ArgMatches)> {
    let matches = SquawkArgs::command().try_get_matches_from(argv)?;
    let args = SquawkArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

#[test]
fn toml_config_loads_globals_and_test_table() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("squawk.toml");
    let content = r#"
multicast = "239.10.0.1:40000"
local_ip = "10.0.0.4"
loopback = false
settle_ms = 250

[test]
workers = 4
total_requests = 500
request_mode = "byuser"
"#;
    std::fs::write(&path, content)?;

    let config = load_config_file(&path)?;
    if config.multicast.as_deref() != Some("239.10.0.1:40000") || config.loopback != Some(false) {
        return Err(AppError::validation(format!("Unexpected globals {:?}", config)));
    }
    let test = config
        .test
        .as_ref()
        .ok_or_else(|| AppError::validation("Expected [test] table"))?;
    if test.workers != Some(4)
        || test.total_requests != Some(500)
        || test.request_mode != Some(RequestMode::ByUser)
        || test.scenario.is_some()
    {
        return Err(AppError::validation(format!("Unexpected test table {:?}", test)));
    }
    Ok(())
}

#[test]
fn json_config_loads() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("squawk.json");
    std::fs::write(&path, r#"{ "ttl": 4, "test": { "scenario": "Set" } }"#)?;

    let config = load_config_file(&path)?;
    if config.ttl != Some(4) {
        return Err(AppError::validation("Unexpected ttl"));
    }
    let scenario = config.test.and_then(|test| test.scenario);
    if scenario.as_deref() != Some("Set") {
        return Err(AppError::validation("Unexpected scenario"));
    }
    Ok(())
}

#[test]
fn unsupported_extension_fails() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("squawk.yaml");
    std::fs::write(&path, "ttl: 4")?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        other => Err(AppError::validation(format!("Unexpected result {:?}", other))),
    }
}

#[test]
fn missing_and_malformed_files_fail() -> AppResult<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("absent.toml");
    if !matches!(
        load_config(missing.to_str()),
        Err(AppError::Config(ConfigError::ReadConfig { .. }))
    ) {
        return Err(AppError::validation("Missing file did not fail to read"));
    }
    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "ttl = [")?;
    if !matches!(
        load_config_file(&broken),
        Err(AppError::Config(ConfigError::ParseToml { .. }))
    ) {
        return Err(AppError::validation("Malformed TOML parsed"));
    }
    Ok(())
}

#[test]
fn cli_wins_over_config() -> AppResult<()> {
    let config = ConfigFile {
        multicast: Some("239.10.0.1:40000".to_owned()),
        ttl: Some(8),
        metrics_interval_ms: Some(750),
        ..ConfigFile::default()
    };
    let (mut args, matches) = parse(&["squawk", "--ttl", "3", "agent"])?;
    apply_config(&mut args, &matches, &config)?;
    if args.ttl != 3 {
        return Err(AppError::validation(format!("CLI ttl lost: {}", args.ttl)));
    }
    if args.multicast != SocketAddrV4::new(Ipv4Addr::new(239, 10, 0, 1), 40000) {
        return Err(AppError::validation("Config multicast not applied"));
    }
    if args.metrics_interval_ms != 750 {
        return Err(AppError::validation("Config metrics interval not applied"));
    }
    Ok(())
}

#[test]
fn bad_config_addresses_are_rejected() -> AppResult<()> {
    let (mut args, matches) = parse(&["squawk", "agent"])?;
    let unicast = ConfigFile {
        multicast: Some("10.0.0.1:40000".to_owned()),
        ..ConfigFile::default()
    };
    if !matches!(
        apply_config(&mut args, &matches, &unicast),
        Err(AppError::Config(ConfigError::InvalidMulticast { .. }))
    ) {
        return Err(AppError::validation("Unicast group accepted from config"));
    }
    let garbage = ConfigFile {
        local_ip: Some("not-an-ip".to_owned()),
        ..ConfigFile::default()
    };
    if !matches!(
        apply_config(&mut args, &matches, &garbage),
        Err(AppError::Config(ConfigError::InvalidLocalIp { .. }))
    ) {
        return Err(AppError::validation("Garbage local_ip accepted"));
    }
    Ok(())
}

#[test]
fn test_flags_override_the_test_table() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("squawk.toml");
    std::fs::write(&path, "[test]\nworkers = 4\nmessage_max = 900\n")?;
    let config = load_config_file(&path)?;

    let (args, _matches) = parse(&["squawk", "run", "--class", "NullSetGet", "--workers", "7"])?;
    let Command::Run(run) = args.command else {
        return Err(AppError::validation("Expected run subcommand"));
    };
    let settings = test_settings(Some(&config), &run.test);
    if settings.workers != 7 || settings.message_max != 900 || settings.total_requests != 1000 {
        return Err(AppError::validation(format!("Unexpected settings {:?}", settings)));
    }
    let defaults = test_settings(None, &TestFlags::default());
    if defaults != crate::settings::TestSettings::default() {
        return Err(AppError::validation("Empty layers changed the defaults"));
    }
    Ok(())
}
