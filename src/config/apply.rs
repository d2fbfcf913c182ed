use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{SquawkArgs, TestFlags, parse_group};
use crate::error::{AppError, AppResult, ConfigError};
use crate::settings::TestSettings;

use super::types::ConfigFile;

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

/// Copies config values into `args` for every option not given on the
/// command line.
///
/// # Errors
///
/// Returns an error when the configured multicast group or local address
/// does not parse.
pub fn apply_config(
    args: &mut SquawkArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "multicast")
        && let Some(value) = config.multicast.as_deref()
    {
        args.multicast = parse_group(value).map_err(|err| {
            AppError::config(ConfigError::InvalidMulticast {
                value: value.to_owned(),
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "local_ip")
        && let Some(value) = config.local_ip.as_deref()
    {
        let parsed = value.trim().parse().map_err(|_err| {
            AppError::config(ConfigError::InvalidLocalIp {
                value: value.to_owned(),
            })
        })?;
        args.local_ip = Some(parsed);
    }

    if !is_cli(matches, "loopback")
        && let Some(loopback) = config.loopback
    {
        args.loopback = loopback;
    }

    if !is_cli(matches, "ttl")
        && let Some(ttl) = config.ttl
    {
        args.ttl = ttl;
    }

    if !is_cli(matches, "squawk_interval_ms")
        && let Some(interval) = config.squawk_interval_ms
    {
        args.squawk_interval_ms = interval;
    }

    if !is_cli(matches, "settle_ms")
        && let Some(settle) = config.settle_ms
    {
        args.settle_ms = settle;
    }

    if !is_cli(matches, "metrics_interval_ms")
        && let Some(interval) = config.metrics_interval_ms
    {
        args.metrics_interval_ms = interval;
    }

    Ok(())
}

/// Defaults, then the config file's `[test]` table, then `flags`.
#[must_use]
pub fn test_settings(config: Option<&ConfigFile>, flags: &TestFlags) -> TestSettings {
    let mut settings = TestSettings::default();
    if let Some(patch) = config.and_then(|config| config.test.as_ref()) {
        patch.apply_to(&mut settings);
    }
    flags.to_patch().apply_to(&mut settings);
    settings
}
