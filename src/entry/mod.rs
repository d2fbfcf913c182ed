//! Top-level command dispatch for the `squawk` binary.
mod execute;
mod plan;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::SquawkArgs;
use crate::config::{apply_config, load_config};
use crate::error::{AppError, AppResult, ValidationError};
use crate::logger::init_logging;
use plan::build_plan;

/// Parses the command line, layers the config file under it and runs the
/// chosen command to completion.
///
/// # Errors
///
/// Returns an error when the config is invalid, the runtime cannot be
/// built, or the command itself fails.
pub fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args()?;
    init_logging(args.verbose, args.no_color);

    let config = load_config(args.config.as_deref())?;
    if let Some(config) = config.as_ref() {
        apply_config(&mut args, &matches, config)?;
    }
    let plan = build_plan(args, config.as_ref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| AppError::validation(ValidationError::RuntimeBuildFailed { source }))?;
    runtime.block_on(execute::execute_plan(plan))
}

fn parse_args() -> AppResult<(SquawkArgs, ArgMatches)> {
    let matches = SquawkArgs::command().get_matches();
    let args = SquawkArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}
