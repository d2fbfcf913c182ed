//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;

#[cfg(test)]
mod tests;

pub use cli::{
    Command, FinishArgs, RunArgs, SquawkArgs, StartArgs, TestFlags, UpdateArgs, WatchArgs,
};
pub use parsers::{parse_bool, parse_group};
