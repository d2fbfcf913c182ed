use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

/// Runs the `squawk` binary in `dir` with logging kept to warnings.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned.
pub fn run_squawk<I, S>(dir: &Path, args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_squawk"))
        .args(args)
        .current_dir(dir)
        .env("SQUAWK_LOG", "warn")
        .env_remove("SQUAWK_MULTICAST")
        .env_remove("SQUAWK_LOCAL_IP")
        .output()
        .map_err(|err| format!("failed to run squawk: {}", err))
}

#[must_use]
pub fn describe(output: &Output) -> String {
    format!(
        "status: {}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}
