//! PaLaser - command-line control for the Particulars laser driver.
//!
//! Each invocation runs a single option (`-f`, `-off`, `-mc ...`, `-p`, `-s`)
//! against the attached board, so setting up the laser may take several
//! calls.

use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod select;

use palaser_core::{Command, Invocation, Outcome, USAGE, run_session};
use palaser_hid::LaserDriver;

/// Exit status for a session that ran, or found no board attached.
const EXIT_OK: u8 = 0;
/// Exit status for a device, file or configuration error.
const EXIT_FAILURE: u8 = 1;
/// Exit status for a malformed command line.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("palaser: failed to initialize logging: {e}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    ExitCode::from(run_cli(&args, run))
}

/// Parse `args` and hand the command to `session`. Usage and malformed
/// arguments never reach `session`.
fn run_cli<S, F>(args: &[S], session: F) -> u8
where
    S: AsRef<str>,
    F: FnOnce(&Command) -> Result<Outcome>,
{
    let invocation = match Invocation::parse(args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("palaser: {e}");
            eprintln!("Run palaser without arguments for usage.");
            return EXIT_USAGE;
        }
    };

    let Invocation::Run(command) = invocation else {
        print!("{USAGE}");
        return EXIT_OK;
    };

    exit_status(&session(&command))
}

fn exit_status(result: &Result<Outcome>) -> u8 {
    match result {
        Ok(outcome) => {
            debug!(?outcome, "Finished");
            EXIT_OK
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("palaser: {e:#}");
            EXIT_FAILURE
        }
    }
}

fn init_logging() -> Result<()> {
    // Logs go to stderr; stdout carries the feedback lines scripts parse
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("palaser=warn".parse()?)
                .add_directive("palaser_core=warn".parse()?)
                .add_directive("palaser_hid=warn".parse()?),
        )
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn run(command: &Command) -> Result<Outcome> {
    info!(version = env!("CARGO_PKG_VERSION"), ?command, "Starting PaLaser");

    let config = config::load_config()?;
    let settings = config.driver_settings()?;
    let defaults = config.laser_defaults();
    let mut locator = select::FileLocator::new(&config.sequence, io::stdin().is_terminal());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = run_session(
        command,
        || LaserDriver::detect(&settings).map_err(palaser_core::Error::from),
        &mut locator,
        defaults,
        &mut out,
    )
    .context("Laser command failed")?;
    out.flush()?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_session(command: &Command) -> Result<Outcome> {
        panic!("session started for {command:?}")
    }

    #[test]
    fn test_usage_exits_zero_without_session() {
        assert_eq!(run_cli::<&str, _>(&[], unreachable_session), EXIT_OK);
        assert_eq!(run_cli(&["-h"], unreachable_session), EXIT_OK);
        assert_eq!(run_cli(&["--help"], unreachable_session), EXIT_OK);
    }

    #[test]
    fn test_argument_errors_exit_two_without_session() {
        let cases: [&[&str]; 5] = [&["-x"], &["-p"], &["-f", "fast"], &["-mc", "warp"], &["-off", "now"]];
        for args in cases {
            assert_eq!(run_cli(args, unreachable_session), EXIT_USAGE, "{args:?}");
        }
    }

    #[test]
    fn test_not_attached_exits_zero() {
        assert_eq!(run_cli(&["-off"], |_| Ok(Outcome::NotAttached)), EXIT_OK);
    }

    #[test]
    fn test_completed_exits_zero() {
        let status = run_cli(&["-p", "1200"], |command| {
            assert_eq!(*command, Command::SetDac { millivolts: 1200 });
            Ok(Outcome::Completed)
        });
        assert_eq!(status, EXIT_OK);
    }

    #[test]
    fn test_session_errors_exit_one() {
        let device = run_cli(&["-s"], |_| {
            Err(palaser_core::Error::Device("state byte 7".into())).context("Laser command failed")
        });
        assert_eq!(device, EXIT_FAILURE);

        let file = run_cli(&["-mc", "file", "missing.txt"], |_| {
            Err(anyhow::anyhow!("Sequence file error: line 1: unrecognized content"))
        });
        assert_eq!(file, EXIT_FAILURE);
    }
}
