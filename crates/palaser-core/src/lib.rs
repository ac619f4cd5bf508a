//! PaLaser Core - command dispatch and the laser driver device contract.
//!
//! This crate holds everything that does not touch USB: the command-line
//! model, the session runner that turns commands into device calls and
//! feedback lines, and the MCU sequence file format.

pub mod command;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod sequence;

pub use command::{Command, Invocation, McuCommand};
pub use control::{LaserControl, LaserState};
pub use dispatch::{LaserDefaults, Outcome, SequenceLocator, USAGE, run_session};
pub use error::{Error, Result};
pub use sequence::{Sequence, SequenceError};
