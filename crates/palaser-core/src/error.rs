//! Error types for PaLaser core.

use thiserror::Error;

use crate::sequence::SequenceError;

/// Core error type for PaLaser operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Unknown MCU sub-command: {0}")]
    UnknownMcuCommand(String),

    #[error("Invalid number for {option}: {value:?}")]
    InvalidNumber { option: &'static str, value: String },

    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("Frequency {0} Hz out of range (must be 50-100000 Hz)")]
    FrequencyOutOfRange(f32),

    #[error("DAC value {0} mV out of range (must be 0-3299 mV)")]
    DacOutOfRange(u16),

    #[error("No sequence file selected")]
    NoSequenceSelected,

    #[error("Sequence file error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Device error: {0}")]
    Device(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PaLaser core operations.
pub type Result<T> = std::result::Result<T, Error>;
