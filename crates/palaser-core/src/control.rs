//! Device contract for the laser driver board.
//!
//! Each method maps to one primitive the board firmware understands. The
//! operations a user asks for are composed from these in [`crate::dispatch`].

use std::fmt;

use crate::error::Result;
use crate::sequence::Sequence;

/// ADC channel wired to the board temperature sensor.
pub const TEMPERATURE_ADC_CHANNEL: u8 = 3;

/// Sequence mode value that starts playback from MCU memory.
pub const SEQUENCE_MODE_RUN: u8 = 1;

/// Laser output state as reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserState {
    On,
    Off,
}

impl fmt::Display for LaserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("Laser in ON and running!"),
            Self::Off => f.write_str("Laser in OFF!"),
        }
    }
}

/// Convert a raw temperature ADC reading to degrees Celsius.
#[must_use]
pub fn temperature_celsius(raw: u16) -> f64 {
    f64::from(raw) / 10.0
}

/// An open connection to the laser driver board.
#[cfg_attr(test, mockall::automock)]
pub trait LaserControl {
    /// Read the current laser output state.
    ///
    /// # Errors
    /// Returns an error if the state report cannot be read or decoded.
    fn laser_state(&mut self) -> Result<LaserState>;

    /// Stop the laser output.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn turn_off(&mut self) -> Result<()>;

    /// Send the 16-bit pulse period word.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn send_frequency_word(&mut self, word: u16) -> Result<()>;

    /// Start pulsing with the configured period and DAC.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn enable_hardware_sequence(&mut self) -> Result<()>;

    /// Select the sequence playback mode.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn set_sequence_mode(&mut self, mode: u8) -> Result<()>;

    /// Erase the sequence stored in MCU memory.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn clear_sequence(&mut self) -> Result<()>;

    /// Transfer a parsed sequence into MCU memory.
    ///
    /// # Errors
    /// Returns an error if any part of the transfer fails.
    fn upload_sequence(&mut self, sequence: &Sequence) -> Result<()>;

    /// Enable the repetitive interrupt timer.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn enable_timer(&mut self) -> Result<()>;

    /// Disable the repetitive interrupt timer, leaving the external trigger.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn disable_timer(&mut self) -> Result<()>;

    /// Set the time between two sequences in milliseconds.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn set_interrupt_period(&mut self, period_ms: u32) -> Result<()>;

    /// Enable the pulse amplitude DAC.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn enable_dac(&mut self) -> Result<()>;

    /// Disable the pulse amplitude DAC.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn disable_dac(&mut self) -> Result<()>;

    /// Set the DAC output in millivolts.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent.
    fn set_dac(&mut self, millivolts: u16) -> Result<()>;

    /// Trigger an ADC acquisition and return the raw value of `channel`.
    ///
    /// # Errors
    /// Returns an error if the acquisition or the read fails.
    fn sample_adc(&mut self, channel: u8) -> Result<u16>;
}
