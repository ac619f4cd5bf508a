//! Report encoding and decoding.

use palaser_core::{LaserState, Sequence};

use crate::error::{HidError, HidResult};
use crate::protocol::{ADC_CHANNELS, ADC_OFFSET, Opcodes, REPORT_LEN, SEQUENCE_CHUNK, STATE_BYTE};

/// A command report sent from the host to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputReport {
    bytes: Vec<u8>,
}

impl OutputReport {
    /// Start a report with its opcode.
    #[must_use]
    pub fn command(opcode: u8) -> Self {
        Self { bytes: vec![opcode] }
    }

    #[must_use]
    pub fn with_u8(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    #[must_use]
    pub fn with_u16(mut self, value: u16) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[must_use]
    pub fn with_u32(mut self, value: u32) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        self
    }

    /// The opcode byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// Payload as written to the wire. Windows HID stacks reject reports
    /// shorter than the declared size, so `pad` fills up to [`REPORT_LEN`].
    #[must_use]
    pub fn to_wire(&self, pad: bool) -> Vec<u8> {
        let mut wire = self.bytes.clone();
        if pad && wire.len() < REPORT_LEN {
            wire.resize(REPORT_LEN, 0);
        }
        wire
    }
}

/// A status report read from the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport([u8; REPORT_LEN]);

impl InputReport {
    #[must_use]
    pub fn new(bytes: [u8; REPORT_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode the laser state byte.
    ///
    /// # Errors
    /// Returns a protocol error for any value other than 0 or 1.
    pub fn laser_state(&self) -> HidResult<LaserState> {
        match self.0[STATE_BYTE] {
            1 => Ok(LaserState::On),
            0 => Ok(LaserState::Off),
            other => Err(HidError::ProtocolError(format!(
                "cannot tell whether the laser is on or off (state byte {other})"
            ))),
        }
    }

    /// Raw value of ADC `channel`.
    ///
    /// # Errors
    /// Returns a protocol error if the channel does not exist.
    pub fn adc(&self, channel: u8) -> HidResult<u16> {
        if channel >= ADC_CHANNELS {
            return Err(HidError::ProtocolError(format!("no ADC channel {channel}")));
        }
        let at = ADC_OFFSET + 2 * usize::from(channel);
        Ok(u16::from_le_bytes([self.0[at], self.0[at + 1]]))
    }
}

/// Reports that transfer `sequence` into MCU memory: one header followed by
/// the pattern bytes of each channel in chunks.
///
/// # Errors
/// Returns a protocol error if a channel index, offset or count does not fit
/// the one-byte fields of the reports.
pub fn sequence_reports(opcodes: &Opcodes, sequence: &Sequence) -> HidResult<Vec<OutputReport>> {
    let mut reports = Vec::with_capacity(1 + sequence.channels.len() * 3);

    reports.push(
        OutputReport::command(opcodes.sequence_header)
            .with_u16(sequence.frequency)
            .with_u16(sequence.length)
            .with_u8(byte_field("channel count", sequence.channels.len())?),
    );

    for (channel, data) in sequence.channels.iter().enumerate() {
        for (chunk_idx, chunk) in data.chunks(SEQUENCE_CHUNK).enumerate() {
            reports.push(
                OutputReport::command(opcodes.sequence_data)
                    .with_u8(byte_field("channel index", channel)?)
                    .with_u8(byte_field("channel offset", chunk_idx * SEQUENCE_CHUNK)?)
                    .with_u8(byte_field("chunk length", chunk.len())?)
                    .with_bytes(chunk),
            );
        }
    }

    Ok(reports)
}

fn byte_field(field: &str, value: usize) -> HidResult<u8> {
    u8::try_from(value)
        .map_err(|_| HidError::ProtocolError(format!("sequence {field} {value} exceeds one byte")))
}
