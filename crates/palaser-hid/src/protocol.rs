//! Wire constants and the command opcode table.
//!
//! Commands go out as HID SET_REPORT control transfers whose payload is an
//! opcode byte followed by little-endian arguments. The board answers on its
//! interrupt IN endpoint with 64-byte reports.
//!
//! The opcodes for laser off, frequency, hardware sequence and DAC control
//! were captured from the board. The MCU sequence, timer and ADC opcodes are
//! provisional and can be overridden from the configuration file.

use serde::{Deserialize, Serialize};

/// Laser driver USB Vendor ID
pub const LASER_VID: u16 = 0xc251;
/// Laser driver USB Product ID
pub const LASER_PID: u16 = 0x2201;
/// HID interface carrying the vendor reports
pub const CONTROL_INTERFACE: u8 = 0;
/// Interrupt IN endpoint used when the descriptor does not name one
pub const FALLBACK_IN_ENDPOINT: u8 = 0x81;

/// Size of every input and (padded) output report.
pub const REPORT_LEN: usize = 64;
/// Input report byte holding the laser state.
pub const STATE_BYTE: usize = 6;
/// Input report offset of ADC channel 0; channels are consecutive LE `u16`.
pub const ADC_OFFSET: usize = 8;
/// Number of ADC channels present in the input report.
pub const ADC_CHANNELS: u8 = 8;
/// Pattern bytes carried by one sequence data report.
pub const SEQUENCE_CHUNK: usize = 60;

/// HID class request SET_REPORT.
pub const HID_SET_REPORT: u8 = 0x09;
/// `wValue` of SET_REPORT: output report, report id 0.
pub const OUTPUT_REPORT_VALUE: u16 = 0x0200;

/// Opcode table for the board firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Opcodes {
    /// Stop the laser output (sent after `hardware_sequence_disable`)
    pub laser_off: u8,
    pub hardware_sequence_disable: u8,
    pub hardware_sequence_enable: u8,
    pub dac_enable: u8,
    pub dac_disable: u8,
    /// DAC value, `u16` argument
    pub dac_value: u8,
    /// Pulse period word, `u16` argument
    pub frequency_word: u8,
    /// Sequence playback mode, `u8` argument
    pub sequence_mode: u8,
    pub clear_sequence: u8,
    pub timer_enable: u8,
    pub timer_disable: u8,
    /// Timer period in ms, `u32` argument
    pub interrupt_period: u8,
    pub adc_acquire: u8,
    pub sequence_header: u8,
    pub sequence_data: u8,
}

impl Default for Opcodes {
    fn default() -> Self {
        Self {
            laser_off: 4,
            hardware_sequence_disable: 90,
            hardware_sequence_enable: 91,
            dac_enable: 92,
            dac_disable: 93,
            dac_value: 94,
            frequency_word: 99,
            sequence_mode: 95,
            clear_sequence: 96,
            timer_enable: 97,
            timer_disable: 98,
            interrupt_period: 100,
            adc_acquire: 101,
            sequence_header: 102,
            sequence_data: 103,
        }
    }
}
