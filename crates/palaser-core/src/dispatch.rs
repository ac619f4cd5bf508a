//! Command execution against an open device.
//!
//! Output lines are read by scripts that drive the laser through repeated
//! invocations, so their wording is stable.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::{Command, DAC_MAX_MV, McuCommand, pulse_spacing};
use crate::control::{LaserControl, SEQUENCE_MODE_RUN, TEMPERATURE_ADC_CHANNEL, temperature_celsius};
use crate::error::{Error, Result};
use crate::sequence::Sequence;

/// Lowest frequency whose period word fits in 16 bits.
pub const FREQUENCY_MIN_HZ: f32 = 50.0;
/// Highest frequency the driver supports.
pub const FREQUENCY_MAX_HZ: f32 = 100_000.0;

/// Usage text printed when no option is given.
pub const USAGE: &str = "\
PaLaser [option] [arguments]
[option] -off -> switches off the laser

[option] -on -> switches on the laser with the configured frequency and DAC

[option] -f  -> single/simple frequency running
[argument] value ; if frequency [value] is <=0 laser is turned OFF

[option] -mc  -> running the laser in microcontroller (MCU) mode
[argument] clear ; clears the bit pattern in MCU memory
[argument] start ; starts sequence in the MCU memory (timer or external interrupt should be chosen)
[argument] pulse + value; sets the time [value] between two pulses defined in the pattern file (frequency of the pulses)
[argument] file + value; loads the bit pattern file [value]. The default file is streamfile.txt
[argument] time + value; enables time interrupt and sets the time in ms [value] between two sequences [frequency of the sequence]
[argument] ext ; enables the external interrupt

[option] -p  -> setting the pulse duration / amplitude
[argument] value; sets the DAC value in mV [0-3299], other values disable the DAC

[option] -s  -> reads the laser state - temperature
Note that the laser should be off when reading.
";

/// Frequency and DAC applied by `-on`, checked only when `-on` runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserDefaults {
    /// Pulse frequency in Hz
    pub frequency_hz: f32,
    /// DAC value in millivolts
    pub dac_millivolts: u16,
}

impl Default for LaserDefaults {
    fn default() -> Self {
        Self { frequency_hz: 1_000.0, dac_millivolts: 0 }
    }
}

/// Resolves which sequence file `-mc file` loads.
pub trait SequenceLocator {
    /// Resolve `requested`, or let the user choose when it is `None`.
    ///
    /// # Errors
    /// Returns [`Error::NoSequenceSelected`] if nothing was chosen.
    fn locate(&mut self, requested: Option<&Path>) -> Result<PathBuf>;
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No board was found; nothing was sent
    NotAttached,
    /// The command ran on the board
    Completed,
}

/// Convert a frequency to the board's 16-bit pulse period word.
///
/// # Errors
/// Returns [`Error::FrequencyOutOfRange`] outside 50 Hz - 100 kHz.
pub fn frequency_word(hz: f32) -> Result<u16> {
    if !(FREQUENCY_MIN_HZ..=FREQUENCY_MAX_HZ).contains(&hz) {
        return Err(Error::FrequencyOutOfRange(hz));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let word = ((500_000_000.0 / f64::from(hz) - 440.0) / 180.0) as u16;
    Ok(word)
}

/// Connect to the board, report its state and run `command`.
///
/// `connect` returning `Ok(None)` means no board is attached; the session
/// then stops before any device call.
///
/// # Errors
/// Returns the first device, file or output error.
pub fn run_session<D, C, W>(
    command: &Command,
    connect: C,
    locator: &mut dyn SequenceLocator,
    defaults: LaserDefaults,
    out: &mut W,
) -> Result<Outcome>
where
    D: LaserControl,
    C: FnOnce() -> Result<Option<D>>,
    W: Write,
{
    let Some(mut device) = connect()? else {
        writeln!(out, "Device is not attached!")?;
        info!("No laser driver attached");
        return Ok(Outcome::NotAttached);
    };
    writeln!(out, "Device is attached!")?;

    let state = device.laser_state()?;
    writeln!(out, "{state}")?;

    Dispatcher { device: &mut device, out, locator, defaults }.execute(command)?;
    Ok(Outcome::Completed)
}

/// Runs commands on an open device, writing feedback to `out`.
pub struct Dispatcher<'a, D, W> {
    pub device: &'a mut D,
    pub out: &'a mut W,
    pub locator: &'a mut dyn SequenceLocator,
    pub defaults: LaserDefaults,
}

impl<D: LaserControl, W: Write> Dispatcher<'_, D, W> {
    /// Execute a single command.
    ///
    /// # Errors
    /// Returns the first device, file or output error.
    pub fn execute(&mut self, command: &Command) -> Result<()> {
        debug!(?command, "Executing command");
        match command {
            Command::SwitchOff => {
                writeln!(self.out, "Switching the laser OFF")?;
                self.device.turn_off()
            }
            Command::SetFrequency { hz } => self.set_frequency(*hz),
            Command::TurnOff => self.device.turn_off(),
            Command::TurnOn => self.turn_on(),
            Command::Mcu(mcu) => {
                writeln!(self.out, "Complex data taking - pulses controlled by MCU")?;
                self.execute_mcu(mcu)
            }
            Command::SetDac { millivolts } => self.set_dac(*millivolts),
            Command::DisableDac => {
                writeln!(self.out, "Disabling DAC")?;
                self.device.disable_dac()
            }
            Command::ReadState => {
                writeln!(self.out, "Laser state")?;
                let raw = self.device.sample_adc(TEMPERATURE_ADC_CHANNEL)?;
                writeln!(self.out, "T={:5.2} C", temperature_celsius(raw))?;
                Ok(())
            }
        }
    }

    fn execute_mcu(&mut self, command: &McuCommand) -> Result<()> {
        match command {
            McuCommand::Clear => {
                self.device.turn_off()?;
                self.device.clear_sequence()?;
                writeln!(self.out, "Sequence cleared")?;
            }
            McuCommand::PulseSpacing { value } => {
                // The board takes the low 16 bits of the word
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let word = pulse_spacing(*value) as u16;
                self.device.send_frequency_word(word)?;
                writeln!(self.out, "Pulse duration set")?;
            }
            McuCommand::Start => {
                self.device.set_sequence_mode(SEQUENCE_MODE_RUN)?;
                writeln!(self.out, "Sequence started")?;
            }
            McuCommand::LoadFile { path } => {
                let path = self.locator.locate(path.as_deref())?;
                let sequence = Sequence::load(&path)?;
                self.device.upload_sequence(&sequence)?;
                info!(?path, channels = sequence.channels.len(), "Sequence uploaded");
                writeln!(
                    self.out,
                    "Sequence file {} loaded ({} channels)",
                    path.display(),
                    sequence.channels.len()
                )?;
            }
            McuCommand::Timer { period_ms } => {
                self.device.enable_timer()?;
                self.device.set_interrupt_period(*period_ms)?;
                // Spelled as the vendor tool prints it; scripts match on it
                writeln!(self.out, "Timer interupt ON :: Sequence timer {period_ms}")?;
            }
            McuCommand::ExternalInterrupt => {
                self.device.disable_timer()?;
                writeln!(self.out, "External interupt ON")?;
            }
        }
        Ok(())
    }

    fn set_frequency(&mut self, hz: f32) -> Result<()> {
        let word = frequency_word(hz)?;
        self.device.send_frequency_word(word)?;
        self.device.enable_hardware_sequence()?;
        info!(hz, word, "Frequency set");
        #[allow(clippy::cast_possible_truncation)]
        let whole = hz as i64;
        writeln!(self.out, "Frequency set to {whole} Hz")?;
        Ok(())
    }

    fn set_dac(&mut self, millivolts: u16) -> Result<()> {
        write!(self.out, "Turning the laser OFF ... ")?;
        self.device.turn_off()?;
        write!(self.out, "enabling DAC ... ")?;
        self.device.enable_dac()?;
        writeln!(self.out, "Pulse setting to DAC={millivolts} mV [0-3300 mV]")?;
        self.device.set_dac(millivolts)
    }

    fn turn_on(&mut self) -> Result<()> {
        let LaserDefaults { frequency_hz, dac_millivolts } = self.defaults;
        if i64::from(dac_millivolts) > DAC_MAX_MV {
            return Err(Error::DacOutOfRange(dac_millivolts));
        }
        let word = frequency_word(frequency_hz)?;
        self.device.turn_off()?;
        self.device.enable_dac()?;
        self.device.set_dac(dac_millivolts)?;
        self.device.send_frequency_word(word)?;
        self.device.enable_hardware_sequence()?;
        #[allow(clippy::cast_possible_truncation)]
        let whole = frequency_hz as i64;
        writeln!(self.out, "Laser switched ON at {whole} Hz, DAC={dac_millivolts} mV")?;
        Ok(())
    }
}
