//! Command-line dispatch.
//!
//! The tool takes one option per invocation, in the single-dash style of the
//! vendor board utilities (`-off`, `-mc clear`), so arguments are matched
//! by hand instead of through a long/short option parser.

use std::num::IntErrorKind;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Lowest DAC value accepted by `-p`, in millivolts.
pub const DAC_MIN_MV: i64 = 0;
/// Highest DAC value accepted by `-p`, in millivolts.
pub const DAC_MAX_MV: i64 = 3299;

/// What a single invocation asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Print the usage text and touch nothing
    Usage,
    /// Run one command against the device
    Run(Command),
}

/// A device command selected on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `-f` with a non-positive frequency
    SwitchOff,
    /// `-f` with a positive frequency
    SetFrequency { hz: f32 },
    /// `-off`
    TurnOff,
    /// `-on`, using the configured default frequency and DAC
    TurnOn,
    /// `-mc ...`
    Mcu(McuCommand),
    /// `-p` with a value inside the DAC range
    SetDac { millivolts: u16 },
    /// `-p` with a value outside the DAC range
    DisableDac,
    /// `-s`
    ReadState,
}

/// Sub-commands of `-mc`, running the laser from the MCU sequence memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McuCommand {
    /// Turn the laser off and clear the sequence memory
    Clear,
    /// Set the time between two pulses of the pattern
    PulseSpacing { value: i32 },
    /// Start the stored sequence
    Start,
    /// Load a sequence file; `None` asks the user to pick one
    LoadFile { path: Option<PathBuf> },
    /// Repeat the sequence from the timer interrupt every `period_ms`
    Timer { period_ms: u32 },
    /// Trigger the sequence from the external interrupt
    ExternalInterrupt,
}

impl Invocation {
    /// Parse the argument vector, program name excluded.
    ///
    /// # Errors
    /// Returns a usage error for unknown options, missing or malformed
    /// arguments and trailing arguments.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut args = Args { rest: args.iter().map(AsRef::as_ref).collect(), pos: 0 };

        let Some(option) = args.take() else {
            return Ok(Self::Usage);
        };

        let command = match option {
            "-h" | "--help" => {
                args.finish()?;
                return Ok(Self::Usage);
            }
            "-f" => Command::from_frequency(parse_frequency(args.required("-f")?)?),
            "-off" => Command::TurnOff,
            "-on" => Command::TurnOn,
            "-mc" => Command::Mcu(McuCommand::parse(&mut args)?),
            "-p" => parse_dac(args.required("-p")?)?,
            "-s" => Command::ReadState,
            other => return Err(Error::UnknownOption(other.to_string())),
        };

        args.finish()?;
        Ok(Self::Run(command))
    }
}

impl Command {
    /// Map a `-f` value to its command.
    #[must_use]
    pub fn from_frequency(hz: f32) -> Self {
        if hz <= 0.0 { Self::SwitchOff } else { Self::SetFrequency { hz } }
    }

    /// Map a `-p` value to its command.
    #[must_use]
    pub fn from_dac(millivolts: i64) -> Self {
        match u16::try_from(millivolts) {
            Ok(mv) if (DAC_MIN_MV..=DAC_MAX_MV).contains(&millivolts) => {
                Self::SetDac { millivolts: mv }
            }
            _ => Self::DisableDac,
        }
    }
}

impl McuCommand {
    fn parse(args: &mut Args<'_>) -> Result<Self> {
        let sub = args.required("-mc")?;
        let command = match sub {
            "clear" => Self::Clear,
            "pulse" => {
                Self::PulseSpacing { value: parse_number("-mc pulse", args.required("-mc pulse")?)? }
            }
            "start" => Self::Start,
            "file" => Self::LoadFile { path: args.take().map(PathBuf::from) },
            "time" => {
                Self::Timer { period_ms: parse_number("-mc time", args.required("-mc time")?)? }
            }
            "ext" => Self::ExternalInterrupt,
            other => return Err(Error::UnknownMcuCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// Device word for `-mc pulse`: `(value - 440) / 180`, truncating toward zero.
#[must_use]
pub fn pulse_spacing(value: i32) -> i32 {
    value.saturating_sub(440) / 180
}

struct Args<'a> {
    rest: Vec<&'a str>,
    pos: usize,
}

impl<'a> Args<'a> {
    fn take(&mut self) -> Option<&'a str> {
        let arg = self.rest.get(self.pos).copied();
        if arg.is_some() {
            self.pos += 1;
        }
        arg
    }

    fn required(&mut self, option: &'static str) -> Result<&'a str> {
        self.take().ok_or(Error::MissingArgument(option))
    }

    fn finish(&mut self) -> Result<()> {
        match self.take() {
            Some(extra) => Err(Error::UnexpectedArgument(extra.to_string())),
            None => Ok(()),
        }
    }
}

fn parse_frequency(value: &str) -> Result<f32> {
    match value.trim().parse::<f32>() {
        Ok(hz) if hz.is_finite() => Ok(hz),
        _ => Err(Error::InvalidNumber { option: "-f", value: value.to_string() }),
    }
}

/// Any integer is a valid `-p` value; those too large for `i64` are simply
/// out of the DAC range.
fn parse_dac(value: &str) -> Result<Command> {
    match value.trim().parse::<i64>() {
        Ok(millivolts) => Ok(Command::from_dac(millivolts)),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Ok(Command::DisableDac)
        }
        Err(_) => Err(Error::InvalidNumber { option: "-p", value: value.to_string() }),
    }
}

fn parse_number<T: std::str::FromStr>(option: &'static str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidNumber { option, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        Invocation::parse(args)
    }

    fn run(args: &[&str]) -> Command {
        match parse(args).expect("parse failed") {
            Invocation::Run(command) => command,
            Invocation::Usage => panic!("expected a command for {args:?}"),
        }
    }

    #[test]
    fn test_no_arguments_is_usage() {
        assert_eq!(parse(&[]).unwrap(), Invocation::Usage);
        assert_eq!(parse(&["--help"]).unwrap(), Invocation::Usage);
    }

    #[test]
    fn test_frequency_dispatch() {
        assert_eq!(run(&["-f", "1000"]), Command::SetFrequency { hz: 1000.0 });
        assert_eq!(run(&["-f", "0"]), Command::SwitchOff);
        assert_eq!(run(&["-f", "-5"]), Command::SwitchOff);
    }

    #[test]
    fn test_frequency_rejects_garbage() {
        assert_matches!(parse(&["-f", "fast"]), Err(Error::InvalidNumber { option: "-f", .. }));
        assert_matches!(parse(&["-f", "NaN"]), Err(Error::InvalidNumber { .. }));
        assert_matches!(parse(&["-f"]), Err(Error::MissingArgument("-f")));
    }

    #[test]
    fn test_simple_flags() {
        assert_eq!(run(&["-off"]), Command::TurnOff);
        assert_eq!(run(&["-on"]), Command::TurnOn);
        assert_eq!(run(&["-s"]), Command::ReadState);
    }

    #[test]
    fn test_mcu_sub_commands() {
        assert_eq!(run(&["-mc", "clear"]), Command::Mcu(McuCommand::Clear));
        assert_eq!(run(&["-mc", "start"]), Command::Mcu(McuCommand::Start));
        assert_eq!(run(&["-mc", "ext"]), Command::Mcu(McuCommand::ExternalInterrupt));
        assert_eq!(
            run(&["-mc", "pulse", "800"]),
            Command::Mcu(McuCommand::PulseSpacing { value: 800 })
        );
        assert_eq!(
            run(&["-mc", "time", "250"]),
            Command::Mcu(McuCommand::Timer { period_ms: 250 })
        );
    }

    #[test]
    fn test_mcu_file_with_and_without_name() {
        assert_eq!(
            run(&["-mc", "file", "pattern.txt"]),
            Command::Mcu(McuCommand::LoadFile { path: Some(PathBuf::from("pattern.txt")) })
        );
        assert_eq!(run(&["-mc", "file"]), Command::Mcu(McuCommand::LoadFile { path: None }));
    }

    #[test]
    fn test_mcu_errors() {
        assert_matches!(parse(&["-mc"]), Err(Error::MissingArgument("-mc")));
        assert_matches!(parse(&["-mc", "warp"]), Err(Error::UnknownMcuCommand(s)) if s == "warp");
        assert_matches!(parse(&["-mc", "pulse"]), Err(Error::MissingArgument("-mc pulse")));
        assert_matches!(parse(&["-mc", "time", "-3"]), Err(Error::InvalidNumber { .. }));
    }

    #[test]
    fn test_unknown_and_trailing_arguments() {
        assert_matches!(parse(&["-x"]), Err(Error::UnknownOption(s)) if s == "-x");
        assert_matches!(parse(&["-off", "now"]), Err(Error::UnexpectedArgument(s)) if s == "now");
    }

    #[test]
    fn test_dac_boundaries() {
        assert_eq!(run(&["-p", "0"]), Command::SetDac { millivolts: 0 });
        assert_eq!(run(&["-p", "3299"]), Command::SetDac { millivolts: 3299 });
        assert_eq!(run(&["-p", "3300"]), Command::DisableDac);
        assert_eq!(run(&["-p", "-1"]), Command::DisableDac);
    }

    #[test]
    fn test_dac_beyond_machine_integers() {
        assert_eq!(run(&["-p", "4294967296"]), Command::DisableDac);
        assert_eq!(run(&["-p", "-99999999999999999999999"]), Command::DisableDac);
        assert_eq!(run(&["-p", "123456789012345678901234567890"]), Command::DisableDac);
        assert_matches!(parse(&["-p", "3.3"]), Err(Error::InvalidNumber { option: "-p", .. }));
        assert_matches!(parse(&["-p", "high"]), Err(Error::InvalidNumber { option: "-p", .. }));
    }

    #[test]
    fn test_pulse_spacing_truncates() {
        assert_eq!(pulse_spacing(440), 0);
        assert_eq!(pulse_spacing(620), 1);
        assert_eq!(pulse_spacing(619), 0);
        assert_eq!(pulse_spacing(800), 2);
        // Truncation toward zero below the offset
        assert_eq!(pulse_spacing(300), 0);
        assert_eq!(pulse_spacing(260), -1);
    }

    proptest! {
        #[test]
        fn prop_frequency_splits_on_zero(hz in -1.0e9f32..1.0e9f32) {
            let command = Command::from_frequency(hz);
            if hz <= 0.0 {
                prop_assert_eq!(command, Command::SwitchOff);
            } else {
                prop_assert_eq!(command, Command::SetFrequency { hz });
            }
        }

        #[test]
        fn prop_dac_range(value in any::<i128>()) {
            let command = run(&["-p", &value.to_string()]);
            if (0..=3299).contains(&value) {
                prop_assert_eq!(command, Command::SetDac { millivolts: u16::try_from(value).unwrap() });
            } else {
                prop_assert_eq!(command, Command::DisableDac);
            }
        }

        #[test]
        fn prop_dac_near_range(value in -10_000i64..10_000) {
            let command = Command::from_dac(value);
            if (0..=3299).contains(&value) {
                prop_assert_eq!(command, Command::SetDac { millivolts: u16::try_from(value).unwrap() });
            } else {
                prop_assert_eq!(command, Command::DisableDac);
            }
        }

        #[test]
        fn prop_pulse_spacing_matches_integer_division(value in -1_000_000i32..1_000_000) {
            prop_assert_eq!(pulse_spacing(value), (value - 440) / 180);
        }
    }
}
