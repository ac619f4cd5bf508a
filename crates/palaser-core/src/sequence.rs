//! MCU sequence files.
//!
//! A sequence file describes the bit pattern the board's MCU plays back on
//! each output channel:
//!
//! ```text
//! freq: 2                    // pulse frequency parameter
//! seqLength: 344             // length of the sequence
//! CH number: 2               // number of output channels
//! CH1:
//! 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 ;
//! 0x10 0x11 ;
//! CH2:
//! 255 0 255 0 ;
//! ```
//!
//! Channel data rows end with `;`. Bytes are decimal or `0x` hex.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Maximum number of output channels on the board.
pub const MAX_CHANNELS: usize = 8;
/// Maximum number of pattern bytes per channel.
pub const MAX_CHANNEL_BYTES: usize = 128;

/// Sequence file parse error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("line {line}: unrecognized content {text:?}")]
    Unrecognized { line: usize, text: String },

    #[error("line {line}: invalid value for {marker}: {value:?}")]
    InvalidValue { line: usize, marker: &'static str, value: String },

    #[error("line {line}: {marker} given twice")]
    DuplicateMarker { line: usize, marker: &'static str },

    #[error("missing {0} marker")]
    MissingMarker(&'static str),

    #[error("line {line}: channel count {count} out of range (1-8)")]
    ChannelCountOutOfRange { line: usize, count: usize },

    #[error("line {line}: channel CH{channel} not declared by CH number")]
    UndeclaredChannel { line: usize, channel: usize },

    #[error("line {line}: channel CH{channel} given twice")]
    DuplicateChannel { line: usize, channel: usize },

    #[error("channel CH{0} has no data")]
    MissingChannel(usize),

    #[error("line {line}: data before any channel marker")]
    DataOutsideChannel { line: usize },

    #[error("line {line}: invalid byte {value:?}")]
    InvalidByte { line: usize, value: String },

    #[error("line {line}: data row not terminated by ';'")]
    UnterminatedRow { line: usize },

    #[error("line {line}: channel CH{channel} holds {len} bytes (max 128)")]
    ChannelTooLong { line: usize, channel: usize, len: usize },
}

/// A parsed MCU sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// Pulse frequency parameter (`freq:`)
    pub frequency: u16,
    /// Sequence length parameter (`seqLength:`)
    pub length: u16,
    /// Pattern bytes, index 0 is `CH1`
    pub channels: Vec<Vec<u8>>,
}

impl Sequence {
    /// Read and parse a sequence file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let sequence = content.parse::<Self>()?;
        debug!(?path, channels = sequence.channels.len(), "Sequence file parsed");
        Ok(sequence)
    }
}

impl std::str::FromStr for Sequence {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::default();
        for (idx, raw) in s.lines().enumerate() {
            parser.line(idx + 1, raw)?;
        }
        parser.finish()
    }
}

#[derive(Default)]
struct Parser {
    frequency: Option<u16>,
    length: Option<u16>,
    channel_count: Option<usize>,
    channels: Vec<Option<Vec<u8>>>,
    current: Option<usize>,
}

impl Parser {
    fn line(&mut self, line: usize, raw: &str) -> Result<(), SequenceError> {
        let text = raw.split("//").next().unwrap_or_default().trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Some((marker, value)) = text.split_once(':') {
            let (marker, value) = (marker.trim(), value.trim());
            return match marker {
                "freq" => set_once(&mut self.frequency, line, "freq", parse_u16(line, "freq", value)?),
                "seqLength" => {
                    set_once(&mut self.length, line, "seqLength", parse_u16(line, "seqLength", value)?)
                }
                "CH number" => self.declare_channels(line, value),
                _ => self.open_channel(line, marker, value, text),
            };
        }

        self.data_row(line, text)
    }

    fn declare_channels(&mut self, line: usize, value: &str) -> Result<(), SequenceError> {
        let count = value.parse::<usize>().map_err(|_| SequenceError::InvalidValue {
            line,
            marker: "CH number",
            value: value.to_string(),
        })?;
        if !(1..=MAX_CHANNELS).contains(&count) {
            return Err(SequenceError::ChannelCountOutOfRange { line, count });
        }
        set_once(&mut self.channel_count, line, "CH number", count)?;
        self.channels = vec![None; count];
        Ok(())
    }

    fn open_channel(
        &mut self,
        line: usize,
        marker: &str,
        rest: &str,
        text: &str,
    ) -> Result<(), SequenceError> {
        let channel = marker
            .strip_prefix("CH")
            .and_then(|n| n.trim().parse::<usize>().ok())
            .ok_or_else(|| SequenceError::Unrecognized { line, text: text.to_string() })?;

        if channel == 0 || channel > self.channels.len() {
            return Err(SequenceError::UndeclaredChannel { line, channel });
        }
        let slot = &mut self.channels[channel - 1];
        if slot.is_some() {
            return Err(SequenceError::DuplicateChannel { line, channel });
        }
        *slot = Some(Vec::new());
        self.current = Some(channel);

        if rest.is_empty() { Ok(()) } else { self.data_row(line, rest) }
    }

    fn data_row(&mut self, line: usize, text: &str) -> Result<(), SequenceError> {
        let Some(channel) = self.current else {
            return Err(SequenceError::DataOutsideChannel { line });
        };
        let Some(body) = text.strip_suffix(';') else {
            return Err(SequenceError::UnterminatedRow { line });
        };

        let data = self.channels[channel - 1].get_or_insert_with(Vec::new);
        for token in body.split_whitespace() {
            data.push(parse_byte(line, token)?);
        }
        if data.len() > MAX_CHANNEL_BYTES {
            return Err(SequenceError::ChannelTooLong { line, channel, len: data.len() });
        }
        Ok(())
    }

    fn finish(self) -> Result<Sequence, SequenceError> {
        let frequency = self.frequency.ok_or(SequenceError::MissingMarker("freq"))?;
        let length = self.length.ok_or(SequenceError::MissingMarker("seqLength"))?;
        if self.channel_count.is_none() {
            return Err(SequenceError::MissingMarker("CH number"));
        }

        let channels = self
            .channels
            .into_iter()
            .enumerate()
            .map(|(idx, data)| data.ok_or(SequenceError::MissingChannel(idx + 1)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Sequence { frequency, length, channels })
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    line: usize,
    marker: &'static str,
    value: T,
) -> Result<(), SequenceError> {
    if slot.is_some() {
        return Err(SequenceError::DuplicateMarker { line, marker });
    }
    *slot = Some(value);
    Ok(())
}

fn parse_u16(line: usize, marker: &'static str, value: &str) -> Result<u16, SequenceError> {
    value
        .parse()
        .map_err(|_| SequenceError::InvalidValue { line, marker, value: value.to_string() })
}

fn parse_byte(line: usize, token: &str) -> Result<u8, SequenceError> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| SequenceError::InvalidByte { line, value: token.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    const TWO_CHANNELS: &str = "\
freq: 2                // marker for freq parameter
seqLength: 344
CH number: 2

CH1:
0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 ;
0x10 0xff ;
CH2:
255 0 ;
";

    #[test]
    fn test_parse_documented_layout() {
        let seq: Sequence = TWO_CHANNELS.parse().expect("Failed to parse sequence");

        assert_eq!(seq.frequency, 2);
        assert_eq!(seq.length, 344);
        assert_eq!(seq.channels.len(), 2);
        assert_eq!(seq.channels[0].len(), 18);
        assert_eq!(&seq.channels[0][16..], &[0x10, 0xff]);
        assert_eq!(seq.channels[1], vec![255, 0]);
    }

    #[test]
    fn test_data_on_marker_line() {
        let seq: Sequence = "freq: 1\nseqLength: 8\nCH number: 1\nCH1: 1 2 3 ;\n".parse().unwrap();
        assert_eq!(seq.channels, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_missing_markers() {
        assert_eq!(
            "seqLength: 1\nCH number: 1\nCH1:\n1 ;".parse::<Sequence>(),
            Err(SequenceError::MissingMarker("freq"))
        );
        assert_eq!(
            "freq: 1\nseqLength: 1\n".parse::<Sequence>(),
            Err(SequenceError::MissingMarker("CH number"))
        );
    }

    #[test]
    fn test_missing_channel_data() {
        let result = "freq: 1\nseqLength: 1\nCH number: 2\nCH1:\n1 ;\n".parse::<Sequence>();
        assert_eq!(result, Err(SequenceError::MissingChannel(2)));
    }

    #[test]
    fn test_channel_errors_carry_line() {
        let undeclared = "freq: 1\nseqLength: 1\nCH number: 1\nCH2:\n".parse::<Sequence>();
        assert_eq!(undeclared, Err(SequenceError::UndeclaredChannel { line: 4, channel: 2 }));

        let duplicate = "freq: 1\nseqLength: 1\nCH number: 1\nCH1:\n1 ;\nCH1:\n".parse::<Sequence>();
        assert_eq!(duplicate, Err(SequenceError::DuplicateChannel { line: 6, channel: 1 }));

        let count = "CH number: 9\n".parse::<Sequence>();
        assert_eq!(count, Err(SequenceError::ChannelCountOutOfRange { line: 1, count: 9 }));
    }

    #[test]
    fn test_row_errors() {
        assert_matches!(
            "freq: 1\nseqLength: 1\nCH number: 1\nCH1:\n1 2\n".parse::<Sequence>(),
            Err(SequenceError::UnterminatedRow { line: 5 })
        );
        assert_matches!(
            "freq: 1\nseqLength: 1\nCH number: 1\nCH1:\n1 256 ;\n".parse::<Sequence>(),
            Err(SequenceError::InvalidByte { line: 5, value }) if value == "256"
        );
        assert_matches!(
            "freq: 1\n1 2 ;\n".parse::<Sequence>(),
            Err(SequenceError::DataOutsideChannel { line: 2 })
        );
    }

    #[test]
    fn test_invalid_header_values() {
        assert_matches!(
            "freq: 70000\n".parse::<Sequence>(),
            Err(SequenceError::InvalidValue { line: 1, marker: "freq", .. })
        );
        assert_matches!(
            "freq: 1\nfreq: 2\n".parse::<Sequence>(),
            Err(SequenceError::DuplicateMarker { line: 2, marker: "freq" })
        );
        assert_matches!(
            "bogus line\n".parse::<Sequence>(),
            Err(SequenceError::DataOutsideChannel { line: 1 })
        );
        assert_matches!(
            "speed: 3\n".parse::<Sequence>(),
            Err(SequenceError::Unrecognized { line: 1, .. })
        );
    }

    #[test]
    fn test_channel_too_long() {
        let row = "1 ".repeat(MAX_CHANNEL_BYTES);
        let text = format!("freq: 1\nseqLength: 1\nCH number: 1\nCH1:\n{row};\n2 ;\n");
        let err = text.parse::<Sequence>().unwrap_err();
        assert_eq!(
            err,
            SequenceError::ChannelTooLong { line: 6, channel: 1, len: MAX_CHANNEL_BYTES + 1 }
        );
        assert!(err.to_string().starts_with("line 6: "));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(TWO_CHANNELS.as_bytes()).expect("Failed to write temp file");

        let seq = Sequence::load(file.path()).expect("Failed to load sequence");
        assert_eq!(seq.channels.len(), 2);
    }

    #[test]
    fn test_load_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"freq: x\n").unwrap();

        assert_matches!(
            Sequence::load(file.path()),
            Err(crate::Error::Sequence(SequenceError::InvalidValue { marker: "freq", .. }))
        );
    }
}
