//! Sequencer frames: one note event per frame
//!
//! A frame pairs the envelope definition with the waveform definition that a
//! voice is reconfigured with when it becomes free.

use crate::error::{Error, Result};
use crate::synth::envelope::{DECAY_END, MAX_TIME_UNIT};
use serde::{Deserialize, Serialize};

/// Size in bytes of one uncompressed frame record
pub const FRAME_SIZE: usize = 6;

/// Envelope definition carried by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnvelopeDef {
    /// Samples per time unit (zero marks the end of a channel)
    pub time_scale: u16,
    /// Time unit at which the release phase begins
    pub release_start: u8,
}

/// Waveform definition carried by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WaveformDef {
    /// Peak amplitude (7-bit signed)
    pub amplitude: i8,
    /// Full period in 12.4 fixed-point samples, zero for rests
    pub period: u16,
}

/// One note event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(flatten)]
    pub envelope: EnvelopeDef,
    #[serde(flatten)]
    pub waveform: WaveformDef,
}

impl Frame {
    /// The all-zero end-of-stream marker
    pub const SENTINEL: Frame = Frame {
        envelope: EnvelopeDef {
            time_scale: 0,
            release_start: 0,
        },
        waveform: WaveformDef {
            amplitude: 0,
            period: 0,
        },
    };

    /// Build a validated note frame.
    ///
    /// Rejects anything that could be mistaken for the sentinel or that the
    /// envelope generator cannot represent.
    pub fn new(time_scale: u16, release_start: u8, amplitude: i8, period: u16) -> Result<Self> {
        let frame = Self {
            envelope: EnvelopeDef {
                time_scale,
                release_start,
            },
            waveform: WaveformDef { amplitude, period },
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check that a note frame is playable and distinct from the sentinel
    pub fn validate(&self) -> Result<()> {
        if self.envelope.time_scale == 0 {
            return Err(Error::OutOfRange(
                "time scale must be non-zero for a note".into(),
            ));
        }
        let release_start = self.envelope.release_start;
        if !(DECAY_END..=MAX_TIME_UNIT).contains(&release_start) {
            return Err(Error::OutOfRange(format!(
                "release start {} outside {}..={}",
                release_start, DECAY_END, MAX_TIME_UNIT
            )));
        }
        if self.waveform.amplitude == i8::MIN {
            return Err(Error::OutOfRange("amplitude must be within -127..=127".into()));
        }
        Ok(())
    }

    /// Build a silent frame that still occupies a voice for its duration
    pub fn rest(time_scale: u16, release_start: u8) -> Result<Self> {
        Self::new(time_scale, release_start, 0, 0)
    }

    /// Whether this frame terminates the stream
    pub fn is_sentinel(&self) -> bool {
        self.envelope.time_scale == 0
    }

    /// Encode as an uncompressed record:
    /// `time_scale: u16 LE, release_start: u8, amplitude: i8, period: u16 LE`
    pub fn to_record(&self) -> [u8; FRAME_SIZE] {
        let ts = self.envelope.time_scale.to_le_bytes();
        let period = self.waveform.period.to_le_bytes();
        [
            ts[0],
            ts[1],
            self.envelope.release_start,
            self.waveform.amplitude as u8,
            period[0],
            period[1],
        ]
    }

    /// Decode an uncompressed record
    pub fn from_record(record: &[u8; FRAME_SIZE]) -> Self {
        Self {
            envelope: EnvelopeDef {
                time_scale: u16::from_le_bytes([record[0], record[1]]),
                release_start: record[2],
            },
            waveform: WaveformDef {
                amplitude: record[3] as i8,
                period: u16::from_le_bytes([record[4], record[5]]),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_all_zero() {
        assert!(Frame::SENTINEL.is_sentinel());
        assert_eq!(Frame::SENTINEL, Frame::default());
        assert_eq!(Frame::SENTINEL.to_record(), [0; FRAME_SIZE]);
    }

    #[test]
    fn test_note_validation() {
        assert!(Frame::new(0, 40, 100, 200).is_err());
        assert!(Frame::new(10, DECAY_END - 1, 100, 200).is_err());
        assert!(Frame::new(10, MAX_TIME_UNIT + 1, 100, 200).is_err());
        assert!(Frame::new(10, 40, i8::MIN, 200).is_err());

        let frame = Frame::new(10, 40, -100, 200).unwrap();
        assert!(!frame.is_sentinel());
        assert_eq!(frame.waveform.amplitude, -100);
    }

    #[test]
    fn test_record_layout() {
        let frame = Frame::new(0x1234, 0x27, -2, 0xABCD).unwrap();
        let record = frame.to_record();
        assert_eq!(record, [0x34, 0x12, 0x27, 0xFE, 0xCD, 0xAB]);
        assert_eq!(Frame::from_record(&record), frame);
    }

    #[test]
    fn test_json_is_flat() {
        let frame = Frame::new(18, 39, 120, 0x4a).unwrap();
        let json = serde_json::to_value(frame).unwrap();
        assert_eq!(json["time_scale"], 18);
        assert_eq!(json["release_start"], 39);
        assert_eq!(json["amplitude"], 120);
        assert_eq!(json["period"], 0x4a);
    }
}
