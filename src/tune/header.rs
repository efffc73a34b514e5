//! Tune file headers

use crate::error::{Error, Result};
use crate::sequencer::frame::FRAME_SIZE;
use crate::synth::SynthConfig;

/// Packed tune identifier
pub const MAGIC: &[u8; 4] = b"PTUN";

/// Packed tune format version
pub const FORMAT_VERSION: u8 = 1;

/// Header flag: the tune clips and needs saturating mixing
pub const FLAG_CLIP_CHECK: u8 = 0x01;

/// gzip member identifier
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Bytes in an uncompressed stream header
pub const STREAM_HEADER_SIZE: usize = 4;

/// Bytes in a packed tune header
pub const TUNE_HEADER_SIZE: usize = 9;

/// Header of an uncompressed frame stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub sample_rate: u16,
    pub frame_size: u8,
    pub voice_count: u8,
}

impl StreamHeader {
    pub fn new(sample_rate: u16, voice_count: u8) -> Self {
        Self {
            sample_rate,
            frame_size: FRAME_SIZE as u8,
            voice_count,
        }
    }

    pub fn to_bytes(&self) -> [u8; STREAM_HEADER_SIZE] {
        let rate = self.sample_rate.to_le_bytes();
        [rate[0], rate[1], self.frame_size, self.voice_count]
    }

    /// Reject a stream built for a different synth
    pub fn check(&self, config: &SynthConfig) -> Result<()> {
        check_field("sample rate", config.sample_rate() as u32, self.sample_rate as u32)?;
        check_field("frame size", FRAME_SIZE as u32, self.frame_size as u32)?;
        check_field("voice count", config.voice_count() as u32, self.voice_count as u32)
    }
}

/// Header of a packed tune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneHeader {
    pub version: u8,
    pub clip_check: bool,
    pub sample_rate: u16,
    pub voice_count: u8,
}

impl TuneHeader {
    pub fn new(sample_rate: u16, voice_count: u8, clip_check: bool) -> Self {
        Self {
            version: FORMAT_VERSION,
            clip_check,
            sample_rate,
            voice_count,
        }
    }

    pub fn flags(&self) -> u8 {
        if self.clip_check {
            FLAG_CLIP_CHECK
        } else {
            0
        }
    }

    pub fn to_bytes(&self) -> [u8; TUNE_HEADER_SIZE] {
        let rate = self.sample_rate.to_le_bytes();
        [
            MAGIC[0],
            MAGIC[1],
            MAGIC[2],
            MAGIC[3],
            self.version,
            self.flags(),
            rate[0],
            rate[1],
            self.voice_count,
        ]
    }

    /// Reject a tune built for a different synth
    pub fn check(&self, config: &SynthConfig) -> Result<()> {
        check_field("sample rate", config.sample_rate() as u32, self.sample_rate as u32)?;
        check_field("voice count", config.voice_count() as u32, self.voice_count as u32)
    }
}

fn check_field(what: &'static str, expected: u32, found: u32) -> Result<()> {
    if expected != found {
        return Err(Error::ConfigMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_header_bytes() {
        let header = StreamHeader::new(8000, 3);
        assert_eq!(header.to_bytes(), [0x40, 0x1f, 6, 3]);
    }

    #[test]
    fn test_tune_header_bytes() {
        let header = TuneHeader::new(16000, 2, true);
        assert_eq!(
            header.to_bytes(),
            [b'P', b'T', b'U', b'N', FORMAT_VERSION, FLAG_CLIP_CHECK, 0x80, 0x3e, 2]
        );
        assert_eq!(TuneHeader::new(16000, 2, false).flags(), 0);
    }

    #[test]
    fn test_check() {
        let config = SynthConfig::builder()
            .sample_rate(8000)
            .voices(2)
            .build()
            .unwrap();
        assert!(StreamHeader::new(8000, 2).check(&config).is_ok());
        assert!(matches!(
            StreamHeader::new(8000, 3).check(&config),
            Err(Error::ConfigMismatch {
                what: "voice count",
                expected: 2,
                found: 3
            })
        ));
        let mut header = StreamHeader::new(8000, 2);
        header.frame_size = 4;
        assert!(matches!(
            header.check(&config),
            Err(Error::ConfigMismatch {
                what: "frame size",
                ..
            })
        ));
        assert!(matches!(
            TuneHeader::new(11025, 2, false).check(&config),
            Err(Error::ConfigMismatch {
                what: "sample rate",
                ..
            })
        ));
    }
}
