//! Tune file reader and parser

use super::header::{
    StreamHeader, TuneHeader, FLAG_CLIP_CHECK, FORMAT_VERSION, GZIP_MAGIC, MAGIC,
    STREAM_HEADER_SIZE,
};
use crate::codec::distribution::{Field, RefTable};
use crate::codec::PackedTune;
use crate::error::{Error, Result};
use crate::sequencer::frame::{Frame, FRAME_SIZE};
use crate::sequencer::source::ReaderSource;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

/// Byte cursor over a tune image
pub struct TuneReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TuneReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Check if we've reached the end of data
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::Format("unexpected end of data".into()))?;
        self.pos += 1;
        Ok(b)
    }

    /// Read a 16-bit little-endian value
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok(lo | (hi << 8))
    }

    /// Read a 32-bit little-endian value
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let lo = self.read_u16_le()? as u32;
        let hi = self.read_u16_le()? as u32;
        Ok(lo | (hi << 16))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::Format("unexpected end of data".into()))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Everything not consumed yet
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Parse the magic and header of a packed tune
    pub fn parse_tune_header(&mut self) -> Result<TuneHeader> {
        if self.read_bytes(MAGIC.len())? != MAGIC {
            return Err(Error::Format("invalid packed tune magic".into()));
        }
        let version = self.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(Error::Format(format!(
                "unsupported packed tune version {}",
                version
            )));
        }
        let flags = self.read_u8()?;
        let sample_rate = self.read_u16_le()?;
        let voice_count = self.read_u8()?;
        Ok(TuneHeader {
            version,
            clip_check: flags & FLAG_CLIP_CHECK != 0,
            sample_rate,
            voice_count,
        })
    }

    /// Parse a whole packed tune
    pub fn parse_packed(&mut self) -> Result<(TuneHeader, PackedTune)> {
        let header = self.parse_tune_header()?;

        let mut tables = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            tables.push(self.parse_table(field)?);
        }
        let tables: [RefTable; 4] = tables
            .try_into()
            .map_err(|_| Error::Format("wrong number of reference tables".into()))?;

        let data_size = self.read_u32_le()? as usize;
        let data = self.read_bytes(data_size)?.to_vec();
        if !self.is_eof() {
            return Err(Error::Format(format!(
                "{} trailing bytes after packed data",
                self.data.len() - self.pos
            )));
        }

        Ok((header, PackedTune::from_parts(tables, data)?))
    }

    fn parse_table(&mut self, field: Field) -> Result<RefTable> {
        let bit_count = self.read_u8()?;
        let count = self.read_u16_le()? as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let value = match field.value_size() {
                2 => self.read_u16_le()?,
                _ => self.read_u8()? as u16,
            };
            values.push(value);
        }

        let table = RefTable::from_values(values)?;
        if table.bit_count != bit_count {
            return Err(Error::Format(format!(
                "{} table of {} values declares {} bits",
                field.name(),
                count,
                bit_count
            )));
        }
        Ok(table)
    }

    /// Parse the header of an uncompressed stream
    pub fn parse_stream_header(&mut self) -> Result<StreamHeader> {
        Ok(StreamHeader {
            sample_rate: self.read_u16_le()?,
            frame_size: self.read_u8()?,
            voice_count: self.read_u8()?,
        })
    }
}

/// A loaded tune file of either kind
#[derive(Debug, Clone)]
pub enum TuneFile {
    Packed {
        header: TuneHeader,
        tune: PackedTune,
    },
    /// Uncompressed stream; records are read lazily at playback
    Stream {
        header: StreamHeader,
        records: Vec<u8>,
    },
}

impl TuneFile {
    /// Parse a decompressed file image
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = TuneReader::new(data);
        if data.starts_with(MAGIC) {
            let (header, tune) = reader.parse_packed()?;
            return Ok(Self::Packed { header, tune });
        }
        if data.len() < STREAM_HEADER_SIZE {
            return Err(Error::Format("file too small for a stream header".into()));
        }
        let header = reader.parse_stream_header()?;
        Ok(Self::Stream {
            header,
            records: reader.remaining().to_vec(),
        })
    }

    pub fn sample_rate(&self) -> u16 {
        match self {
            Self::Packed { header, .. } => header.sample_rate,
            Self::Stream { header, .. } => header.sample_rate,
        }
    }

    pub fn voice_count(&self) -> u8 {
        match self {
            Self::Packed { header, .. } => header.voice_count,
            Self::Stream { header, .. } => header.voice_count,
        }
    }

    /// Every frame of the file, up to and including the sentinel
    pub fn frames(&self) -> Vec<Frame> {
        match self {
            Self::Packed { tune, .. } => tune.decode_all(),
            Self::Stream { records, .. } => {
                let mut frames: Vec<Frame> = records
                    .chunks_exact(FRAME_SIZE)
                    .filter_map(|chunk| <&[u8; FRAME_SIZE]>::try_from(chunk).ok())
                    .map(Frame::from_record)
                    .take_while(|frame| !frame.is_sentinel())
                    .collect();
                frames.push(Frame::SENTINEL);
                frames
            }
        }
    }
}

/// Frame source over uncompressed stream records
pub fn record_source(records: &[u8]) -> ReaderSource<&[u8]> {
    ReaderSource::new(records)
}

/// Read a tune file, inflating it when gzip-compressed
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    if data.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(Cursor::new(data));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    } else {
        Ok(data)
    }
}

/// Load and parse a tune file
pub fn load_file(path: &Path) -> Result<TuneFile> {
    TuneFile::parse(&read_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tune::writer::TuneWriter;

    fn packed_image(frames: &[Frame]) -> (PackedTune, Vec<u8>) {
        let tune = PackedTune::encode(frames).unwrap();
        let mut writer = TuneWriter::new(Vec::new());
        writer
            .write_packed(&TuneHeader::new(8000, 2, true), &tune)
            .unwrap();
        (tune, writer.finish().unwrap())
    }

    #[test]
    fn test_read_integers() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut reader = TuneReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0x12345678);
        assert!(reader.is_eof());
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_parse_packed() {
        let frames = [
            Frame::new(3, 20, 40, 300).unwrap(),
            Frame::new(6, 32, -40, 150).unwrap(),
        ];
        let (tune, image) = packed_image(&frames);
        match TuneFile::parse(&image).unwrap() {
            TuneFile::Packed { header, tune: parsed } => {
                assert_eq!(header, TuneHeader::new(8000, 2, true));
                assert_eq!(parsed, tune);
            }
            other => panic!("expected a packed tune, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_packed() {
        let (_, image) = packed_image(&[Frame::new(3, 20, 40, 300).unwrap()]);
        for len in [3, 9, 12, image.len() - 1] {
            assert!(TuneFile::parse(&image[..len]).is_err(), "length {}", len);
        }
    }

    #[test]
    fn test_bad_version() {
        let (_, mut image) = packed_image(&[Frame::new(3, 20, 40, 300).unwrap()]);
        image[4] = FORMAT_VERSION + 1;
        assert!(matches!(TuneFile::parse(&image), Err(Error::Format(_))));
    }

    #[test]
    fn test_parse_stream() {
        let frames = [Frame::new(3, 20, 40, 300).unwrap()];
        let mut writer = TuneWriter::new(Vec::new());
        writer
            .write_stream(&StreamHeader::new(8000, 1), &frames)
            .unwrap();
        let file = TuneFile::parse(&writer.finish().unwrap()).unwrap();
        assert_eq!(file.sample_rate(), 8000);
        assert_eq!(file.voice_count(), 1);
        assert_eq!(file.frames(), vec![frames[0], Frame::SENTINEL]);
        assert!(TuneFile::parse(&[0x40, 0x1f]).is_err());
    }
}
