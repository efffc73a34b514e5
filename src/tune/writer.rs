//! Tune file writer

use super::header::{StreamHeader, TuneHeader};
use crate::codec::distribution::Field;
use crate::codec::PackedTune;
use crate::error::{Error, Result};
use crate::sequencer::frame::Frame;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serializes tunes into any byte sink
pub struct TuneWriter<W: Write> {
    out: W,
    /// Bytes written so far
    written: u64,
}

impl<W: Write> TuneWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Write raw bytes
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_data(&[value])
    }

    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.write_data(&value.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_data(&value.to_le_bytes())
    }

    /// Write a packed tune: header, reference tables, data
    pub fn write_packed(&mut self, header: &TuneHeader, tune: &PackedTune) -> Result<()> {
        self.write_data(&header.to_bytes())?;

        for field in Field::ALL {
            let table = tune.table(field);
            self.write_u8(table.bit_count)?;
            self.write_u16_le(table.len() as u16)?;
            for &value in &table.values {
                match field.value_size() {
                    2 => self.write_u16_le(value)?,
                    _ => self.write_u8(value as u8)?,
                }
            }
        }

        let data_size = u32::try_from(tune.data_size())
            .map_err(|_| Error::Format("packed data larger than 4 GiB".into()))?;
        self.write_u32_le(data_size)?;
        self.write_data(tune.data())
    }

    /// Write an uncompressed stream, closing it with the sentinel record
    pub fn write_stream(&mut self, header: &StreamHeader, frames: &[Frame]) -> Result<()> {
        self.write_data(&header.to_bytes())?;
        for frame in frames {
            self.write_data(&frame.to_record())?;
        }
        if !frames.last().is_some_and(Frame::is_sentinel) {
            self.write_data(&Frame::SENTINEL.to_record())?;
        }
        Ok(())
    }

    /// Get current position
    pub fn position(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Save a packed tune, optionally gzip-compressed
pub fn save_packed(path: &Path, header: &TuneHeader, tune: &PackedTune, gzip: bool) -> Result<()> {
    let mut writer = TuneWriter::new(Vec::new());
    writer.write_packed(header, tune)?;
    write_file(path, &writer.finish()?, gzip)
}

/// Save an uncompressed frame stream, optionally gzip-compressed
pub fn save_stream(path: &Path, header: &StreamHeader, frames: &[Frame], gzip: bool) -> Result<()> {
    let mut writer = TuneWriter::new(Vec::new());
    writer.write_stream(header, frames)?;
    write_file(path, &writer.finish()?, gzip)
}

fn write_file(path: &Path, bytes: &[u8], gzip: bool) -> Result<()> {
    let file = File::create(path)?;
    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::best());
        encoder.write_all(bytes)?;
        encoder.finish()?;
    } else {
        let mut out = BufWriter::new(file);
        out.write_all(bytes)?;
        out.flush()?;
    }
    Ok(())
}
