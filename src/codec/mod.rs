//! Bitstream codec for compiled tunes
//!
//! Each field of a frame is replaced by its index in a per-field reference
//! table, written in the narrowest width that fits the table. A virtual
//! all-zero sentinel frame closes the stream; since zero is the smallest
//! value of every field, the sentinel always packs as all-zero indices.

pub mod bits;
pub mod distribution;

use crate::error::{Error, Result};
use crate::sequencer::frame::Frame;
use crate::sequencer::source::FrameSource;
use bits::{BitReader, BitWriter};
use distribution::{Distribution, Field, RefTable};
use log::info;
use std::iter;

/// A packed frame stream and its reference tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTune {
    tables: [RefTable; 4],
    data: Vec<u8>,
}

impl PackedTune {
    /// Pack a frame stream. A trailing sentinel is optional; any other
    /// sentinel is rejected.
    pub fn encode(frames: &[Frame]) -> Result<Self> {
        let notes = match frames.split_last() {
            Some((last, notes)) if last.is_sentinel() => notes,
            _ => frames,
        };
        if let Some(pos) = notes.iter().position(Frame::is_sentinel) {
            return Err(Error::Format(format!(
                "end-of-stream frame at position {} of {}",
                pos,
                notes.len()
            )));
        }
        let stream = || notes.iter().chain(iter::once(&Frame::SENTINEL));

        let mut dists: [Distribution; 4] = Default::default();
        for frame in stream() {
            for field in Field::ALL {
                dists[field as usize].add(field.get(frame));
            }
        }

        info!("distribution chart:");
        for field in Field::ALL {
            let distinct = dists[field as usize].distinct();
            info!(
                "  {:<13} {:>3} values, {} bits",
                field.name(),
                distinct,
                RefTable::bits_for(distinct)
            );
        }

        let [time_scale, period, amplitude, release_start] = dists;
        let tables = [
            time_scale.into_table(Field::TimeScale)?,
            period.into_table(Field::Period)?,
            amplitude.into_table(Field::Amplitude)?,
            release_start.into_table(Field::ReleaseStart)?,
        ];

        let bits_per_frame: usize = tables.iter().map(|t| t.bit_count as usize).sum();
        let mut writer = BitWriter::with_capacity((notes.len() + 1) * bits_per_frame / 8 + 1);
        for frame in stream() {
            for field in Field::ALL {
                let table = &tables[field as usize];
                let value = field.get(frame);
                let index = table.index_of(value).ok_or_else(|| {
                    Error::Format(format!("{} value {} missing from table", field.name(), value))
                })?;
                writer.write_bits(index, table.bit_count);
            }
        }

        let tune = Self {
            tables,
            data: writer.finish(),
        };
        info!(
            "stream size: {} frames, {} bits per frame, {} data bytes, {} table bytes",
            notes.len() + 1,
            bits_per_frame,
            tune.data_size(),
            tune.table_size()
        );
        Ok(tune)
    }

    /// Reassemble a tune read back from storage
    pub fn from_parts(tables: [RefTable; 4], data: Vec<u8>) -> Result<Self> {
        let tune = Self { tables, data };
        if tune.bits_per_frame() == 0 && !tune.data.is_empty() {
            return Err(Error::Format(
                "packed data present but no field is encoded".into(),
            ));
        }
        Ok(tune)
    }

    pub fn tables(&self) -> &[RefTable; 4] {
        &self.tables
    }

    pub fn table(&self, field: Field) -> &RefTable {
        &self.tables[field as usize]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn bits_per_frame(&self) -> u32 {
        self.tables.iter().map(|t| t.bit_count as u32).sum()
    }

    /// Bytes taken by the reference tables
    pub fn table_size(&self) -> usize {
        Field::ALL
            .iter()
            .map(|&f| self.table(f).len() * f.value_size())
            .sum()
    }

    pub fn decoder(&self) -> PackedSource<'_> {
        PackedSource::new(self)
    }

    /// Decode every frame, including the closing sentinel
    pub fn decode_all(&self) -> Vec<Frame> {
        let mut source = self.decoder();
        let mut frames = Vec::new();
        loop {
            let frame = source.next_frame();
            frames.push(frame);
            if frame.is_sentinel() {
                return frames;
            }
        }
    }
}

/// Frame source reading a packed tune
#[derive(Debug, Clone)]
pub struct PackedSource<'a> {
    tune: &'a PackedTune,
    reader: BitReader<'a>,
    ended: bool,
}

impl<'a> PackedSource<'a> {
    pub fn new(tune: &'a PackedTune) -> Self {
        Self {
            tune,
            reader: BitReader::new(&tune.data),
            ended: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSource for PackedSource<'_> {
    fn next_frame(&mut self) -> Frame {
        if self.ended || self.reader.is_exhausted() {
            self.ended = true;
            return Frame::SENTINEL;
        }

        let mut frame = Frame::SENTINEL;
        let mut all_zero = true;
        for field in Field::ALL {
            let table = self.tune.table(field);
            let index = self.reader.read_masked(table.bit_count);
            all_zero &= index == 0;
            field.set(&mut frame, table.value(index));
        }

        // All-zero indices on the last byte close the stream, even if a
        // real frame happened to pack that way
        if all_zero && self.reader.at_last_byte() {
            self.ended = true;
            return Frame::SENTINEL;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(time_scale: u16, release_start: u8, amplitude: i8, period: u16) -> Frame {
        Frame::new(time_scale, release_start, amplitude, period).unwrap()
    }

    fn sample_stream() -> Vec<Frame> {
        vec![
            note(0x4c, 20, 60, 290),
            note(0x4c, 20, 60, 258),
            note(0x26, 24, -40, 290),
            note(0x98, 20, 60, 217),
            note(0x4c, 30, 127, 0),
            Frame::SENTINEL,
        ]
    }

    #[test]
    fn test_encode_decode() {
        let frames = sample_stream();
        let tune = PackedTune::encode(&frames).unwrap();

        // time_scale {0, 26, 4c, 98}, period {0, 217, 258, 290},
        // amplitude {0, 60, 127, -40}, release_start {0, 20, 24, 30}
        for field in Field::ALL {
            assert_eq!(tune.table(field).bit_count, 2, "{}", field.name());
        }
        assert_eq!(tune.table(Field::Amplitude).values, vec![0, 60, 127, 0xD8]);
        assert_eq!(tune.bits_per_frame(), 8);
        assert_eq!(tune.data_size(), 6);
        assert_eq!(tune.decode_all(), frames);
    }

    #[test]
    fn test_data_size_rounds_up() {
        // 3 distinct time scales -> 2 bits, 2 release starts -> 1 bit,
        // 2 amplitudes -> 1 bit, 2 periods -> 1 bit: 5 bits per frame
        let frames = vec![note(1, 20, 10, 64), note(2, 20, 10, 64)];
        let tune = PackedTune::encode(&frames).unwrap();
        assert_eq!(tune.bits_per_frame(), 5);
        assert_eq!(tune.data_size(), (3 * 5 + 7) / 8);

        let decoded = tune.decode_all();
        assert_eq!(&decoded[..2], &frames[..]);
        assert!(decoded[2].is_sentinel());
    }

    #[test]
    fn test_single_value_field_is_omitted() {
        // Every period is zero, sentinel included
        let frames = vec![note(3, 20, 50, 0), note(5, 40, -50, 0), note(3, 20, 25, 0)];
        let tune = PackedTune::encode(&frames).unwrap();
        let period = tune.table(Field::Period);
        assert_eq!(period.bit_count, 0);
        assert_eq!(period.values, vec![0]);

        let decoded = tune.decode_all();
        assert_eq!(decoded.len(), 4);
        assert_eq!(&decoded[..3], &frames[..]);
        assert!(decoded.iter().all(|f| f.waveform.period == 0));
    }

    #[test]
    fn test_empty_stream() {
        let tune = PackedTune::encode(&[Frame::SENTINEL]).unwrap();
        assert_eq!(tune.bits_per_frame(), 0);
        assert_eq!(tune.data_size(), 0);
        assert_eq!(tune.decode_all(), vec![Frame::SENTINEL]);
    }

    #[test]
    fn test_decoder_stays_ended() {
        let tune = PackedTune::encode(&sample_stream()).unwrap();
        let mut source = tune.decoder();
        for _ in 0..5 {
            assert!(!source.next_frame().is_sentinel());
        }
        assert!(source.next_frame().is_sentinel());
        assert!(source.is_ended());
        assert!(source.next_frame().is_sentinel());
    }

    #[test]
    fn test_capacity() {
        let frames: Vec<Frame> = (1..=255).map(|p| note(1, 20, 10, p)).collect();
        let tune = PackedTune::encode(&frames).unwrap();
        assert_eq!(tune.table(Field::Period).bit_count, 8);
        assert_eq!(tune.decode_all().len(), 256);

        let frames: Vec<Frame> = (1..=256).map(|p| note(1, 20, 10, p)).collect();
        assert!(matches!(
            PackedTune::encode(&frames),
            Err(Error::CodecCapacity { field: "period", .. })
        ));
    }

    #[test]
    fn test_inner_sentinel_rejected() {
        let frames = vec![note(1, 20, 10, 5), Frame::SENTINEL, note(1, 20, 10, 5)];
        assert!(PackedTune::encode(&frames).is_err());
    }

    #[test]
    fn test_from_parts_rejects_orphan_data() {
        let tables = [
            RefTable::from_values(vec![0]).unwrap(),
            RefTable::from_values(vec![0]).unwrap(),
            RefTable::from_values(vec![0]).unwrap(),
            RefTable::from_values(vec![0]).unwrap(),
        ];
        assert!(PackedTune::from_parts(tables.clone(), vec![]).is_ok());
        assert!(PackedTune::from_parts(tables, vec![0, 0]).is_err());
    }
}
