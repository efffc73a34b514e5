//! Per-field value distributions and reference tables

use crate::error::{Error, Result};
use crate::sequencer::frame::Frame;
use serde::Serialize;
use std::collections::BTreeMap;

/// Widest index the runtime decoder can read
pub const MAX_FIELD_BITS: u8 = 8;

/// The frame fields packed into a tune, in bitstream order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TimeScale,
    Period,
    Amplitude,
    ReleaseStart,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::TimeScale,
        Field::Period,
        Field::Amplitude,
        Field::ReleaseStart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TimeScale => "time_scale",
            Self::Period => "period",
            Self::Amplitude => "amplitude",
            Self::ReleaseStart => "release_start",
        }
    }

    /// Bytes per table value in the packed artifact
    pub fn value_size(&self) -> usize {
        match self {
            Self::TimeScale | Self::Period => 2,
            Self::Amplitude | Self::ReleaseStart => 1,
        }
    }

    /// Raw bits of the field. Amplitude is taken as unsigned so that zero
    /// sorts first and the all-zero sentinel always maps to index 0.
    pub fn get(&self, frame: &Frame) -> u16 {
        match self {
            Self::TimeScale => frame.envelope.time_scale,
            Self::Period => frame.waveform.period,
            Self::Amplitude => frame.waveform.amplitude as u8 as u16,
            Self::ReleaseStart => frame.envelope.release_start as u16,
        }
    }

    pub fn set(&self, frame: &mut Frame, raw: u16) {
        match self {
            Self::TimeScale => frame.envelope.time_scale = raw,
            Self::Period => frame.waveform.period = raw,
            Self::Amplitude => frame.waveform.amplitude = raw as u8 as i8,
            Self::ReleaseStart => frame.envelope.release_start = raw as u8,
        }
    }
}

/// Histogram of one field across a stream
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    counts: BTreeMap<u16, u32>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: u16) {
        *self.counts.entry(value).or_default() += 1;
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Occurrences of a value
    pub fn count(&self, value: u16) -> u32 {
        self.counts.get(&value).copied().unwrap_or(0)
    }

    /// Assign indices in ascending value order
    pub fn into_table(self, field: Field) -> Result<RefTable> {
        let distinct = self.distinct();
        let bit_count = RefTable::bits_for(distinct);
        if bit_count > MAX_FIELD_BITS {
            return Err(Error::CodecCapacity {
                field: field.name(),
                distinct,
                bits: bit_count,
            });
        }
        Ok(RefTable {
            bit_count,
            values: self.counts.into_keys().collect(),
        })
    }
}

/// Index -> value dictionary for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefTable {
    pub bit_count: u8,
    pub values: Vec<u16>,
}

impl RefTable {
    /// `ceil(log2(distinct))`, zero for a single value
    pub fn bits_for(distinct: usize) -> u8 {
        if distinct <= 1 {
            0
        } else {
            (usize::BITS - (distinct - 1).leading_zeros()) as u8
        }
    }

    /// Rebuild a table from stored values, which must be strictly ascending
    pub fn from_values(values: Vec<u16>) -> Result<Self> {
        if values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Format(
                "reference table values are not strictly ascending".into(),
            ));
        }
        let bit_count = Self::bits_for(values.len());
        if bit_count > MAX_FIELD_BITS {
            return Err(Error::Format(format!(
                "reference table of {} values exceeds {} bits",
                values.len(),
                MAX_FIELD_BITS
            )));
        }
        Ok(Self { bit_count, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, value: u16) -> Option<u8> {
        self.values.binary_search(&value).ok().map(|i| i as u8)
    }

    /// Value at an index; indices past the table decode as zero
    pub fn value(&self, index: u8) -> u16 {
        self.values.get(index as usize).copied().unwrap_or(0)
    }
}
