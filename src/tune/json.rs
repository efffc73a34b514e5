//! JSON serialization types for tune files

use super::reader::TuneFile;
use crate::codec::distribution::Field;
use crate::sequencer::frame::Frame;
use serde::Serialize;

/// Top-level JSON structure for a tune file
#[derive(Debug, Clone, Serialize)]
pub struct TuneJson {
    /// "packed" or "stream"
    pub format: &'static str,
    pub sample_rate: u16,
    pub voice_count: u8,
    /// Whether playback must saturate the mix (packed tunes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_check: Option<bool>,
    /// Packing statistics and tables (packed tunes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packing: Option<PackingJson>,
    /// Decoded frames, without the closing sentinel
    pub frames: Vec<Frame>,
}

/// JSON representation of the bitstream layout
#[derive(Debug, Clone, Serialize)]
pub struct PackingJson {
    pub bits_per_frame: u32,
    pub data_size: usize,
    pub tables: Vec<TableJson>,
}

/// JSON representation of one reference table
#[derive(Debug, Clone, Serialize)]
pub struct TableJson {
    pub field: &'static str,
    pub bit_count: u8,
    pub values: Vec<i32>,
}

impl TuneJson {
    pub fn new(file: &TuneFile) -> Self {
        let mut frames = file.frames();
        frames.pop();

        match file {
            TuneFile::Packed { header, tune } => {
                let tables = Field::ALL
                    .iter()
                    .map(|&field| {
                        let table = tune.table(field);
                        TableJson {
                            field: field.name(),
                            bit_count: table.bit_count,
                            values: table
                                .values
                                .iter()
                                .map(|&raw| display_value(field, raw))
                                .collect(),
                        }
                    })
                    .collect();
                Self {
                    format: "packed",
                    sample_rate: header.sample_rate,
                    voice_count: header.voice_count,
                    clip_check: Some(header.clip_check),
                    packing: Some(PackingJson {
                        bits_per_frame: tune.bits_per_frame(),
                        data_size: tune.data_size(),
                        tables,
                    }),
                    frames,
                }
            }
            TuneFile::Stream { header, .. } => Self {
                format: "stream",
                sample_rate: header.sample_rate,
                voice_count: header.voice_count,
                clip_check: None,
                packing: None,
                frames,
            },
        }
    }
}

/// Table values as they appear in frames (amplitudes are signed)
fn display_value(field: Field, raw: u16) -> i32 {
    let mut frame = Frame::SENTINEL;
    field.set(&mut frame, raw);
    match field {
        Field::Amplitude => frame.waveform.amplitude as i32,
        _ => raw as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PackedTune;
    use crate::tune::header::TuneHeader;

    #[test]
    fn test_packed_json() {
        let frames = [Frame::new(2, 20, -5, 100).unwrap()];
        let file = TuneFile::Packed {
            header: TuneHeader::new(8000, 1, false),
            tune: PackedTune::encode(&frames).unwrap(),
        };
        let json = serde_json::to_value(TuneJson::new(&file)).unwrap();
        assert_eq!(json["format"], "packed");
        assert_eq!(json["voice_count"], 1);
        assert_eq!(json["frames"].as_array().unwrap().len(), 1);
        assert_eq!(json["frames"][0]["amplitude"], -5);
        assert_eq!(json["packing"]["tables"][2]["field"], "amplitude");
        assert_eq!(json["packing"]["tables"][2]["values"][1], -5);
    }
}
