//! Frame map: the score organised as one frame list per logical channel

use crate::error::{Error, Result};
use crate::sequencer::frame::Frame;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Ordered frames of one monophonic channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameList {
    pub frames: Vec<Frame>,
}

impl FrameList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl From<Vec<Frame>> for FrameList {
    fn from(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

/// Score input to the stream compiler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMap {
    pub channels: Vec<FrameList>,
}

impl FrameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a frame map from JSON: `{"channels": [[frame, ...], ...]}`
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let map: Self = serde_json::from_reader(reader)?;
        map.validate()?;
        Ok(map)
    }

    pub fn push_channel(&mut self, channel: impl Into<FrameList>) {
        self.channels.push(channel.into());
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Channels that hold at least one frame, in map order
    pub fn non_empty_channels(&self) -> impl Iterator<Item = &FrameList> {
        self.channels.iter().filter(|c| !c.is_empty())
    }

    pub fn total_frames(&self) -> usize {
        self.channels.iter().map(FrameList::len).sum()
    }

    /// Reject frames that could not be built with `Frame::new`, sentinels
    /// included; they would end the stream early or misplay
    pub fn validate(&self) -> Result<()> {
        for (ch, channel) in self.channels.iter().enumerate() {
            for (pos, frame) in channel.frames.iter().enumerate() {
                frame.validate().map_err(|e| match e {
                    Error::OutOfRange(msg) => {
                        Error::OutOfRange(format!("channel {} frame {}: {}", ch, pos, msg))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}
