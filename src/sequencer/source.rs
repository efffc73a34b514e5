//! Frame sources feeding the sequencer
//!
//! A source never fails: once it runs out, or its storage fails, it keeps
//! returning [`Frame::SENTINEL`].

use super::frame::{Frame, FRAME_SIZE};
use log::warn;
use std::io::{ErrorKind, Read};

/// Pull interface between the sequencer and frame storage
pub trait FrameSource {
    /// Next frame in dispatch order, or the sentinel when exhausted
    fn next_frame(&mut self) -> Frame;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> Frame {
        (**self).next_frame()
    }
}

/// Frames served from memory
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    frames: &'a [Frame],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(frames: &'a [Frame]) -> Self {
        Self { frames, pos: 0 }
    }

    /// Frames handed out so far
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl FrameSource for SliceSource<'_> {
    fn next_frame(&mut self) -> Frame {
        match self.frames.get(self.pos) {
            Some(frame) => {
                self.pos += 1;
                *frame
            }
            None => Frame::SENTINEL,
        }
    }
}

/// Frames read one record at a time from an uncompressed stream
pub struct ReaderSource<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> ReaderSource<R> {
    /// `reader` must be positioned on the first frame record
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: Read> FrameSource for ReaderSource<R> {
    fn next_frame(&mut self) -> Frame {
        if self.done {
            return Frame::SENTINEL;
        }
        let mut record = [0u8; FRAME_SIZE];
        match self.reader.read_exact(&mut record) {
            Ok(()) => Frame::from_record(&record),
            Err(e) => {
                if e.kind() != ErrorKind::UnexpectedEof {
                    warn!("frame stream read failed, ending playback: {}", e);
                }
                self.done = true;
                Frame::SENTINEL
            }
        }
    }
}

/// Wraps a source and keeps a copy of every frame it hands out
#[derive(Debug, Clone)]
pub struct RecordingSource<S> {
    inner: S,
    frames: Vec<Frame>,
}

impl<S: FrameSource> RecordingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            frames: Vec::new(),
        }
    }

    /// Frames pulled so far, the final sentinel included
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl<S: FrameSource> FrameSource for RecordingSource<S> {
    fn next_frame(&mut self) -> Frame {
        let frame = self.inner.next_frame();
        self.frames.push(frame);
        frame
    }
}
