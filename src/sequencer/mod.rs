//! Sequencer: refills free voices from a frame source
//!
//! At most one frame is dispatched per tick, to the first free voice in scan
//! order. This bounds per-sample work at the cost of up to one sample of
//! phase jitter when several voices free up together.

pub mod frame;
pub mod source;

use crate::synth::{PolySynth, SynthConfig};
use frame::Frame;
use log::debug;
use source::FrameSource;

/// Global sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Playing,
    EndOfStream,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    state: SequencerState,
    dispatched: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: SequencerState::Playing,
            dispatched: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == SequencerState::EndOfStream
    }

    /// Number of frames loaded into voices so far
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Load the next frame into the first free voice, if any.
    /// Returns the voice that was configured.
    pub fn feed<S: FrameSource + ?Sized>(
        &mut self,
        synth: &mut PolySynth,
        source: &mut S,
    ) -> Option<usize> {
        if self.is_ended() {
            return None;
        }

        let voice = synth.first_free_voice()?;
        let frame = source.next_frame();
        if frame.is_sentinel() {
            debug!("end of stream after {} frames", self.dispatched);
            self.state = SequencerState::EndOfStream;
            return None;
        }

        synth.configure_voice(voice, &frame);
        self.dispatched += 1;
        Some(voice)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a synth from a frame source, one sample per call
pub struct Player<S: FrameSource> {
    synth: PolySynth,
    sequencer: Sequencer,
    source: S,
    started: bool,
    ticks: u64,
    /// Tick at which each frame was dispatched
    dispatch_ticks: Vec<u64>,
}

impl<S: FrameSource> Player<S> {
    pub fn new(config: &SynthConfig, source: S) -> Self {
        Self {
            synth: PolySynth::new(config),
            sequencer: Sequencer::new(),
            source,
            started: false,
            ticks: 0,
            dispatch_ticks: Vec::new(),
        }
    }

    /// Next output sample, `None` once the stream ended and every voice
    /// has finished
    pub fn next_sample(&mut self) -> Option<i8> {
        if !self.started {
            self.started = true;
            self.feed();
        }
        if !self.synth.is_active() {
            return None;
        }

        let sample = self.synth.next_sample();
        self.ticks += 1;
        self.feed();
        Some(sample)
    }

    fn feed(&mut self) {
        if self.sequencer.feed(&mut self.synth, &mut self.source).is_some() {
            self.dispatch_ticks.push(self.ticks);
        }
    }

    pub fn synth(&self) -> &PolySynth {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut PolySynth {
        &mut self.synth
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Samples produced so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn dispatch_ticks(&self) -> &[u64] {
        &self.dispatch_ticks
    }

    pub fn clip_count(&self) -> u32 {
        self.synth.clip_count()
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: FrameSource> Iterator for Player<S> {
    type Item = i8;

    fn next(&mut self) -> Option<i8> {
        self.next_sample()
    }
}
