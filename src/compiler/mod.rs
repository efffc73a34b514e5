//! Stream compiler - orders a frame map into hardware dispatch order
//!
//! The runtime sequencer only sees a flat stream, and hands each frame to
//! whichever voice frees up first. To know which channel's next note belongs
//! at each position, the compiler plays the score silently through the same
//! synth and the same free-voice scan, with each voice bound to one channel.

pub mod channel;

use crate::error::{Error, Result};
use crate::sequencer::frame::Frame;
use crate::synth::{PolySynth, SynthConfig, MAX_VOICES};
use channel::{FrameList, FrameMap};
use log::{info, warn};

/// Output of a compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStream {
    /// Frames in dispatch order, terminated by the sentinel
    pub frames: Vec<Frame>,
    /// Voices needed at runtime (non-empty channels)
    pub voice_count: usize,
    /// Ticks of the simulation whose mix clipped
    pub clip_count: u32,
    /// Length of the tune in samples
    pub ticks: u64,
    /// Tick at which each frame was dispatched
    pub dispatch_ticks: Vec<u64>,
}

impl CompiledStream {
    /// Frames without the trailing sentinel
    pub fn notes(&self) -> &[Frame] {
        match self.frames.split_last() {
            Some((last, notes)) if last.is_sentinel() => notes,
            _ => &self.frames,
        }
    }
}

/// Per-voice read position in its bound channel
struct ChannelCursor<'a> {
    channel: &'a FrameList,
    position: usize,
}

impl ChannelCursor<'_> {
    fn has_more(&self) -> bool {
        self.position < self.channel.len()
    }
}

pub struct StreamCompiler {
    config: SynthConfig,
}

impl StreamCompiler {
    /// `config` supplies the sample rate, waveforms and envelope profile;
    /// its voice count is replaced by the number of non-empty channels.
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn compile(&self, map: &FrameMap) -> Result<CompiledStream> {
        map.validate()?;

        // Voice i plays the i-th non-empty channel for the whole tune
        let mut cursors: Vec<ChannelCursor> = map
            .non_empty_channels()
            .map(|channel| ChannelCursor {
                channel,
                position: 0,
            })
            .collect();
        let voice_count = cursors.len();
        if voice_count > MAX_VOICES {
            return Err(Error::OutOfRange(format!(
                "{} non-empty channels, at most {} voices supported",
                voice_count, MAX_VOICES
            )));
        }

        let config = self.config.with_voices(voice_count)?.with_clip_check(true);
        let mut synth = PolySynth::new(&config);
        let mut frames = Vec::with_capacity(map.total_frames() + 1);
        let mut dispatch_ticks = Vec::with_capacity(map.total_frames());
        let mut ticks = 0u64;

        if Self::feed(&mut synth, &mut cursors, &mut frames) {
            dispatch_ticks.push(ticks);
        }
        while synth.is_active() {
            synth.next_sample();
            ticks += 1;
            if Self::feed(&mut synth, &mut cursors, &mut frames) {
                dispatch_ticks.push(ticks);
            }
        }
        frames.push(Frame::SENTINEL);

        let clip_count = synth.clip_count();
        info!(
            "compiled {} frames for {} voices, {} samples ({:.1} s)",
            frames.len() - 1,
            voice_count,
            ticks,
            ticks as f64 / config.sample_rate() as f64
        );
        if clip_count > 0 {
            warn!("clip count: {} (clip check required at runtime)", clip_count);
        } else {
            info!("no clip");
        }

        Ok(CompiledStream {
            frames,
            voice_count,
            clip_count,
            ticks,
            dispatch_ticks,
        })
    }

    /// Dispatch at most one frame: the first free voice, in the synth's scan
    /// order, whose channel still has frames
    fn feed(
        synth: &mut PolySynth,
        cursors: &mut [ChannelCursor],
        out: &mut Vec<Frame>,
    ) -> bool {
        let Some(voice) = synth.free_voices().find(|&v| cursors[v].has_more()) else {
            return false;
        };
        let cursor = &mut cursors[voice];
        let frame = cursor.channel.frames[cursor.position];
        cursor.position += 1;

        synth.configure_voice(voice, &frame);
        out.push(frame);
        true
    }
}
