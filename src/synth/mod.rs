//! Polyphonic synthesizer: a fixed pool of voices summed into one output
//!
//! Voices are scanned highest index first. The sequencer and the stream
//! compiler both rely on this order to agree on which voice is "first free".

pub mod envelope;
pub mod oscillator;
pub mod voice;

use crate::error::{Error, Result};
use crate::sequencer::frame::Frame;
use envelope::EnvelopeProfile;
use log::debug;
use oscillator::Waveform;
use voice::Voice;

/// Maximum number of voices (one bit each in the enable/mute masks)
pub const MAX_VOICES: usize = 16;

/// Default sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u16 = 8000;

/// Build-time synthesizer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthConfig {
    sample_rate: u16,
    waveform: Waveform,
    voice_waveforms: Vec<Option<Waveform>>,
    clip_check: bool,
    envelope: EnvelopeProfile,
}

impl SynthConfig {
    pub fn builder() -> SynthConfigBuilder {
        SynthConfigBuilder::new()
    }

    pub fn sample_rate(&self) -> u16 {
        self.sample_rate
    }

    pub fn voice_count(&self) -> usize {
        self.voice_waveforms.len()
    }

    pub fn clip_check(&self) -> bool {
        self.clip_check
    }

    pub fn envelope(&self) -> &EnvelopeProfile {
        &self.envelope
    }

    /// Waveform used by a voice (per-voice override or the default)
    pub fn waveform_for(&self, voice: usize) -> Waveform {
        self.voice_waveforms
            .get(voice)
            .copied()
            .flatten()
            .unwrap_or(self.waveform)
    }

    /// Same configuration with a different voice count
    pub fn with_voices(&self, voices: usize) -> Result<Self> {
        let mut builder = self.to_builder();
        builder.voices = voices;
        builder.build()
    }

    /// Same configuration with clip checking forced
    pub fn with_clip_check(&self, clip_check: bool) -> Self {
        Self {
            clip_check,
            ..self.clone()
        }
    }

    fn to_builder(&self) -> SynthConfigBuilder {
        SynthConfigBuilder {
            sample_rate: self.sample_rate,
            voices: self.voice_count(),
            waveform: self.waveform,
            overrides: self
                .voice_waveforms
                .iter()
                .enumerate()
                .filter_map(|(i, w)| w.map(|w| (i, w)))
                .collect(),
            clip_check: self.clip_check,
            envelope: self.envelope,
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            waveform: Waveform::Square,
            voice_waveforms: vec![None; 4],
            clip_check: true,
            envelope: EnvelopeProfile::default(),
        }
    }
}

/// Builder for [`SynthConfig`]
#[derive(Debug, Clone)]
pub struct SynthConfigBuilder {
    sample_rate: u16,
    voices: usize,
    waveform: Waveform,
    overrides: Vec<(usize, Waveform)>,
    clip_check: bool,
    envelope: EnvelopeProfile,
}

impl SynthConfigBuilder {
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            voices: 4,
            waveform: Waveform::Square,
            overrides: Vec::new(),
            clip_check: true,
            envelope: EnvelopeProfile::default(),
        }
    }

    pub fn sample_rate(mut self, sample_rate: u16) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn voices(mut self, voices: usize) -> Self {
        self.voices = voices;
        self
    }

    /// Waveform for every voice without an override
    pub fn waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    pub fn voice_waveform(mut self, voice: usize, waveform: Waveform) -> Self {
        self.overrides.push((voice, waveform));
        self
    }

    pub fn clip_check(mut self, clip_check: bool) -> Self {
        self.clip_check = clip_check;
        self
    }

    pub fn envelope(mut self, envelope: EnvelopeProfile) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn build(self) -> Result<SynthConfig> {
        if self.sample_rate == 0 {
            return Err(Error::OutOfRange("sample rate must be non-zero".into()));
        }
        if self.voices > MAX_VOICES {
            return Err(Error::OutOfRange(format!(
                "{} voices requested, at most {} supported",
                self.voices, MAX_VOICES
            )));
        }
        self.envelope.validate()?;

        let mut voice_waveforms = vec![None; self.voices];
        for (voice, waveform) in self.overrides {
            // Overrides beyond the voice count are dropped so that
            // `with_voices` can shrink a configuration.
            if let Some(slot) = voice_waveforms.get_mut(voice) {
                *slot = Some(waveform);
            }
        }

        Ok(SynthConfig {
            sample_rate: self.sample_rate,
            waveform: self.waveform,
            voice_waveforms,
            clip_check: self.clip_check,
            envelope: self.envelope,
        })
    }
}

impl Default for SynthConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Saturate a widened sum to the signed 8-bit range.
/// Returns the sample and whether it clipped.
pub fn saturate(sum: i16) -> (i8, bool) {
    if sum > i8::MAX as i16 {
        (i8::MAX, true)
    } else if sum < i8::MIN as i16 {
        (i8::MIN, true)
    } else {
        (sum as i8, false)
    }
}

/// Voice pool and mixer
#[derive(Debug, Clone)]
pub struct PolySynth {
    voices: Vec<Voice>,
    /// Voices not enabled are neither computed nor dispatched to
    enable: u16,
    /// Muted voices are computed but left out of the mix
    mute: u16,
    clip_check: bool,
    clip_count: u32,
}

impl PolySynth {
    pub fn new(config: &SynthConfig) -> Self {
        let voices = (0..config.voice_count())
            .map(|i| Voice::new(*config.envelope(), config.waveform_for(i)))
            .collect::<Vec<_>>();
        let enable = if voices.len() >= 16 {
            u16::MAX
        } else {
            (1u16 << voices.len()) - 1
        };
        Self {
            voices,
            enable,
            mute: 0,
            clip_check: config.clip_check(),
            clip_count: 0,
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    /// Voice indices in scan order, highest index first
    pub fn priority_order(&self) -> impl Iterator<Item = usize> {
        (0..self.voices.len()).rev()
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        index < MAX_VOICES && self.enable & (1 << index) != 0
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if index < self.voices.len() {
            if enabled {
                self.enable |= 1 << index;
            } else {
                self.enable &= !(1 << index);
            }
        }
    }

    pub fn is_muted(&self, index: usize) -> bool {
        index < MAX_VOICES && self.mute & (1 << index) != 0
    }

    pub fn set_muted(&mut self, index: usize, muted: bool) {
        if index < self.voices.len() {
            if muted {
                self.mute |= 1 << index;
            } else {
                self.mute &= !(1 << index);
            }
        }
    }

    /// Whether an enabled voice is ready for a new frame
    pub fn is_voice_free(&self, index: usize) -> bool {
        self.is_enabled(index) && self.voices[index].is_free()
    }

    /// Free voices in scan order
    pub fn free_voices(&self) -> impl Iterator<Item = usize> + '_ {
        self.priority_order().filter(move |&i| self.is_voice_free(i))
    }

    pub fn first_free_voice(&self) -> Option<usize> {
        self.free_voices().next()
    }

    /// Whether any enabled voice is still sounding
    pub fn is_active(&self) -> bool {
        self.priority_order()
            .any(|i| self.is_enabled(i) && !self.voices[i].is_free())
    }

    pub fn active_count(&self) -> usize {
        self.priority_order()
            .filter(|&i| self.is_enabled(i) && !self.voices[i].is_free())
            .count()
    }

    /// Load a frame into a voice
    pub fn configure_voice(&mut self, index: usize, frame: &Frame) {
        if let Some(voice) = self.voices.get_mut(index) {
            debug!(
                "voice {} <- ts={} rel={} amp={} per={}",
                index,
                frame.envelope.time_scale,
                frame.envelope.release_start,
                frame.waveform.amplitude,
                frame.waveform.period
            );
            voice.configure(frame);
        }
    }

    /// Note-off on one voice
    pub fn release_voice(&mut self, index: usize) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.release();
        }
    }

    /// Silence every voice
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
    }

    /// Compute the next mixed sample
    pub fn next_sample(&mut self) -> i8 {
        let mut sum: i16 = 0;
        for index in (0..self.voices.len()).rev() {
            let mask = 1u16 << index;
            if self.enable & mask == 0 {
                continue;
            }
            let sample = self.voices[index].next_sample();
            if self.mute & mask == 0 {
                sum += sample as i16;
            }
        }

        let (sample, clipped) = saturate(sum);
        if clipped && self.clip_check {
            self.clip_count += 1;
        }
        sample
    }

    /// Number of ticks that clipped
    pub fn clip_count(&self) -> u32 {
        self.clip_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc_config(voices: usize) -> SynthConfig {
        SynthConfig::builder()
            .voices(voices)
            .waveform(Waveform::Dc)
            .build()
            .unwrap()
    }

    /// Frame holding full volume for a long time after the attack
    fn loud_frame() -> Frame {
        Frame::new(1, 100, 100, 0).unwrap()
    }

    fn skip_attack(synth: &mut PolySynth) {
        for _ in 0..envelope::ATTACK_END {
            synth.next_sample();
        }
    }

    #[test]
    fn test_builder_defaults_and_limits() {
        let config = SynthConfig::builder().build().unwrap();
        assert_eq!(config.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(config.voice_count(), 4);
        assert!(SynthConfig::builder().voices(MAX_VOICES + 1).build().is_err());
        assert!(SynthConfig::builder().sample_rate(0).build().is_err());
    }

    #[test]
    fn test_voice_waveform_override() {
        let config = SynthConfig::builder()
            .voices(3)
            .waveform(Waveform::Triangle)
            .voice_waveform(1, Waveform::Noise)
            .voice_waveform(7, Waveform::Dc)
            .build()
            .unwrap();
        assert_eq!(config.waveform_for(0), Waveform::Triangle);
        assert_eq!(config.waveform_for(1), Waveform::Noise);
        assert_eq!(config.waveform_for(2), Waveform::Triangle);

        let shrunk = config.with_voices(1).unwrap();
        assert_eq!(shrunk.voice_count(), 1);
        assert_eq!(shrunk.waveform_for(0), Waveform::Triangle);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate(0), (0, false));
        assert_eq!(saturate(127), (127, false));
        assert_eq!(saturate(128), (127, true));
        assert_eq!(saturate(-128), (-128, false));
        assert_eq!(saturate(-300), (-128, true));
    }

    #[test]
    fn test_free_voice_priority() {
        let mut synth = PolySynth::new(&dc_config(3));
        assert_eq!(synth.free_voices().collect::<Vec<_>>(), vec![2, 1, 0]);
        synth.configure_voice(2, &loud_frame());
        assert_eq!(synth.first_free_voice(), Some(1));
        synth.set_enabled(1, false);
        assert_eq!(synth.first_free_voice(), Some(0));
        assert_eq!(synth.active_count(), 1);
    }

    #[test]
    fn test_mix_clips_and_counts() {
        let mut synth = PolySynth::new(&dc_config(2));
        synth.configure_voice(0, &loud_frame());
        synth.configure_voice(1, &loud_frame());
        skip_attack(&mut synth);

        let before = synth.clip_count();
        assert_eq!(synth.next_sample(), i8::MAX);
        assert_eq!(synth.clip_count(), before + 1);
        assert_eq!(synth.next_sample(), i8::MAX);
        assert_eq!(synth.clip_count(), before + 2);
    }

    #[test]
    fn test_clip_check_disabled() {
        let config = dc_config(2).with_clip_check(false);
        let mut synth = PolySynth::new(&config);
        synth.configure_voice(0, &loud_frame());
        synth.configure_voice(1, &loud_frame());
        skip_attack(&mut synth);
        assert_eq!(synth.next_sample(), i8::MAX);
        assert_eq!(synth.clip_count(), 0);
    }

    #[test]
    fn test_mute_excludes_voice() {
        let mut synth = PolySynth::new(&dc_config(2));
        synth.configure_voice(0, &loud_frame());
        synth.configure_voice(1, &loud_frame());
        synth.set_muted(1, true);
        skip_attack(&mut synth);
        assert_eq!(synth.next_sample(), 100);
        assert_eq!(synth.clip_count(), 0);
    }

    #[test]
    fn test_reset_frees_all() {
        let mut synth = PolySynth::new(&dc_config(2));
        synth.configure_voice(0, &loud_frame());
        assert!(synth.is_active());
        synth.reset();
        assert!(!synth.is_active());
        assert_eq!(synth.next_sample(), 0);
    }
}
