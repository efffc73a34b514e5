//! Voice: one envelope generator driving one oscillator

use super::envelope::{EnvelopeGenerator, EnvelopeProfile, GainMode, SILENT};
use super::oscillator::{Oscillator, Waveform};
use crate::sequencer::frame::Frame;

#[derive(Debug, Clone)]
pub struct Voice {
    envelope: EnvelopeGenerator,
    oscillator: Oscillator,
    waveform: Waveform,
}

impl Voice {
    pub fn new(profile: EnvelopeProfile, waveform: Waveform) -> Self {
        Self {
            envelope: EnvelopeGenerator::new(profile),
            oscillator: Oscillator::new(),
            waveform,
        }
    }

    /// Start playing a frame
    pub fn configure(&mut self, frame: &Frame) {
        self.oscillator.configure(&frame.waveform, self.waveform);
        self.envelope.configure(frame.envelope);
    }

    /// Compute the next sample.
    ///
    /// A fully attenuated envelope returns zero without touching the
    /// oscillator, so silent voices keep their phase and cost nothing.
    pub fn next_sample(&mut self) -> i8 {
        let gain = self.envelope.advance();
        match self.envelope.profile().gain_mode {
            GainMode::Attenuation => {
                if gain >= SILENT {
                    return 0;
                }
                self.oscillator.advance() >> gain
            }
            GainMode::Amplitude => {
                if gain == 0 {
                    return 0;
                }
                ((self.oscillator.advance() as i16 * gain as i16) >> 8) as i8
            }
        }
    }

    /// Whether the envelope has finished and the voice can take a new frame
    pub fn is_free(&self) -> bool {
        self.envelope.is_idle()
    }

    /// Note-off
    pub fn release(&mut self) {
        self.envelope.release();
    }

    /// Silence immediately and free the voice
    pub fn reset(&mut self) {
        self.envelope.reset();
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn envelope(&self) -> &EnvelopeGenerator {
        &self.envelope
    }

    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }
}
