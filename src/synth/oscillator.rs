//! Waveform oscillator
//!
//! Periods are 12.4 fixed point: the fractional bits keep low notes in tune
//! at high sample rates, and the 12-bit integer part still covers a 20 Hz
//! note at 48 kHz.

use crate::error::{Error, Result};
use crate::sequencer::frame::WaveformDef;
use std::fmt;
use std::str::FromStr;

/// Fractional bits of a period
pub const PERIOD_FP_SHIFT: u32 = 4;

/// One sample in fixed-point period units
const PERIOD_ONE: u32 = 1 << PERIOD_FP_SHIFT;

/// Fractional bits of ramp amplitudes
const AMP_SHIFT: u32 = 8;

/// Noise generator seed
const LFSR_SEED: u16 = 0xACE1;

/// Galois LFSR taps (x^16 + x^14 + x^13 + x^11 + 1)
const LFSR_TAPS: u16 = 0xB400;

/// Waveform shape produced by an oscillator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Waveform {
    #[default]
    Square,
    Sawtooth,
    Triangle,
    Noise,
    Dc,
}

impl Waveform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
            Self::Noise => "noise",
            Self::Dc => "dc",
        }
    }

    /// Iterate over all waveforms
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::Square,
            Self::Sawtooth,
            Self::Triangle,
            Self::Noise,
            Self::Dc,
        ]
        .into_iter()
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .find(|w| w.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown waveform '{}'", s))
    }
}

/// Compute the full period of a tone in 12.4 fixed-point samples
pub fn freq_to_period(sample_rate: u32, frequency: u32) -> Result<u16> {
    if frequency == 0 {
        return Err(Error::OutOfRange("frequency must be non-zero".into()));
    }
    let period = (sample_rate << PERIOD_FP_SHIFT) / frequency;
    if period == 0 {
        return Err(Error::OutOfRange(format!(
            "frequency {} Hz too high for {} Hz sample rate",
            frequency, sample_rate
        )));
    }
    u16::try_from(period).map_err(|_| {
        Error::OutOfRange(format!(
            "frequency {} Hz too low for {} Hz sample rate",
            frequency, sample_rate
        ))
    })
}

/// Per-voice oscillator state
#[derive(Debug, Clone)]
pub struct Oscillator {
    mode: Waveform,
    amplitude: i8,
    /// Output register for square and constant modes
    sample: i8,
    /// Ramp state for sawtooth and triangle (24.8)
    fp_sample: i32,
    fp_amplitude: i32,
    fp_step: i32,
    /// Half period for square/triangle, full period for sawtooth (12.4)
    period: u32,
    period_remain: u32,
    lfsr: u16,
}

impl Oscillator {
    pub fn new() -> Self {
        Self {
            mode: Waveform::Square,
            amplitude: 0,
            sample: 0,
            fp_sample: 0,
            fp_amplitude: 0,
            fp_step: 0,
            period: 0,
            period_remain: 0,
            lfsr: LFSR_SEED,
        }
    }

    pub fn mode(&self) -> Waveform {
        self.mode
    }

    /// Load a waveform definition
    pub fn configure(&mut self, def: &WaveformDef, mode: Waveform) {
        self.mode = mode;
        self.amplitude = def.amplitude;
        self.sample = def.amplitude;
        self.period = 0;
        self.period_remain = 0;

        let fp_amplitude = (def.amplitude as i32) << AMP_SHIFT;
        match mode {
            Waveform::Square => {
                self.period = (def.period >> 1) as u32;
                self.period_remain = self.period;
            }
            Waveform::Sawtooth => {
                self.period = def.period as u32;
                self.period_remain = self.period;
                self.fp_amplitude = fp_amplitude;
                self.fp_sample = -fp_amplitude;
                self.fp_step = 2 * fp_amplitude / ramp_samples(self.period);
            }
            Waveform::Triangle => {
                self.period = (def.period >> 1) as u32;
                self.period_remain = self.period;
                self.fp_amplitude = fp_amplitude;
                self.fp_sample = fp_amplitude;
                self.fp_step = -2 * fp_amplitude / ramp_samples(self.period);
            }
            Waveform::Noise | Waveform::Dc => {}
        }
    }

    /// Produce the next sample
    pub fn advance(&mut self) -> i8 {
        match self.mode {
            Waveform::Dc => self.amplitude,
            Waveform::Noise => {
                let lsb = self.lfsr & 1;
                self.lfsr >>= 1;
                if lsb != 0 {
                    self.lfsr ^= LFSR_TAPS;
                }
                let value = self.lfsr as u8 as i8 as i16;
                ((value * self.amplitude as i16) >> 7) as i8
            }
            Waveform::Square => {
                if self.period > 0 {
                    if self.period_remain >> PERIOD_FP_SHIFT == 0 {
                        self.sample = self.sample.saturating_neg();
                        self.period_remain = self.rearm(self.period_remain);
                    } else {
                        self.period_remain -= PERIOD_ONE;
                    }
                }
                self.sample
            }
            Waveform::Sawtooth => {
                if self.period == 0 {
                    return self.sample;
                }
                if self.period_remain >> PERIOD_FP_SHIFT == 0 {
                    self.fp_sample = -self.fp_amplitude;
                    self.period_remain = self.rearm(self.period_remain);
                } else {
                    self.fp_sample += self.fp_step;
                    self.period_remain -= PERIOD_ONE;
                }
                self.ramp_sample()
            }
            Waveform::Triangle => {
                if self.period == 0 {
                    return self.sample;
                }
                if self.period_remain >> PERIOD_FP_SHIFT == 0 {
                    // Switch direction
                    self.fp_sample = if self.fp_step > 0 {
                        self.fp_amplitude
                    } else {
                        -self.fp_amplitude
                    };
                    self.fp_step = -self.fp_step;
                    self.period_remain = self.rearm(self.period_remain);
                } else {
                    self.fp_sample += self.fp_step;
                    self.period_remain -= PERIOD_ONE;
                }
                self.ramp_sample()
            }
        }
    }

    /// Reload the period, counting the sample being emitted
    fn rearm(&self, remain: u32) -> u32 {
        (remain + self.period).saturating_sub(PERIOD_ONE)
    }

    fn ramp_sample(&self) -> i8 {
        (self.fp_sample >> AMP_SHIFT).clamp(i8::MIN as i32, i8::MAX as i32) as i8
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole samples covered by a ramp, at least one
fn ramp_samples(period: u32) -> i32 {
    ((period >> PERIOD_FP_SHIFT) as i32).max(1)
}
