//! ADSR envelope generator
//!
//! The envelope walks a coarse time-unit scale (0..=127). Each time unit lasts
//! `time_scale` samples, and the unit index selects the region:
//!
//! ```text
//! 0 .. delay                        delay    (silent)
//! delay .. +attack_end              attack   (rises toward peak)
//! delay+attack_end .. +decay_end    decay    (falls toward sustain)
//! delay+decay_end .. release        sustain  (holds)
//! release .. +duration              release  (falls toward silence)
//! ```
//!
//! Past the release the generator parks in an idle state, which the sequencer
//! reads as "voice free".

use crate::error::{Error, Result};
use crate::sequencer::frame::EnvelopeDef;

/// Last valid time unit
pub const MAX_TIME_UNIT: u8 = 127;

/// Default end of the attack region
pub const ATTACK_END: u8 = 8;

/// End of the decay region; no profile may extend decay past this
pub const DECAY_END: u8 = 16;

/// Default release duration in time units
pub const RELEASE_DURATION: u8 = 48;

/// Attenuation meaning "fully attenuated"
pub const SILENT: u8 = 8;

/// Time-unit counter value of an idle generator
const IDLE: u8 = u8::MAX;

/// Countdown used while idle
const WAIT_FOREVER: u16 = u16::MAX;

/// How the envelope reports its level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainMode {
    /// Right-shift count applied to the waveform (0 = full, `SILENT` = off)
    #[default]
    Attenuation,
    /// Direct multiplier over 256 (0 = off)
    Amplitude,
}

/// Fixed envelope parameters shared by every voice of a synth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeProfile {
    /// Silent time units before the attack
    pub delay: u8,
    pub attack_end: u8,
    pub decay_end: u8,
    pub release_duration: u8,
    pub peak: u8,
    pub sustain: u8,
    pub gain_mode: GainMode,
}

impl Default for EnvelopeProfile {
    fn default() -> Self {
        Self {
            delay: 0,
            attack_end: ATTACK_END,
            decay_end: DECAY_END,
            release_duration: RELEASE_DURATION,
            peak: 255,
            sustain: 96,
            gain_mode: GainMode::Attenuation,
        }
    }
}

impl EnvelopeProfile {
    pub fn validate(&self) -> Result<()> {
        if self.attack_end > self.decay_end || self.decay_end > DECAY_END {
            return Err(Error::OutOfRange(format!(
                "envelope boundaries {}/{} must satisfy attack <= decay <= {}",
                self.attack_end, self.decay_end, DECAY_END
            )));
        }
        if self.delay as u16 + self.decay_end as u16 > MAX_TIME_UNIT as u16 {
            return Err(Error::OutOfRange(format!(
                "delay {} leaves no room for the envelope",
                self.delay
            )));
        }
        if self.release_duration == 0 {
            return Err(Error::OutOfRange("release duration must be non-zero".into()));
        }
        if self.sustain > self.peak {
            return Err(Error::OutOfRange(format!(
                "sustain {} above peak {}",
                self.sustain, self.peak
            )));
        }
        Ok(())
    }

    /// Value reported while idle
    pub fn silent(&self) -> u8 {
        match self.gain_mode {
            GainMode::Attenuation => SILENT,
            GainMode::Amplitude => 0,
        }
    }

    /// First time unit of the sustain region
    pub fn sustain_start(&self) -> u8 {
        self.delay.saturating_add(self.decay_end)
    }

    /// First release time unit for a definition
    pub fn release_start(&self, def: &EnvelopeDef) -> u8 {
        def.release_start.max(self.sustain_start())
    }

    /// First time unit past the release (at most `MAX_TIME_UNIT + 1`)
    pub fn release_end(&self, def: &EnvelopeDef) -> u8 {
        let end = self.release_start(def) as u16 + self.release_duration as u16;
        end.min(MAX_TIME_UNIT as u16 + 1) as u8
    }

    /// Number of samples a note occupies its voice, delay included
    pub fn note_samples(&self, def: &EnvelopeDef) -> u32 {
        def.time_scale as u32 * self.release_end(def) as u32
    }

    /// Amplitude level (0..=255) at a time unit
    pub fn level(&self, def: &EnvelopeDef, unit: u8) -> u8 {
        let release_start = self.release_start(def);
        let release_end = self.release_end(def);

        if unit < self.delay {
            return 0;
        }

        let t = unit - self.delay;
        if t < self.attack_end {
            blend(self.peak, t, self.attack_end)
        } else if t < self.decay_end {
            let span = (self.decay_end - self.attack_end) as u16;
            let delta = (self.peak - self.sustain) as u16 * (self.decay_end - t) as u16;
            self.sustain + (delta / span) as u8
        } else if unit < release_start {
            self.sustain
        } else if unit < release_end {
            blend(self.sustain, release_end - unit, release_end - release_start)
        } else {
            0
        }
    }

    /// Convert a level to the reported gain
    pub fn gain(&self, level: u8) -> u8 {
        match self.gain_mode {
            // 128..=255 -> 0, 64..=127 -> 1, ..., 1 -> 7, 0 -> SILENT
            GainMode::Attenuation => level.leading_zeros() as u8,
            GainMode::Amplitude => level,
        }
    }
}

/// Half linear ramp, half exponential curve, reaching `target` at `t == span`
fn blend(target: u8, t: u8, span: u8) -> u8 {
    if span == 0 {
        return target;
    }
    let linear = target as u16 * t as u16 / span as u16;
    let shift = (span - t) as u16 * 8 / span as u16;
    let exponential = (target as u16) >> shift;
    ((linear + exponential) / 2) as u8
}

/// Per-voice envelope state
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    profile: EnvelopeProfile,
    def: EnvelopeDef,
    /// Samples left before the next time unit
    next_event: u16,
    /// Current time unit, or `IDLE`
    counter: u8,
    gain: u8,
}

impl EnvelopeGenerator {
    pub fn new(profile: EnvelopeProfile) -> Self {
        Self {
            profile,
            def: EnvelopeDef::default(),
            next_event: WAIT_FOREVER,
            counter: IDLE,
            gain: profile.silent(),
        }
    }

    pub fn profile(&self) -> &EnvelopeProfile {
        &self.profile
    }

    /// Start a new note. A zero time scale leaves the generator idle.
    pub fn configure(&mut self, def: EnvelopeDef) {
        self.def = def;
        if def.time_scale == 0 {
            self.reset();
            return;
        }
        self.counter = 0;
        self.gain = self.profile.gain(self.profile.level(&def, 0));
        self.next_event = def.time_scale - 1;
    }

    /// Advance by one sample and return the current gain
    pub fn advance(&mut self) -> u8 {
        if self.next_event > 0 {
            self.next_event -= 1;
            return self.gain;
        }

        if self.counter == IDLE {
            self.next_event = WAIT_FOREVER;
            return self.gain;
        }

        self.counter += 1;
        if self.counter >= self.profile.release_end(&self.def) {
            self.reset();
            return self.gain;
        }

        self.gain = self.profile.gain(self.profile.level(&self.def, self.counter));
        self.next_event = self.def.time_scale - 1;
        self.gain
    }

    /// Move to the next time unit on the following advance
    pub fn continue_now(&mut self) {
        if self.counter != IDLE {
            self.next_event = 0;
        }
    }

    /// Note-off: jump to the release phase unless already there
    pub fn release(&mut self) {
        if self.counter == IDLE {
            return;
        }
        let release_start = self.profile.release_start(&self.def);
        if self.counter + 1 < release_start {
            self.counter = release_start - 1;
            self.next_event = 0;
        }
    }

    /// Force the idle state
    pub fn reset(&mut self) {
        self.counter = IDLE;
        self.gain = self.profile.silent();
        self.next_event = WAIT_FOREVER;
    }

    pub fn is_idle(&self) -> bool {
        self.counter == IDLE
    }

    /// Current time unit, `None` when idle
    pub fn time_unit(&self) -> Option<u8> {
        (self.counter != IDLE).then_some(self.counter)
    }

    pub fn gain(&self) -> u8 {
        self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(time_scale: u16, release_start: u8) -> EnvelopeDef {
        EnvelopeDef {
            time_scale,
            release_start,
        }
    }

    /// Collect the gain reported at each time unit
    fn unit_gains(profile: EnvelopeProfile, d: EnvelopeDef) -> Vec<(u8, u8)> {
        let mut env = EnvelopeGenerator::new(profile);
        env.configure(d);
        let mut gains = vec![(0, env.gain())];
        while !env.is_idle() {
            let before = env.time_unit();
            let gain = env.advance();
            if let Some(unit) = env.time_unit() {
                if Some(unit) != before {
                    gains.push((unit, gain));
                }
            }
        }
        gains
    }

    #[test]
    fn test_zero_time_scale_stays_idle() {
        let mut env = EnvelopeGenerator::new(EnvelopeProfile::default());
        env.configure(def(0, 40));
        assert!(env.is_idle());
        for _ in 0..1000 {
            assert_eq!(env.advance(), SILENT);
            assert!(env.is_idle());
        }
    }

    #[test]
    fn test_note_length_in_samples() {
        let profile = EnvelopeProfile::default();
        let d = def(3, 20);
        let mut env = EnvelopeGenerator::new(profile);
        env.configure(d);

        let mut samples = 0;
        while !env.is_idle() {
            env.advance();
            samples += 1;
        }
        assert_eq!(samples, profile.note_samples(&d));
        assert_eq!(samples, 3 * (20 + RELEASE_DURATION as u32));
    }

    #[test]
    fn test_release_end_is_clamped() {
        let profile = EnvelopeProfile::default();
        assert_eq!(profile.release_end(&def(1, 120)), MAX_TIME_UNIT + 1);
        assert_eq!(profile.release_start(&def(1, 2)), DECAY_END);
    }

    #[test]
    fn test_attenuation_monotonic_per_region() {
        let profile = EnvelopeProfile::default();
        let d = def(2, 40);
        let gains = unit_gains(profile, d);
        let release_start = profile.release_start(&d);

        for pair in gains.windows(2) {
            let ((_, a), (unit, b)) = (pair[0], pair[1]);
            if unit < profile.attack_end {
                assert!(b <= a, "attack must not attenuate more at unit {}", unit);
            } else if unit > profile.attack_end && unit < profile.decay_end {
                assert!(b >= a, "decay must not attenuate less at unit {}", unit);
            } else if unit > profile.decay_end && unit < release_start {
                assert_eq!(a, b, "sustain must hold at unit {}", unit);
            } else if unit > release_start {
                assert!(b >= a, "release must not attenuate less at unit {}", unit);
            }
        }
        // Peak reached at the end of the attack
        assert_eq!(profile.level(&d, profile.attack_end), profile.peak);
    }

    #[test]
    fn test_amplitude_monotonic_per_region() {
        let profile = EnvelopeProfile {
            gain_mode: GainMode::Amplitude,
            ..EnvelopeProfile::default()
        };
        let d = def(1, 30);
        let release_start = profile.release_start(&d);
        let release_end = profile.release_end(&d);

        for unit in 1..profile.attack_end {
            assert!(profile.level(&d, unit) >= profile.level(&d, unit - 1));
        }
        for unit in profile.attack_end + 1..profile.decay_end {
            assert!(profile.level(&d, unit) <= profile.level(&d, unit - 1));
        }
        for unit in profile.decay_end..release_start {
            assert_eq!(profile.level(&d, unit), profile.sustain);
        }
        for unit in release_start + 1..release_end {
            assert!(profile.level(&d, unit) <= profile.level(&d, unit - 1));
        }
        assert_eq!(profile.level(&d, release_start), profile.sustain);
        assert_eq!(profile.level(&d, 0), 0);
    }

    #[test]
    fn test_delay_region_is_silent() {
        let profile = EnvelopeProfile {
            delay: 6,
            attack_end: 4,
            decay_end: 8,
            ..EnvelopeProfile::default()
        };
        profile.validate().unwrap();
        let d = def(3, 30);

        for unit in 0..profile.delay {
            assert_eq!(profile.level(&d, unit), 0);
        }
        assert_eq!(profile.level(&d, profile.delay + profile.attack_end), profile.peak);
        assert_eq!(profile.sustain_start(), 14);

        let mut env = EnvelopeGenerator::new(profile);
        env.configure(d);
        let delay_samples = d.time_scale as u32 * profile.delay as u32;
        let mut samples = 0;
        while !env.is_idle() {
            let gain = env.advance();
            if samples + 1 < delay_samples {
                assert_eq!(gain, SILENT, "sample {}", samples);
            }
            samples += 1;
        }
        assert_eq!(samples, profile.note_samples(&d));
        assert_eq!(samples, 3 * (30 + RELEASE_DURATION as u32));
    }

    #[test]
    fn test_delay_monotonic_per_region() {
        let profile = EnvelopeProfile {
            delay: 10,
            attack_end: 4,
            decay_end: 12,
            gain_mode: GainMode::Amplitude,
            ..EnvelopeProfile::default()
        };
        profile.validate().unwrap();
        let d = def(1, 40);
        let attack_start = profile.delay;
        let decay_start = profile.delay + profile.attack_end;
        let release_start = profile.release_start(&d);

        for unit in attack_start + 1..decay_start {
            assert!(profile.level(&d, unit) >= profile.level(&d, unit - 1));
        }
        for unit in decay_start + 1..profile.sustain_start() {
            assert!(profile.level(&d, unit) <= profile.level(&d, unit - 1));
        }
        for unit in profile.sustain_start()..release_start {
            assert_eq!(profile.level(&d, unit), profile.sustain);
        }
        for unit in release_start + 1..profile.release_end(&d) {
            assert!(profile.level(&d, unit) <= profile.level(&d, unit - 1));
        }
    }

    #[test]
    fn test_delay_pushes_release_start() {
        let profile = EnvelopeProfile {
            delay: 20,
            ..EnvelopeProfile::default()
        };
        profile.validate().unwrap();
        let d = def(2, 16);
        assert_eq!(profile.release_start(&d), 36);
        assert_eq!(profile.note_samples(&d), 2 * (36 + RELEASE_DURATION as u32));

        let bad = EnvelopeProfile {
            delay: 120,
            ..EnvelopeProfile::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_continue_now_skips_wait() {
        let mut env = EnvelopeGenerator::new(EnvelopeProfile::default());
        env.configure(def(100, 40));
        env.advance();
        assert_eq!(env.time_unit(), Some(0));
        env.continue_now();
        env.advance();
        assert_eq!(env.time_unit(), Some(1));
    }

    #[test]
    fn test_release_jumps_to_release_phase() {
        let profile = EnvelopeProfile::default();
        let mut env = EnvelopeGenerator::new(profile);
        env.configure(def(10, 60));
        env.release();
        env.advance();
        assert_eq!(env.time_unit(), Some(60));
        assert_eq!(env.gain(), profile.gain(profile.sustain));
    }

    #[test]
    fn test_reset_frees_voice() {
        let mut env = EnvelopeGenerator::new(EnvelopeProfile::default());
        env.configure(def(10, 60));
        assert!(!env.is_idle());
        env.reset();
        assert!(env.is_idle());
        assert_eq!(env.advance(), SILENT);
    }

    #[test]
    fn test_profile_validation() {
        assert!(EnvelopeProfile::default().validate().is_ok());
        let bad = EnvelopeProfile {
            decay_end: DECAY_END + 1,
            ..EnvelopeProfile::default()
        };
        assert!(bad.validate().is_err());
        let bad = EnvelopeProfile {
            sustain: 200,
            peak: 100,
            ..EnvelopeProfile::default()
        };
        assert!(bad.validate().is_err());
    }
}
