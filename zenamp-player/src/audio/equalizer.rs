//! Three-band equalizer (bass / mid / treble)
//!
//! Each channel runs a low shelf, a peaking band and a high shelf in series
//! (RBJ cookbook biquads). Coefficients depend on the sample rate, so an
//! `Equalizer` is built for one rate and channel count and must be replaced,
//! not retuned, when a track with a different format is loaded.
//!
//! When disabled, [`Equalizer::process_sample`] returns its input untouched.

use serde::Deserialize;
use std::f32::consts::PI;

const BASS_FREQ: f32 = 100.0;
const MID_FREQ: f32 = 1_000.0;
const MID_Q: f32 = 0.707;
const TREBLE_FREQ: f32 = 8_000.0;
const SHELF_SLOPE: f32 = 1.0;

/// Gains are limited to this many dB either way
pub const MAX_GAIN_DB: f32 = 24.0;

/// User-facing equalizer knobs
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EqualizerSettings {
    pub enabled: bool,
    pub bass_db: f32,
    pub mid_db: f32,
    pub treble_db: f32,
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bass_db: 0.0,
            mid_db: 0.0,
            treble_db: 0.0,
        }
    }
}

impl EqualizerSettings {
    /// Limit gains to ±MAX_GAIN_DB; non-finite gains become 0
    pub fn clamped(self) -> Self {
        let clamp = |db: f32| {
            if db.is_finite() {
                db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
            } else {
                0.0
            }
        };
        Self {
            enabled: self.enabled,
            bass_db: clamp(self.bass_db),
            mid_db: clamp(self.mid_db),
            treble_db: clamp(self.treble_db),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BiquadCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

/// Transposed direct form II biquad
#[derive(Debug, Clone, Copy)]
struct Biquad {
    coeffs: BiquadCoefficients,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, sample: f32) -> f32 {
        let y = self.coeffs.b0 * sample + self.z1;
        self.z1 = self.coeffs.b1 * sample - self.coeffs.a1 * y + self.z2;
        self.z2 = self.coeffs.b2 * sample - self.coeffs.a2 * y;
        y
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[derive(Debug, Clone)]
struct ChannelFilters {
    bass: Biquad,
    mid: Biquad,
    treble: Biquad,
}

impl ChannelFilters {
    fn new(sample_rate: f32, settings: &EqualizerSettings) -> Self {
        let (bass, mid, treble) = band_coefficients(sample_rate, settings);
        Self {
            bass: Biquad::new(bass),
            mid: Biquad::new(mid),
            treble: Biquad::new(treble),
        }
    }

    fn retune(&mut self, sample_rate: f32, settings: &EqualizerSettings) {
        let (bass, mid, treble) = band_coefficients(sample_rate, settings);
        self.bass.coeffs = bass;
        self.mid.coeffs = mid;
        self.treble.coeffs = treble;
    }

    fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
    }
}

/// Per-channel filter bank for one sample rate
#[derive(Debug, Clone)]
pub struct Equalizer {
    sample_rate: u32,
    channels: u16,
    settings: EqualizerSettings,
    filters: Vec<ChannelFilters>,
}

impl Equalizer {
    pub fn new(sample_rate: u32, channels: u16, settings: EqualizerSettings) -> Self {
        let settings = settings.clamped();
        let rate = sample_rate.max(1) as f32;
        let filters = (0..channels.max(1))
            .map(|_| ChannelFilters::new(rate, &settings))
            .collect();
        Self {
            sample_rate,
            channels,
            settings,
            filters,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn settings(&self) -> EqualizerSettings {
        self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Whether this instance was built for `sample_rate`/`channels`
    pub fn matches(&self, sample_rate: u32, channels: u16) -> bool {
        self.sample_rate == sample_rate && self.channels == channels
    }

    /// Apply new settings at the same sample rate.
    ///
    /// Gain changes keep the filter history; toggling `enabled` clears it so a
    /// re-enabled filter does not ring with stale state.
    pub fn set_settings(&mut self, settings: EqualizerSettings) {
        let settings = settings.clamped();
        let rate = self.sample_rate.max(1) as f32;
        let toggled = settings.enabled != self.settings.enabled;
        for chain in &mut self.filters {
            chain.retune(rate, &settings);
            if toggled {
                chain.reset();
            }
        }
        self.settings = settings;
    }

    /// Filter one sample of `channel`, returning a clamped i16
    #[inline]
    pub fn process_sample(&mut self, input: i16, channel: usize) -> i16 {
        if !self.settings.enabled {
            return input;
        }
        let Some(chain) = self.filters.get_mut(channel) else {
            return input;
        };

        let x = input as f32;
        let y = chain.treble.process(chain.mid.process(chain.bass.process(x)));
        y.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    /// Clear filter history on every channel
    pub fn reset(&mut self) {
        for chain in &mut self.filters {
            chain.reset();
        }
    }
}

fn band_coefficients(
    sample_rate: f32,
    settings: &EqualizerSettings,
) -> (BiquadCoefficients, BiquadCoefficients, BiquadCoefficients) {
    (
        low_shelf_coefficients(sample_rate, BASS_FREQ, settings.bass_db, SHELF_SLOPE),
        peaking_coefficients(sample_rate, MID_FREQ, settings.mid_db, MID_Q),
        high_shelf_coefficients(sample_rate, TREBLE_FREQ, settings.treble_db, SHELF_SLOPE),
    )
}

fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Keep band centres below Nyquist for low sample rates (8 kHz telephony WAVs etc.)
fn sanitize_frequency(frequency: f32, sample_rate: f32) -> f32 {
    frequency.clamp(10.0, sample_rate * 0.45)
}

fn normalize(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> BiquadCoefficients {
    let inv_a0 = if a0.abs() > f32::EPSILON { 1.0 / a0 } else { 1.0 };
    BiquadCoefficients {
        b0: b0 * inv_a0,
        b1: b1 * inv_a0,
        b2: b2 * inv_a0,
        a1: a1 * inv_a0,
        a2: a2 * inv_a0,
    }
}

fn peaking_coefficients(sample_rate: f32, frequency: f32, gain_db: f32, q: f32) -> BiquadCoefficients {
    let w0 = 2.0 * PI * sanitize_frequency(frequency, sample_rate) / sample_rate;
    let alpha = w0.sin() / (2.0 * q);
    let a = db_to_gain(gain_db / 2.0);
    let cos_w0 = w0.cos();

    normalize(
        1.0 + alpha * a,
        -2.0 * cos_w0,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_w0,
        1.0 - alpha / a,
    )
}

fn low_shelf_coefficients(sample_rate: f32, frequency: f32, gain_db: f32, slope: f32) -> BiquadCoefficients {
    let w0 = 2.0 * PI * sanitize_frequency(frequency, sample_rate) / sample_rate;
    let a = db_to_gain(gain_db / 2.0);
    let cos_w0 = w0.cos();
    let alpha = w0.sin() * 0.5 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
    let beta = 2.0 * a.sqrt() * alpha;

    normalize(
        a * ((a + 1.0) - (a - 1.0) * cos_w0 + beta),
        2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
        a * ((a + 1.0) - (a - 1.0) * cos_w0 - beta),
        (a + 1.0) + (a - 1.0) * cos_w0 + beta,
        -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
        (a + 1.0) + (a - 1.0) * cos_w0 - beta,
    )
}

fn high_shelf_coefficients(sample_rate: f32, frequency: f32, gain_db: f32, slope: f32) -> BiquadCoefficients {
    let w0 = 2.0 * PI * sanitize_frequency(frequency, sample_rate) / sample_rate;
    let a = db_to_gain(gain_db / 2.0);
    let cos_w0 = w0.cos();
    let alpha = w0.sin() * 0.5 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
    let beta = 2.0 * a.sqrt() * alpha;

    normalize(
        a * ((a + 1.0) + (a - 1.0) * cos_w0 + beta),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
        a * ((a + 1.0) + (a - 1.0) * cos_w0 - beta),
        (a + 1.0) - (a - 1.0) * cos_w0 + beta,
        2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
        (a + 1.0) - (a - 1.0) * cos_w0 - beta,
    )
}
