//! Turns the capture window into coarse per-tick features.
//!
//! These are heuristics, not analysis-grade measurements: "pitch" is the
//! frequency of the loudest FFT bin and "tempo" is a two-level proxy keyed off
//! loudness.

mod extractor;

use crate::capture::CaptureError;
use serde::{Deserialize, Serialize};

pub use extractor::SignalExtractor;

pub const FFT_SIZE: usize = 2048;

pub const VOCAL_VOLUME_THRESHOLD: f32 = 0.1;
pub const VOCAL_BAND_MIN_HZ: f32 = 85.0;
pub const VOCAL_BAND_MAX_HZ: f32 = 500.0;

pub const FAST_TEMPO_VOLUME_THRESHOLD: f32 = 0.15;
pub const FAST_TEMPO_BPM: f32 = 120.0;
pub const SLOW_TEMPO_BPM: f32 = 80.0;

/// One feature tick. Immutable once produced.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioFeatures {
    pub volume: f32,
    pub pitch_hz: f32,
    pub tempo_bpm: f32,
    pub is_vocalizing: bool,
}

impl AudioFeatures {
    /// What an idle or unavailable microphone reads as.
    pub const SILENCE: AudioFeatures = AudioFeatures {
        volume: 0.0,
        pitch_hz: 0.0,
        tempo_bpm: SLOW_TEMPO_BPM,
        is_vocalizing: false,
    };

    /// Derives tempo and the vocalizing flag from raw volume and pitch the same
    /// way [`SignalExtractor`] does.
    pub fn from_levels(volume: f32, pitch_hz: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        let pitch_hz = pitch_hz.max(0.0);
        Self {
            volume,
            pitch_hz,
            tempo_bpm: tempo_proxy(volume),
            is_vocalizing: is_voice_like(volume, pitch_hz),
        }
    }
}

impl Default for AudioFeatures {
    fn default() -> Self {
        Self::SILENCE
    }
}

pub fn tempo_proxy(volume: f32) -> f32 {
    if volume > FAST_TEMPO_VOLUME_THRESHOLD {
        FAST_TEMPO_BPM
    } else {
        SLOW_TEMPO_BPM
    }
}

pub fn is_voice_like(volume: f32, pitch_hz: f32) -> bool {
    volume > VOCAL_VOLUME_THRESHOLD && pitch_hz > VOCAL_BAND_MIN_HZ && pitch_hz < VOCAL_BAND_MAX_HZ
}

/// Anything that can answer feature queries for the current instant.
///
/// Consumers only read; a source never changes state because it was queried.
pub trait FeatureSource {
    fn features(&self) -> AudioFeatures;

    fn volume(&self) -> f32 {
        self.features().volume
    }

    fn is_vocalizing(&self) -> bool {
        self.features().is_vocalizing
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn stop(&mut self) {}
}
