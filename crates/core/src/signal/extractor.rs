use crate::capture::{AudioCapture, CaptureError};
use crate::signal::{is_voice_like, tempo_proxy, AudioFeatures, FeatureSource, FFT_SIZE};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::TAU;
use std::sync::Arc;

/// Bins whose normalized magnitude falls below this are treated as silent,
/// so an idle microphone reports a pitch of 0 Hz.
const MIN_BIN_MAGNITUDE: f32 = 1e-4;

pub struct SignalExtractor<C> {
    capture: C,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_gain: f32,
    unavailable_reported: bool,
}

impl<C: AudioCapture> SignalExtractor<C> {
    pub fn new(capture: C) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = hann_window(FFT_SIZE);
        let window_gain = window.iter().sum::<f32>();

        Self {
            capture,
            fft,
            window,
            window_gain,
            unavailable_reported: false,
        }
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    /// Root-mean-square of the time-domain window, in [0, 1].
    pub fn volume(&self) -> f32 {
        match self.read_window() {
            Some(samples) => rms(&samples),
            None => 0.0,
        }
    }

    /// Frequency of the loudest bin. A dominant-frequency estimate, not pitch.
    pub fn pitch_hz(&self) -> f32 {
        match self.read_window() {
            Some(samples) => self.peak_frequency(&samples),
            None => 0.0,
        }
    }

    pub fn tempo_bpm(&self) -> f32 {
        tempo_proxy(self.volume())
    }

    pub fn is_vocalizing(&self) -> bool {
        self.features().is_vocalizing
    }

    fn read_window(&self) -> Option<Vec<f32>> {
        if !self.capture.is_running() {
            return None;
        }
        let mut samples = vec![0.0_f32; FFT_SIZE];
        let n = self.capture.read_frame(&mut samples);
        if n < FFT_SIZE {
            // Right-align what we have so the newest audio is at the end.
            samples.rotate_right(FFT_SIZE - n);
        }
        Some(samples)
    }

    fn peak_frequency(&self, samples: &[f32]) -> f32 {
        let mut buf: Vec<Complex<f32>> = samples
            .iter()
            .zip(&self.window)
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buf);

        let scale = 2.0 / self.window_gain;
        let mut max_index = 0;
        let mut max_value = 0.0_f32;
        for (i, c) in buf.iter().take(FFT_SIZE / 2).enumerate() {
            let magnitude = c.norm() * scale;
            if magnitude >= MIN_BIN_MAGNITUDE && magnitude > max_value {
                max_value = magnitude;
                max_index = i;
            }
        }

        max_index as f32 * self.capture.sample_rate() as f32 / FFT_SIZE as f32
    }
}

impl<C: AudioCapture> FeatureSource for SignalExtractor<C> {
    /// All four features from a single read of the capture window.
    fn features(&self) -> AudioFeatures {
        let Some(samples) = self.read_window() else {
            return AudioFeatures::SILENCE;
        };
        let volume = rms(&samples);
        let pitch_hz = self.peak_frequency(&samples);

        AudioFeatures {
            volume,
            pitch_hz,
            tempo_bpm: tempo_proxy(volume),
            is_vocalizing: is_voice_like(volume, pitch_hz),
        }
    }

    fn volume(&self) -> f32 {
        SignalExtractor::volume(self)
    }

    /// On failure every query keeps returning silence; the error is surfaced
    /// to this caller only.
    fn start(&mut self) -> Result<(), CaptureError> {
        match self.capture.start() {
            Ok(()) => Ok(()),
            Err(e) => {
                if !self.unavailable_reported {
                    tracing::warn!(error = %e, "audio input unavailable; features degrade to silence");
                    self.unavailable_reported = true;
                }
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        self.capture.stop();
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt().clamp(0.0, 1.0)
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (TAU * i as f32 / len as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Signal, SyntheticCapture};

    // 48 kHz / 2048 points puts bin k at exactly k * 23.4375 Hz.
    const BIN_HZ: f32 = 23.4375;

    fn started(signal: Signal) -> SignalExtractor<SyntheticCapture> {
        let mut ex = SignalExtractor::new(SyntheticCapture::new(signal));
        FeatureSource::start(&mut ex).expect("synthetic start");
        ex
    }

    #[test]
    fn silence_reads_as_zero() {
        let ex = started(Signal::Silence);
        let f = ex.features();
        assert_eq!(f.volume, 0.0);
        assert_eq!(f.pitch_hz, 0.0);
        assert!(!f.is_vocalizing);
    }

    #[test]
    fn sine_volume_is_rms() {
        let ex = started(Signal::Sine {
            freq_hz: 10.0 * BIN_HZ,
            amplitude: 0.5,
        });
        let expected = 0.5 / 2.0_f32.sqrt();
        assert!((ex.volume() - expected).abs() < 1e-3, "volume {}", ex.volume());
    }

    #[test]
    fn pitch_is_peak_bin_frequency() {
        let ex = started(Signal::Sine {
            freq_hz: 10.0 * BIN_HZ,
            amplitude: 0.5,
        });
        assert_eq!(ex.pitch_hz(), 10.0 * BIN_HZ);
        assert!(ex.is_vocalizing());
        assert_eq!(ex.tempo_bpm(), crate::signal::FAST_TEMPO_BPM);
    }

    #[test]
    fn high_tone_is_outside_voice_band() {
        let ex = started(Signal::Sine {
            freq_hz: 40.0 * BIN_HZ,
            amplitude: 0.5,
        });
        assert_eq!(ex.pitch_hz(), 40.0 * BIN_HZ);
        assert!(!ex.features().is_vocalizing);
    }

    #[test]
    fn unavailable_device_degrades_to_silence() {
        let mut ex = SignalExtractor::new(SyntheticCapture::unavailable());
        let err = FeatureSource::start(&mut ex).expect_err("start should fail");
        assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
        assert_eq!(ex.features(), AudioFeatures::SILENCE);
        assert_eq!(ex.pitch_hz(), 0.0);
    }

    #[test]
    fn stop_returns_to_silence() {
        let mut ex = started(Signal::Sine {
            freq_hz: 10.0 * BIN_HZ,
            amplitude: 0.5,
        });
        FeatureSource::stop(&mut ex);
        assert_eq!(ex.features(), AudioFeatures::SILENCE);
    }
}
