use crate::emotion::{Emotion, EmotionSample, EngagementLevel};
use crate::signal::AudioFeatures;
use crate::util::RingBuffer;
use std::time::Duration;

pub const HISTORY_CAPACITY: usize = 30;

const RECENT_WINDOW: usize = 10;
const MIN_SAMPLES: usize = 5;
const COMFORT_WINDOW: usize = 5;
const COMFORT_DISTRESS_COUNT: usize = 3;

/// Rule table, first match wins.
///
/// Rows overlap: pitch > 350, volume > 0.4 and tempo > 110 satisfy both the
/// excited and the distressed rows, and excited is listed first.
pub fn classify(features: &AudioFeatures) -> (Emotion, f32) {
    let AudioFeatures {
        volume,
        pitch_hz: pitch,
        tempo_bpm: tempo,
        is_vocalizing,
    } = *features;

    if !is_vocalizing {
        (Emotion::Neutral, 0.5)
    } else if pitch > 300.0 && volume > 0.3 && tempo > 110.0 {
        (Emotion::Excited, 0.8)
    } else if pitch < 200.0 && volume < 0.2 && tempo < 90.0 {
        (Emotion::Calm, 0.75)
    } else if pitch > 350.0 && volume > 0.4 {
        (Emotion::Distressed, 0.7)
    } else if pitch > 200.0 && pitch < 300.0 && volume > 0.15 {
        (Emotion::Happy, 0.7)
    } else {
        (Emotion::Neutral, 0.0)
    }
}

/// Classifies feature ticks and keeps the last [`HISTORY_CAPACITY`] results
/// for trend, engagement and comfort decisions.
#[derive(Clone, Debug)]
pub struct EmotionClassifier {
    history: RingBuffer<EmotionSample>,
}

impl EmotionClassifier {
    pub fn new() -> Self {
        Self {
            history: RingBuffer::new(HISTORY_CAPACITY),
        }
    }

    pub fn analyze(&mut self, features: AudioFeatures, timestamp: Duration) -> EmotionSample {
        let (emotion, confidence) = classify(&features);
        let sample = EmotionSample {
            timestamp,
            volume: features.volume,
            pitch_hz: features.pitch_hz,
            tempo_bpm: features.tempo_bpm,
            emotion,
            is_vocalizing: features.is_vocalizing,
            confidence,
        };
        tracing::debug!(
            ?emotion,
            confidence,
            volume = features.volume,
            pitch_hz = features.pitch_hz,
            "emotion sample"
        );
        self.history.push(sample);
        sample
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &EmotionSample> {
        self.history.iter()
    }

    /// Majority emotion over the last ten samples. Ties go to the emotion
    /// declared first; fewer than five samples reads as neutral.
    pub fn trend(&self) -> Emotion {
        if self.history.len() < MIN_SAMPLES {
            return Emotion::Neutral;
        }

        let mut counts = [0_usize; Emotion::ALL.len()];
        for s in self.history.recent(RECENT_WINDOW) {
            if let Some(i) = Emotion::ALL.iter().position(|e| *e == s.emotion) {
                counts[i] += 1;
            }
        }

        let mut best = 0;
        for i in 1..counts.len() {
            if counts[i] > counts[best] {
                best = i;
            }
        }
        Emotion::ALL[best]
    }

    pub fn engagement_level(&self) -> EngagementLevel {
        if self.history.len() < MIN_SAMPLES {
            return EngagementLevel::Medium;
        }

        let mut vocalizing = 0_usize;
        let mut volume_sum = 0.0_f32;
        let mut n = 0_usize;
        for s in self.history.recent(RECENT_WINDOW) {
            if s.is_vocalizing {
                vocalizing += 1;
            }
            volume_sum += s.volume;
            n += 1;
        }
        let mean_volume = volume_sum / n as f32;

        if vocalizing >= 7 || mean_volume > 0.3 {
            EngagementLevel::High
        } else if vocalizing >= 3 || mean_volume > 0.15 {
            EngagementLevel::Medium
        } else {
            EngagementLevel::Low
        }
    }

    pub fn should_trigger_comfort(&self) -> bool {
        if self.trend() == Emotion::Distressed {
            return true;
        }
        let distressed = self
            .history
            .recent(COMFORT_WINDOW)
            .filter(|s| s.emotion == Emotion::Distressed)
            .count();
        distressed >= COMFORT_DISTRESS_COUNT
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for EmotionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(volume: f32, pitch_hz: f32, tempo_bpm: f32, is_vocalizing: bool) -> AudioFeatures {
        AudioFeatures {
            volume,
            pitch_hz,
            tempo_bpm,
            is_vocalizing,
        }
    }

    fn silent() -> AudioFeatures {
        features(0.05, 0.0, 80.0, false)
    }

    fn distressed() -> AudioFeatures {
        features(0.5, 400.0, 100.0, true)
    }

    fn feed(c: &mut EmotionClassifier, f: AudioFeatures, n: usize) {
        for i in 0..n {
            c.analyze(f, Duration::from_secs(i as u64));
        }
    }

    #[test]
    fn not_vocalizing_is_neutral_half_confidence() {
        for f in [
            features(0.9, 400.0, 120.0, false),
            features(0.0, 0.0, 80.0, false),
            features(0.2, 250.0, 120.0, false),
        ] {
            assert_eq!(classify(&f), (Emotion::Neutral, 0.5));
        }
    }

    #[test]
    fn rule_table_rows() {
        assert_eq!(classify(&features(0.35, 320.0, 120.0, true)), (Emotion::Excited, 0.8));
        assert_eq!(classify(&features(0.15, 150.0, 80.0, true)), (Emotion::Calm, 0.75));
        assert_eq!(classify(&features(0.5, 400.0, 100.0, true)), (Emotion::Distressed, 0.7));
        assert_eq!(classify(&features(0.2, 250.0, 120.0, true)), (Emotion::Happy, 0.7));
        assert_eq!(classify(&features(0.12, 320.0, 80.0, true)), (Emotion::Neutral, 0.0));
    }

    #[test]
    fn excited_wins_the_overlap_with_distressed() {
        assert_eq!(classify(&features(0.5, 400.0, 120.0, true)), (Emotion::Excited, 0.8));
    }

    #[test]
    fn analyze_excited_scenario() {
        let mut c = EmotionClassifier::new();
        let s = c.analyze(features(0.35, 320.0, 120.0, true), Duration::ZERO);
        assert_eq!(s.emotion, Emotion::Excited);
        assert_eq!(s.confidence, 0.8);
    }

    #[test]
    fn history_is_bounded() {
        let mut c = EmotionClassifier::new();
        for calls in 1..=45 {
            c.analyze(silent(), Duration::from_secs(calls));
            assert_eq!(c.history_len(), (calls as usize).min(HISTORY_CAPACITY));
        }
        let first = c.history().next().expect("non-empty history");
        assert_eq!(first.timestamp, Duration::from_secs(16));
    }

    #[test]
    fn short_history_defaults() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, distressed(), 4);
        assert_eq!(c.trend(), Emotion::Neutral);
        assert_eq!(c.engagement_level(), EngagementLevel::Medium);
    }

    #[test]
    fn silence_does_not_trigger_comfort() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, silent(), 5);
        assert!(!c.should_trigger_comfort());
        assert_eq!(c.trend(), Emotion::Neutral);
        assert_eq!(c.engagement_level(), EngagementLevel::Low);
    }

    #[test]
    fn three_distressed_of_last_five_triggers_comfort() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, silent(), 7);
        c.analyze(distressed(), Duration::from_secs(7));
        c.analyze(silent(), Duration::from_secs(8));
        c.analyze(distressed(), Duration::from_secs(9));
        assert!(!c.should_trigger_comfort());

        c.analyze(distressed(), Duration::from_secs(10));
        assert_eq!(c.trend(), Emotion::Neutral);
        assert!(c.should_trigger_comfort());
    }

    #[test]
    fn distressed_trend_triggers_comfort() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, distressed(), 6);
        assert_eq!(c.trend(), Emotion::Distressed);
        assert!(c.should_trigger_comfort());
    }

    #[test]
    fn trend_tie_goes_to_first_declared() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.35, 320.0, 120.0, true), 5);
        feed(&mut c, features(0.2, 250.0, 120.0, true), 5);
        assert_eq!(c.trend(), Emotion::Happy);
    }

    #[test]
    fn engagement_tiers() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.2, 250.0, 120.0, true), 7);
        feed(&mut c, silent(), 3);
        assert_eq!(c.engagement_level(), EngagementLevel::High);

        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.2, 250.0, 120.0, true), 3);
        feed(&mut c, features(0.0, 0.0, 80.0, false), 7);
        assert_eq!(c.engagement_level(), EngagementLevel::Medium);

        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.5, 900.0, 120.0, false), 10);
        assert_eq!(c.engagement_level(), EngagementLevel::High);
    }

    #[test]
    fn engagement_from_volume_alone() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.2, 900.0, 120.0, false), 10);
        assert_eq!(c.engagement_level(), EngagementLevel::Medium);

        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.2, 250.0, 120.0, true), 2);
        feed(&mut c, features(0.2, 900.0, 120.0, false), 8);
        assert_eq!(c.engagement_level(), EngagementLevel::Medium);

        let mut c = EmotionClassifier::new();
        feed(&mut c, features(0.1, 900.0, 80.0, false), 10);
        assert_eq!(c.engagement_level(), EngagementLevel::Low);
    }

    #[test]
    fn reset_clears_history() {
        let mut c = EmotionClassifier::new();
        feed(&mut c, distressed(), 10);
        c.reset();
        assert_eq!(c.history_len(), 0);
        assert_eq!(c.trend(), Emotion::Neutral);
        assert!(!c.should_trigger_comfort());
    }
}
