mod classifier;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use classifier::{classify, EmotionClassifier, HISTORY_CAPACITY};

/// Declaration order is the tie-break order for [`EmotionClassifier::trend`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Neutral,
    Distressed,
    Excited,
    Calm,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Distressed,
        Emotion::Excited,
        Emotion::Calm,
    ];
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

/// One classified tick. `timestamp` is the offset from session start.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionSample {
    pub timestamp: Duration,
    pub volume: f32,
    pub pitch_hz: f32,
    pub tempo_bpm: f32,
    pub emotion: Emotion,
    pub is_vocalizing: bool,
    pub confidence: f32,
}
