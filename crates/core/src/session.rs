use crate::achievements::BadgeId;
use crate::challenge::{ChallengeProgress, DailyChallenge};
use crate::difficulty::DifficultyLevel;
use crate::emotion::{Emotion, EngagementLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Forward-only. `Ord` follows play order.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Discovery,
    Expression,
    Creation,
    Summary,
}

impl SessionPhase {
    /// The phase that follows; `Summary` is terminal.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Discovery => Some(Self::Expression),
            Self::Expression => Some(Self::Creation),
            Self::Creation => Some(Self::Summary),
            Self::Summary => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionalState {
    pub timestamp: Duration,
    pub emotion: Emotion,
    pub confidence: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub id: String,
    pub child_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub furthest_phase: SessionPhase,
    pub sounds_discovered: Vec<String>,
    pub sounds_imitated: Vec<String>,
    pub rhythms_created: u32,
    pub emotional_states: Vec<EmotionalState>,
    pub comfort_sounds_played: Vec<String>,
    pub total_duration: Duration,
}

impl SessionData {
    pub fn new(id: &str, child_name: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.to_owned(),
            child_name: child_name.to_owned(),
            start_time,
            end_time: None,
            furthest_phase: SessionPhase::Discovery,
            sounds_discovered: Vec::new(),
            sounds_imitated: Vec::new(),
            rhythms_created: 0,
            emotional_states: Vec::new(),
            comfort_sounds_played: Vec::new(),
            total_duration: Duration::ZERO,
        }
    }

    /// Most frequent emotion across the whole session, `Neutral` when empty.
    pub fn dominant_emotion(&self) -> Emotion {
        let mut counts = [0_usize; Emotion::ALL.len()];
        for s in &self.emotional_states {
            if let Some(i) = Emotion::ALL.iter().position(|e| *e == s.emotion) {
                counts[i] += 1;
            }
        }
        match counts.iter().enumerate().max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0))) {
            Some((i, n)) if *n > 0 => Emotion::ALL[i],
            _ => Emotion::Neutral,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub furthest_phase: SessionPhase,
    /// The ceiling cut the session short.
    pub ended_early: bool,
    pub sounds_discovered: u32,
    pub sounds_imitated: u32,
    pub rhythms_created: u32,
    pub comfort_sounds_played: u32,
    pub total_duration: Duration,
    pub dominant_emotion: Emotion,
    pub final_difficulty: DifficultyLevel,
    pub badges_earned: Vec<BadgeId>,
    pub environments_unlocked: Vec<String>,
    pub daily_challenge: Option<DailyChallenge>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    ItemPresented {
        phase: SessionPhase,
        id: String,
    },
    ListeningStarted {
        phase: SessionPhase,
        id: String,
    },
    SoundDiscovered {
        id: String,
    },
    /// `matched` is false when the window timed out.
    SoundImitated {
        id: String,
        matched: bool,
    },
    RhythmCompleted {
        id: String,
        matched: bool,
        claps: u32,
    },
    ComfortTriggered {
        sound_id: Option<String>,
    },
    DifficultyChanged {
        level: DifficultyLevel,
    },
    EngagementChanged {
        level: EngagementLevel,
    },
    ChallengeProgressed(ChallengeProgress),
    CaptureUnavailable {
        details: String,
    },
    Caption {
        text: String,
    },
    Encouragement {
        text: String,
    },
    BadgeEarned {
        badge: BadgeId,
    },
    SessionEnded(Box<SessionSummary>),
}
