use crate::emotion::EngagementLevel;
use serde::{Deserialize, Serialize};

const PROMOTE_AFTER_SUCCESSES: u32 = 3;
const DEMOTE_AFTER_STRUGGLES: u32 = 2;

#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub fn harder(self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            Self::Medium | Self::Hard => Self::Hard,
        }
    }

    pub fn easier(self) -> Self {
        match self {
            Self::Easy | Self::Medium => Self::Easy,
            Self::Hard => Self::Medium,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyMode {
    #[default]
    Fixed,
    Adaptive,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceStreaks {
    pub success_streak: u32,
    pub struggle_streak: u32,
}

impl PerformanceStreaks {
    pub fn record(&mut self, success: bool) {
        if success {
            self.success_streak = self.success_streak.saturating_add(1);
            self.struggle_streak = 0;
        } else {
            self.struggle_streak = self.struggle_streak.saturating_add(1);
            self.success_streak = 0;
        }
    }
}

/// Owns the session's difficulty tier. Only [`record_performance`] moves it.
///
/// [`record_performance`]: DifficultyController::record_performance
#[derive(Clone, Debug)]
pub struct DifficultyController {
    mode: DifficultyMode,
    level: DifficultyLevel,
    streaks: PerformanceStreaks,
}

impl DifficultyController {
    /// In fixed mode `level` is pinned; in adaptive mode it is the starting tier.
    pub fn new(mode: DifficultyMode, level: DifficultyLevel) -> Self {
        Self {
            mode,
            level,
            streaks: PerformanceStreaks::default(),
        }
    }

    pub fn mode(&self) -> DifficultyMode {
        self.mode
    }

    pub fn level(&self) -> DifficultyLevel {
        self.level
    }

    pub fn streaks(&self) -> PerformanceStreaks {
        self.streaks
    }

    /// Returns the new level when it changed.
    ///
    /// Promotion and demotion are both evaluated from the current level and
    /// demotion is applied last, so when both fire the net move is one tier
    /// down.
    pub fn record_performance(
        &mut self,
        success: bool,
        engagement: EngagementLevel,
    ) -> Option<DifficultyLevel> {
        if self.mode == DifficultyMode::Fixed {
            return None;
        }

        self.streaks.record(success);

        let current = self.level;
        let mut next = current;
        if self.streaks.success_streak >= PROMOTE_AFTER_SUCCESSES
            && engagement == EngagementLevel::High
        {
            next = current.harder();
        }
        if self.streaks.struggle_streak >= DEMOTE_AFTER_STRUGGLES
            || engagement == EngagementLevel::Low
        {
            next = current.easier();
        }

        if next == current {
            return None;
        }

        tracing::info!(from = ?current, to = ?next, ?engagement, "difficulty changed");
        self.level = next;
        Some(next)
    }
}

/// Content carrying a difficulty tag.
pub trait Tiered {
    fn difficulty(&self) -> DifficultyLevel;
}

/// Items at or below `level`, in their original order.
pub fn filter_by_difficulty<T: Tiered + Clone>(items: &[T], level: DifficultyLevel) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.difficulty() <= level)
        .cloned()
        .collect()
}
