//! One deterministic challenge per calendar day.
//!
//! The challenge for a date key is a pure function of that key: the numeric
//! components of the key are summed and the sum picks a template and a reward.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Discover,
    Imitate,
    Rhythm,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Sticker,
    Badge,
    Environment,
    Bonus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChallengeTemplate {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: ChallengeKind,
    pub target: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reward {
    pub label: &'static str,
    pub kind: RewardKind,
}

pub const CHALLENGE_TEMPLATES: [ChallengeTemplate; 3] = [
    ChallengeTemplate {
        id: "discover-3",
        title: "Sound Scout",
        description: "Discover 3 new sounds today.",
        kind: ChallengeKind::Discover,
        target: 3,
    },
    ChallengeTemplate {
        id: "imitate-4",
        title: "Animal Echo",
        description: "Imitate 4 animal sounds today.",
        kind: ChallengeKind::Imitate,
        target: 4,
    },
    ChallengeTemplate {
        id: "rhythm-2",
        title: "Rhythm Ranger",
        description: "Create 2 rhythms today.",
        kind: ChallengeKind::Rhythm,
        target: 2,
    },
];

pub const DAILY_REWARDS: [Reward; 4] = [
    Reward {
        label: "New Sticker Pack",
        kind: RewardKind::Sticker,
    },
    Reward {
        label: "Mini Badge Boost",
        kind: RewardKind::Badge,
    },
    Reward {
        label: "Environment Bonus",
        kind: RewardKind::Environment,
    },
    Reward {
        label: "Score Boost",
        kind: RewardKind::Bonus,
    },
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyChallenge {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ChallengeKind,
    pub target: u32,
    pub progress: u32,
    pub reward: String,
    pub reward_kind: RewardKind,
    pub date_key: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeProgress {
    pub challenge_id: String,
    pub progress: u32,
    pub target: u32,
    pub completed: bool,
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn today_key() -> String {
    date_key(Local::now().date_naive())
}

/// Sum of the digit runs in `date_key`; anything else is a separator.
pub fn seed_for(date_key: &str) -> u64 {
    date_key
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|part| part.parse::<u64>().ok())
        .fold(0_u64, |sum, n| sum.wrapping_add(n))
}

#[derive(Clone, Debug, Default)]
pub struct ChallengeTracker {
    active: Option<DailyChallenge>,
}

impl ChallengeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from a persisted challenge.
    pub fn with_active(challenge: Option<DailyChallenge>) -> Self {
        Self { active: challenge }
    }

    pub fn generate(date_key: &str) -> DailyChallenge {
        let seed = seed_for(date_key);
        let template = &CHALLENGE_TEMPLATES[(seed % CHALLENGE_TEMPLATES.len() as u64) as usize];
        let reward = &DAILY_REWARDS[(seed % DAILY_REWARDS.len() as u64) as usize];

        DailyChallenge {
            id: format!("{}-{}", template.id, date_key),
            title: template.title.to_owned(),
            description: template.description.to_owned(),
            kind: template.kind,
            target: template.target,
            progress: 0,
            reward: reward.label.to_owned(),
            reward_kind: reward.kind,
            date_key: date_key.to_owned(),
            completed: false,
            completed_at: None,
        }
    }

    /// Makes the challenge for `date_key` the active one. A challenge already
    /// stored for the same key is kept with its progress.
    pub fn ensure_for(&mut self, date_key: &str) -> &DailyChallenge {
        let stale = self
            .active
            .as_ref()
            .map_or(true, |c| c.date_key != date_key);
        if stale {
            let challenge = Self::generate(date_key);
            tracing::info!(
                challenge_id = %challenge.id,
                target = challenge.target,
                "daily challenge generated"
            );
            self.active = Some(challenge);
        }
        self.active.get_or_insert_with(|| Self::generate(date_key))
    }

    pub fn active(&self) -> Option<&DailyChallenge> {
        self.active.as_ref()
    }

    pub fn into_active(self) -> Option<DailyChallenge> {
        self.active
    }

    /// No-op (returns `None`) without an active challenge, once it is
    /// completed, or when `kind` does not match.
    pub fn record_progress(&mut self, kind: ChallengeKind, amount: u32) -> Option<ChallengeProgress> {
        let challenge = self.active.as_mut()?;
        if challenge.completed || challenge.kind != kind || amount == 0 {
            return None;
        }

        challenge.progress = challenge
            .progress
            .saturating_add(amount)
            .min(challenge.target);
        if challenge.progress >= challenge.target {
            challenge.completed = true;
            challenge.completed_at = Some(Utc::now());
            tracing::info!(challenge_id = %challenge.id, "daily challenge completed");
        }

        Some(ChallengeProgress {
            challenge_id: challenge.id.clone(),
            progress: challenge.progress,
            target: challenge.target,
            completed: challenge.completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_sums_numeric_components() {
        assert_eq!(seed_for("2024-05-01"), 2030);
        assert_eq!(seed_for("2024/5/1"), 2030);
        assert_eq!(seed_for("today"), 0);
    }

    #[test]
    fn generate_is_deterministic() {
        let a = ChallengeTracker::generate("2024-05-01");
        let b = ChallengeTracker::generate("2024-05-01");
        assert_eq!((a.kind, a.target, &a.reward), (b.kind, b.target, &b.reward));
        assert_eq!(a, b);

        // 2030 % 3 == 2, 2030 % 4 == 2
        assert_eq!(a.kind, ChallengeKind::Rhythm);
        assert_eq!(a.target, 2);
        assert_eq!(a.reward_kind, RewardKind::Environment);
        assert_eq!(a.id, "rhythm-2-2024-05-01");
        assert_eq!(a.progress, 0);
        assert!(!a.completed);
    }

    #[test]
    fn date_key_is_iso() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
        assert_eq!(date_key(d), "2024-05-01");
    }

    #[test]
    fn progress_is_capped_and_completion_is_final() {
        let mut t = ChallengeTracker::new();
        t.ensure_for("2024-05-01");

        let p = t.record_progress(ChallengeKind::Rhythm, 1).expect("progressed");
        assert_eq!((p.progress, p.completed), (1, false));

        let p = t.record_progress(ChallengeKind::Rhythm, 5).expect("progressed");
        assert_eq!((p.progress, p.completed), (2, true));

        let before = t.active().cloned().expect("active challenge");
        assert!(before.completed_at.is_some());
        assert_eq!(t.record_progress(ChallengeKind::Rhythm, 1), None);
        assert_eq!(t.active(), Some(&before));
    }

    #[test]
    fn mismatched_kind_and_missing_challenge_are_ignored() {
        let mut t = ChallengeTracker::new();
        assert_eq!(t.record_progress(ChallengeKind::Discover, 1), None);

        t.ensure_for("2024-05-01");
        assert_eq!(t.record_progress(ChallengeKind::Discover, 1), None);
        assert_eq!(t.active().map(|c| c.progress), Some(0));
    }

    #[test]
    fn ensure_for_only_regenerates_on_new_day() {
        let mut t = ChallengeTracker::new();
        t.ensure_for("2024-05-01");
        t.record_progress(ChallengeKind::Rhythm, 1);

        assert_eq!(t.ensure_for("2024-05-01").progress, 1);

        let next = t.ensure_for("2024-05-02");
        assert_eq!(next.date_key, "2024-05-02");
        assert_eq!(next.progress, 0);
    }
}
