//! Badges earned from cumulative session history, and the environments that
//! unlock as sessions accumulate.

use crate::session::{SessionData, SessionPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeId {
    FirstSafari,
    SoundDetective,
    AnimalExpert,
    RhythmMaster,
    BraveExplorer,
    SuperListener,
    VoiceChampion,
    MusicMaker,
    SafariVeteran,
    ComfortFriend,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeRequirement {
    /// Completed sessions.
    Sessions(u32),
    /// Sounds discovered across all sessions.
    Sounds(u32),
    /// Animal sounds imitated across all sessions.
    Animals(u32),
    /// Rhythms created across all sessions.
    Rhythms(u32),
    /// The latest session got through every playable phase with this many of
    /// each: discovered, imitated, rhythms.
    AllPhases {
        discovered: u32,
        imitated: u32,
        rhythms: u32,
    },
    /// Any session played a comfort sound.
    Comfort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Badge {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub requirement: BadgeRequirement,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Achievement {
    pub badge_id: BadgeId,
    pub earned_at: DateTime<Utc>,
    pub session_id: String,
}

pub const AVAILABLE_BADGES: [Badge; 10] = [
    Badge {
        id: BadgeId::FirstSafari,
        name: "First Safari",
        description: "Complete your very first Sound Safari adventure!",
        rarity: Rarity::Common,
        requirement: BadgeRequirement::Sessions(1),
    },
    Badge {
        id: BadgeId::SoundDetective,
        name: "Sound Detective",
        description: "Discover 25 different sounds",
        rarity: Rarity::Common,
        requirement: BadgeRequirement::Sounds(25),
    },
    Badge {
        id: BadgeId::AnimalExpert,
        name: "Animal Expert",
        description: "Imitate 50 animal sounds",
        rarity: Rarity::Rare,
        requirement: BadgeRequirement::Animals(50),
    },
    Badge {
        id: BadgeId::RhythmMaster,
        name: "Rhythm Master",
        description: "Create 30 rhythms",
        rarity: Rarity::Rare,
        requirement: BadgeRequirement::Rhythms(30),
    },
    Badge {
        id: BadgeId::BraveExplorer,
        name: "Brave Explorer",
        description: "Complete all three phases in one session",
        rarity: Rarity::Epic,
        requirement: BadgeRequirement::AllPhases {
            discovered: 5,
            imitated: 8,
            rhythms: 4,
        },
    },
    Badge {
        id: BadgeId::SuperListener,
        name: "Super Listener",
        description: "Discover all sounds in discovery phase",
        rarity: Rarity::Common,
        requirement: BadgeRequirement::Sounds(5),
    },
    Badge {
        id: BadgeId::VoiceChampion,
        name: "Voice Champion",
        description: "Imitate all 8 animals in one session",
        rarity: Rarity::Epic,
        requirement: BadgeRequirement::Animals(8),
    },
    Badge {
        id: BadgeId::MusicMaker,
        name: "Music Maker",
        description: "Complete all rhythm patterns",
        rarity: Rarity::Rare,
        requirement: BadgeRequirement::Rhythms(4),
    },
    Badge {
        id: BadgeId::SafariVeteran,
        name: "Safari Veteran",
        description: "Complete 10 Sound Safari adventures",
        rarity: Rarity::Legendary,
        requirement: BadgeRequirement::Sessions(10),
    },
    Badge {
        id: BadgeId::ComfortFriend,
        name: "Comfort Friend",
        description: "Echo is always here for you",
        rarity: Rarity::Epic,
        requirement: BadgeRequirement::Comfort,
    },
];

/// `history` must already include the session being scored.
pub fn check_badge_earned(badge: &Badge, history: &[SessionData], achievements: &[Achievement]) -> bool {
    if achievements.iter().any(|a| a.badge_id == badge.id) {
        return false;
    }

    let total = |f: fn(&SessionData) -> usize| -> u64 {
        history.iter().map(|s| f(s) as u64).sum()
    };

    match badge.requirement {
        BadgeRequirement::Sessions(n) => history.len() as u64 >= u64::from(n),
        BadgeRequirement::Sounds(n) => total(|s| s.sounds_discovered.len()) >= u64::from(n),
        BadgeRequirement::Animals(n) => total(|s| s.sounds_imitated.len()) >= u64::from(n),
        BadgeRequirement::Rhythms(n) => total(|s| s.rhythms_created as usize) >= u64::from(n),
        BadgeRequirement::AllPhases {
            discovered,
            imitated,
            rhythms,
        } => history.last().is_some_and(|s| {
            s.furthest_phase >= SessionPhase::Creation
                && s.sounds_discovered.len() as u64 >= u64::from(discovered)
                && s.sounds_imitated.len() as u64 >= u64::from(imitated)
                && s.rhythms_created >= rhythms
        }),
        BadgeRequirement::Comfort => history.iter().any(|s| !s.comfort_sounds_played.is_empty()),
    }
}

/// Badges newly earned by the session at the end of `history`, in catalog order.
pub fn newly_earned_badges(history: &[SessionData], achievements: &[Achievement]) -> Vec<BadgeId> {
    AVAILABLE_BADGES
        .iter()
        .filter(|b| check_badge_earned(b, history, achievements))
        .map(|b| b.id)
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Environment {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub unlock_at_sessions: u32,
}

pub const ENVIRONMENTS: [Environment; 5] = [
    Environment {
        id: "savanna",
        name: "Sunny Savanna",
        description: "Warm grasslands with gentle breezes.",
        unlock_at_sessions: 0,
    },
    Environment {
        id: "rainforest",
        name: "Rainforest Canopy",
        description: "Lush leaves and playful raindrops.",
        unlock_at_sessions: 2,
    },
    Environment {
        id: "ocean",
        name: "Ocean Reef",
        description: "Bubbly tides and calming waves.",
        unlock_at_sessions: 4,
    },
    Environment {
        id: "mountain",
        name: "Mountain Meadow",
        description: "Crisp air with echoing sounds.",
        unlock_at_sessions: 6,
    },
    Environment {
        id: "starlight",
        name: "Starlight Sky",
        description: "A sparkling night adventure.",
        unlock_at_sessions: 8,
    },
];

pub const DEFAULT_ENVIRONMENT_ID: &str = ENVIRONMENTS[0].id;

pub fn unlocked_environments(completed_sessions: usize) -> impl Iterator<Item = &'static Environment> {
    ENVIRONMENTS
        .iter()
        .filter(move |e| e.unlock_at_sessions as usize <= completed_sessions)
}

/// Environment ids unlocked by `completed_sessions` that are not in `already`.
pub fn newly_unlocked_environments(completed_sessions: usize, already: &[String]) -> Vec<String> {
    unlocked_environments(completed_sessions)
        .filter(|e| !already.iter().any(|id| id == e.id))
        .map(|e| e.id.to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionData;

    fn session(discovered: usize, imitated: usize, rhythms: u32, phase: SessionPhase) -> SessionData {
        let mut s = SessionData::new("s", "Kid", Utc::now());
        s.sounds_discovered = (0..discovered).map(|i| format!("d{i}")).collect();
        s.sounds_imitated = (0..imitated).map(|i| format!("a{i}")).collect();
        s.rhythms_created = rhythms;
        s.furthest_phase = phase;
        s
    }

    fn badge(id: BadgeId) -> &'static Badge {
        AVAILABLE_BADGES
            .iter()
            .find(|b| b.id == id)
            .expect("badge in catalog")
    }

    #[test]
    fn first_session_earns_first_safari() {
        let history = vec![session(0, 0, 0, SessionPhase::Discovery)];
        assert_eq!(newly_earned_badges(&history, &[]), vec![BadgeId::FirstSafari]);
    }

    #[test]
    fn counts_accumulate_across_sessions() {
        let history = vec![
            session(3, 4, 2, SessionPhase::Expression),
            session(3, 4, 2, SessionPhase::Expression),
        ];
        assert!(check_badge_earned(badge(BadgeId::SuperListener), &history, &[]));
        assert!(check_badge_earned(badge(BadgeId::VoiceChampion), &history, &[]));
        assert!(check_badge_earned(badge(BadgeId::MusicMaker), &history, &[]));
        assert!(!check_badge_earned(badge(BadgeId::SoundDetective), &history, &[]));
    }

    #[test]
    fn earned_badge_is_never_awarded_twice() {
        let history = vec![session(0, 0, 0, SessionPhase::Discovery)];
        let achievements = vec![Achievement {
            badge_id: BadgeId::FirstSafari,
            earned_at: Utc::now(),
            session_id: "old".to_owned(),
        }];
        assert!(newly_earned_badges(&history, &achievements).is_empty());
    }

    #[test]
    fn brave_explorer_needs_creation_and_counts_in_latest_session() {
        let b = badge(BadgeId::BraveExplorer);
        assert!(check_badge_earned(b, &[session(5, 8, 4, SessionPhase::Summary)], &[]));
        assert!(!check_badge_earned(b, &[session(5, 8, 4, SessionPhase::Expression)], &[]));
        assert!(!check_badge_earned(b, &[session(5, 7, 4, SessionPhase::Creation)], &[]));
        assert!(!check_badge_earned(
            b,
            &[session(5, 8, 4, SessionPhase::Creation), session(0, 0, 0, SessionPhase::Discovery)],
            &[]
        ));
    }

    #[test]
    fn comfort_friend_needs_a_played_comfort_sound() {
        let b = badge(BadgeId::ComfortFriend);
        let mut s = session(0, 0, 0, SessionPhase::Discovery);
        assert!(!check_badge_earned(b, std::slice::from_ref(&s), &[]));
        s.comfort_sounds_played.push("kiss".to_owned());
        assert!(check_badge_earned(b, &[s], &[]));
    }

    #[test]
    fn environments_unlock_every_two_sessions() {
        let ids = |n| unlocked_environments(n).map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(0), vec!["savanna"]);
        assert_eq!(ids(3), vec!["savanna", "rainforest"]);
        assert_eq!(ids(8).len(), 5);

        let already = vec!["savanna".to_owned()];
        assert_eq!(newly_unlocked_environments(2, &already), vec!["rainforest".to_owned()]);
        assert!(newly_unlocked_environments(1, &already).is_empty());
    }
}
