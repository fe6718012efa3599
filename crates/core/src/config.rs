use crate::achievements::{Achievement, DEFAULT_ENVIRONMENT_ID};
use crate::challenge::DailyChallenge;
use crate::difficulty::{DifficultyLevel, DifficultyMode};
use crate::playback::AudioClip;
use crate::session::SessionData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_SESSION_MINUTES: u32 = 15;
pub const ENV_PROFILE: &str = "SOUND_SAFARI_PROFILE";
pub const ENV_INPUT_DEVICE: &str = "SOUND_SAFARI_INPUT_DEVICE";
pub const ENV_OUTPUT_DEVICE: &str = "SOUND_SAFARI_OUTPUT_DEVICE";
pub const ENV_MAX_SESSION_MINUTES: &str = "SOUND_SAFARI_MAX_SESSION_MINUTES";

/// Upper bound on active session time before the session is forced to wrap up.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionCeiling {
    minutes: u32,
}

impl SessionCeiling {
    pub fn new(minutes: u32) -> Result<Self, ConfigError> {
        if minutes == 0 {
            return Err(ConfigError::ZeroSessionCeiling);
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.minutes) * 60)
    }
}

impl Default for SessionCeiling {
    fn default() -> Self {
        Self {
            minutes: DEFAULT_MAX_SESSION_MINUTES,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccessibilitySettings {
    pub color_blind_mode: bool,
    pub captions: bool,
    pub reduced_motion: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub difficulty_mode: DifficultyMode,
    /// Pinned level in fixed mode, starting level in adaptive mode.
    pub difficulty: DifficultyLevel,
    pub max_session_minutes: SessionCeiling,
    pub auto_comfort_enabled: bool,
    pub accessibility: AccessibilitySettings,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            difficulty_mode: DifficultyMode::Fixed,
            difficulty: DifficultyLevel::Easy,
            max_session_minutes: SessionCeiling::default(),
            auto_comfort_enabled: true,
            accessibility: AccessibilitySettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComfortKind {
    Kiss,
    Lullaby,
    Phrase,
    Song,
}

/// A caregiver-recorded clip played when the child seems distressed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ComfortSound {
    pub id: String,
    pub kind: ComfortKind,
    pub label: String,
    pub clip: AudioClip,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Progression {
    pub current_environment_id: String,
    pub unlocked_environments: Vec<String>,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            current_environment_id: DEFAULT_ENVIRONMENT_ID.to_owned(),
            unlocked_environments: vec![DEFAULT_ENVIRONMENT_ID.to_owned()],
        }
    }
}

/// Everything the core needs to know about a child. Storage is the caller's job.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Profile {
    pub child_name: String,
    pub age_months: u32,
    pub preferences: Preferences,
    pub comfort_sounds: Vec<ComfortSound>,
    pub favorite_animals: Vec<String>,
    pub session_history: Vec<SessionData>,
    pub achievements: Vec<Achievement>,
    pub progression: Progression,
    pub daily_challenge: Option<DailyChallenge>,
}

impl Profile {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let profile: Profile =
            serde_json::from_str(json).map_err(|e| ConfigError::MalformedProfile {
                details: e.to_string(),
            })?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        SessionCeiling::new(self.preferences.max_session_minutes.minutes())?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max session duration must be > 0 minutes")]
    ZeroSessionCeiling,
    #[error("invalid number for {key}: {value:?}")]
    InvalidNumber { key: String, value: String },
    #[error("malformed profile: {details}")]
    MalformedProfile { details: String },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

/// Flag, then environment, then the profile's own setting.
pub fn resolve_session_ceiling(
    cli_minutes: Option<u32>,
    env: &impl Env,
    profile: SessionCeiling,
) -> Result<SessionCeiling, ConfigError> {
    if let Some(m) = cli_minutes {
        return SessionCeiling::new(m);
    }
    match env.var(ENV_MAX_SESSION_MINUTES) {
        Some(raw) => {
            let minutes = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: ENV_MAX_SESSION_MINUTES.to_owned(),
                    value: raw.clone(),
                })?;
            SessionCeiling::new(minutes)
        }
        None => Ok(profile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_rejects_zero() {
        assert_eq!(SessionCeiling::new(0), Err(ConfigError::ZeroSessionCeiling));
        assert_eq!(
            SessionCeiling::new(2).expect("nonzero").duration(),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn ceiling_cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_MAX_SESSION_MINUTES, "20");
        let c = resolve_session_ceiling(Some(5), &env, SessionCeiling::default()).expect("valid");
        assert_eq!(c.minutes(), 5);
    }

    #[test]
    fn ceiling_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_MAX_SESSION_MINUTES, " 20 ");
        let c = resolve_session_ceiling(None, &env, SessionCeiling::default()).expect("valid");
        assert_eq!(c.minutes(), 20);
    }

    #[test]
    fn ceiling_profile_used_when_both_missing() {
        let profile = SessionCeiling::new(7).expect("nonzero");
        let c = resolve_session_ceiling(None, &MapEnv::default(), profile).expect("valid");
        assert_eq!(c, profile);
    }

    #[test]
    fn ceiling_env_must_be_numeric() {
        let env = MapEnv::default().with_var(ENV_MAX_SESSION_MINUTES, "soon");
        assert!(matches!(
            resolve_session_ceiling(None, &env, SessionCeiling::default()),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn optional_string_cli_then_env() {
        let env = MapEnv::default().with_var(ENV_INPUT_DEVICE, "usb mic");
        assert_eq!(
            resolve_optional_string(Some("built-in".to_owned()), ENV_INPUT_DEVICE, &env).as_deref(),
            Some("built-in")
        );
        assert_eq!(
            resolve_optional_string(None, ENV_INPUT_DEVICE, &env).as_deref(),
            Some("usb mic")
        );
    }

    #[test]
    fn minimal_profile_fills_defaults() {
        let p = Profile::from_json(r#"{"child_name": "Sam"}"#).expect("valid profile");
        assert_eq!(p.child_name, "Sam");
        assert_eq!(p.preferences.max_session_minutes.minutes(), DEFAULT_MAX_SESSION_MINUTES);
        assert!(p.preferences.auto_comfort_enabled);
        assert_eq!(p.preferences.difficulty_mode, DifficultyMode::Fixed);
        assert_eq!(p.progression.current_environment_id, DEFAULT_ENVIRONMENT_ID);
    }

    #[test]
    fn profile_preferences_parse() {
        let p = Profile::from_json(
            r#"{
                "child_name": "Ada",
                "preferences": {
                    "difficulty_mode": "adaptive",
                    "difficulty": "medium",
                    "max_session_minutes": 10,
                    "accessibility": { "captions": true }
                }
            }"#,
        )
        .expect("valid profile");
        assert_eq!(p.preferences.difficulty_mode, DifficultyMode::Adaptive);
        assert_eq!(p.preferences.difficulty, DifficultyLevel::Medium);
        assert_eq!(p.preferences.max_session_minutes.minutes(), 10);
        assert!(p.preferences.accessibility.captions);
        assert!(!p.preferences.accessibility.reduced_motion);
    }

    #[test]
    fn zero_minute_profile_is_rejected() {
        let err = Profile::from_json(r#"{"preferences": {"max_session_minutes": 0}}"#)
            .expect_err("zero ceiling");
        assert_eq!(err, ConfigError::ZeroSessionCeiling);
    }

    #[test]
    fn malformed_profile_is_reported() {
        assert!(matches!(
            Profile::from_json("{"),
            Err(ConfigError::MalformedProfile { .. })
        ));
    }
}
