use std::time::Duration;

/// Every delay, poll cadence and threshold a session runs on.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseTimings {
    pub emotion_tick: Duration,
    pub phase_outro: Duration,

    pub discovery_intro: Duration,
    pub discovery_listen: Duration,
    pub discovery_gap: Duration,

    pub expression_intro: Duration,
    pub expression_demonstration: Duration,
    pub expression_poll_interval: Duration,
    pub expression_max_polls: u32,
    pub expression_after_success: Duration,
    pub expression_after_timeout: Duration,

    pub creation_intro: Duration,
    pub rhythm_beat: Duration,
    pub rhythm_tone_hz: f32,
    pub rhythm_tone: Duration,
    pub creation_listen_delay: Duration,
    pub creation_poll_interval: Duration,
    pub creation_max_polls: u32,
    pub clap_volume_threshold: f32,
    pub creation_after_success: Duration,
    pub creation_after_attempt: Duration,

    pub free_play: Duration,
    pub free_play_poll_interval: Duration,
    pub free_play_encourage_volume: f32,
    pub free_play_encourage_chance: f64,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            emotion_tick: Duration::from_secs(1),
            phase_outro: Duration::from_secs(5),

            discovery_intro: Duration::from_secs(2),
            discovery_listen: Duration::from_secs(3),
            discovery_gap: Duration::from_millis(2500),

            expression_intro: Duration::from_millis(2500),
            expression_demonstration: Duration::from_millis(3500),
            expression_poll_interval: Duration::from_secs(1),
            expression_max_polls: 15,
            expression_after_success: Duration::from_secs(3),
            expression_after_timeout: Duration::from_millis(2500),

            creation_intro: Duration::from_millis(2500),
            rhythm_beat: Duration::from_millis(500),
            rhythm_tone_hz: 400.0,
            rhythm_tone: Duration::from_millis(200),
            creation_listen_delay: Duration::from_secs(1),
            creation_poll_interval: Duration::from_millis(500),
            creation_max_polls: 20,
            clap_volume_threshold: 0.3,
            creation_after_success: Duration::from_secs(3),
            creation_after_attempt: Duration::from_millis(2500),

            free_play: Duration::from_secs(30),
            free_play_poll_interval: Duration::from_secs(1),
            free_play_encourage_volume: 0.2,
            free_play_encourage_chance: 0.1,
        }
    }
}
