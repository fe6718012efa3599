//! The session state machine: Discovery, Expression, Creation, Summary.
//!
//! A session runs as one cooperative task. All waiting goes through
//! [`PhaseOrchestrator::wait`], which also fires the 1 Hz emotion tick and
//! enforces the session ceiling, so a listening window is just a bounded loop
//! of waits and feature reads on the same task. Only one window can be open
//! at a time and nothing outlives the phase that opened it.

mod clock;
mod timings;
mod window;

pub use clock::{Clock, TokioClock, VirtualClock};
pub use timings::PhaseTimings;
pub use window::{ListenFor, ListeningWindow, WindowOutcome};

use crate::achievements::{newly_earned_badges, newly_unlocked_environments, Achievement};
use crate::catalog::{ContentCatalog, RhythmPattern, SoundItem};
use crate::challenge::{today_key, ChallengeKind, ChallengeTracker};
use crate::config::{ComfortSound, Preferences, Profile, SessionCeiling};
use crate::difficulty::{filter_by_difficulty, DifficultyController};
use crate::emotion::{EmotionClassifier, EngagementLevel};
use crate::playback::{tone_clip, AudioClip, PlaybackSink};
use crate::session::{EmotionalState, SessionData, SessionEvent, SessionPhase, SessionSummary};
use crate::signal::FeatureSource;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub const ENCOURAGEMENTS: [&str; 10] = [
    "Amazing work, superstar!",
    "That was PERFECT!",
    "You're a sound explorer!",
    "What a wonderful sound!",
    "I love how you did that!",
    "You're so talented!",
    "That made Echo's ears happy!",
    "Beautiful! Let's try another!",
    "You're the best sound maker!",
    "Echo is so proud of you!",
];

const COMFORT_FALLBACK: &str = "Echo is right here with you. You're doing great!";

/// The session ceiling elapsed; whatever phase was running is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CeilingReached;

/// What a finished session hands back for the caller to persist.
#[derive(Clone, Debug)]
pub struct SessionOutcome {
    pub data: SessionData,
    pub summary: SessionSummary,
    pub new_achievements: Vec<Achievement>,
}

pub struct PhaseOrchestrator<F, K, P> {
    features: F,
    clock: K,
    playback: P,
    catalog: ContentCatalog,
    timings: PhaseTimings,
    preferences: Preferences,
    ceiling: SessionCeiling,
    comfort_sounds: Vec<ComfortSound>,
    history: Vec<SessionData>,
    achievements: Vec<Achievement>,
    unlocked_environments: Vec<String>,
    classifier: EmotionClassifier,
    difficulty: DifficultyController,
    challenge: ChallengeTracker,
    date_key: String,
    events: Option<UnboundedSender<SessionEvent>>,
    rng: StdRng,
    session: SessionData,
    phase: SessionPhase,
    started_at: Duration,
    next_tick: Duration,
    deadline: Duration,
    last_engagement: Option<EngagementLevel>,
}

impl<F, K, P> PhaseOrchestrator<F, K, P>
where
    F: FeatureSource,
    K: Clock,
    P: PlaybackSink,
{
    pub fn new(features: F, clock: K, playback: P) -> Self {
        let preferences = Preferences::default();
        let start_time = Utc::now();
        Self {
            features,
            clock,
            playback,
            catalog: ContentCatalog::default(),
            timings: PhaseTimings::default(),
            ceiling: preferences.max_session_minutes,
            difficulty: DifficultyController::new(
                preferences.difficulty_mode,
                preferences.difficulty,
            ),
            preferences,
            comfort_sounds: Vec::new(),
            history: Vec::new(),
            achievements: Vec::new(),
            unlocked_environments: Vec::new(),
            classifier: EmotionClassifier::new(),
            challenge: ChallengeTracker::new(),
            date_key: today_key(),
            events: None,
            rng: StdRng::from_os_rng(),
            session: SessionData::new(&session_id_for(start_time), "", start_time),
            phase: SessionPhase::Discovery,
            started_at: Duration::ZERO,
            next_tick: Duration::ZERO,
            deadline: Duration::ZERO,
            last_engagement: None,
        }
    }

    /// Takes preferences, comfort sounds, history, achievements and the
    /// stored daily challenge from `profile`.
    pub fn with_profile(mut self, profile: &Profile) -> Self {
        self.preferences = profile.preferences;
        self.ceiling = profile.preferences.max_session_minutes;
        self.difficulty = DifficultyController::new(
            profile.preferences.difficulty_mode,
            profile.preferences.difficulty,
        );
        self.comfort_sounds = profile.comfort_sounds.clone();
        self.history = profile.session_history.clone();
        self.achievements = profile.achievements.clone();
        self.unlocked_environments = profile.progression.unlocked_environments.clone();
        self.challenge = ChallengeTracker::with_active(profile.daily_challenge.clone());
        self.session.child_name = profile.child_name.clone();
        self
    }

    pub fn with_catalog(mut self, catalog: ContentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_timings(mut self, timings: PhaseTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_session_ceiling(mut self, ceiling: SessionCeiling) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_date_key<S: Into<String>>(mut self, date_key: S) -> Self {
        self.date_key = date_key.into();
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_session_id(mut self, id: &str) -> Self {
        self.session.id = id.to_owned();
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Runs the whole session to Summary and tears it down.
    pub async fn run(mut self) -> SessionOutcome {
        self.begin();

        let ended_early = match self.play().await {
            Ok(()) => false,
            Err(CeilingReached) => {
                tracing::info!(
                    phase = ?self.phase,
                    ceiling_minutes = self.ceiling.minutes(),
                    "session ceiling reached; wrapping up"
                );
                true
            }
        };

        self.enter_phase(SessionPhase::Summary);
        let outcome = self.summarize(ended_early);
        self.teardown();
        outcome
    }

    fn begin(&mut self) {
        let now = self.clock.now();
        self.started_at = now;
        self.next_tick = now + self.timings.emotion_tick;
        self.deadline = now + self.ceiling.duration();
        self.phase = SessionPhase::Discovery;

        self.challenge.ensure_for(&self.date_key);

        if let Err(e) = self.features.start() {
            self.emit(SessionEvent::CaptureUnavailable {
                details: e.to_string(),
            });
        }

        tracing::info!(
            session_id = %self.session.id,
            child = %self.session.child_name,
            difficulty = ?self.difficulty.level(),
            mode = ?self.difficulty.mode(),
            ceiling_minutes = self.ceiling.minutes(),
            "session started"
        );
    }

    async fn play(&mut self) -> Result<(), CeilingReached> {
        self.discovery().await?;
        self.enter_phase(SessionPhase::Expression);
        self.expression().await?;
        self.enter_phase(SessionPhase::Creation);
        self.creation().await
    }

    async fn discovery(&mut self) -> Result<(), CeilingReached> {
        let items = filter_by_difficulty(&self.catalog.discovery_sounds, self.difficulty.level());
        self.say("Let's hear what the world is whispering...");
        self.wait(self.timings.discovery_intro).await?;

        for item in &items {
            self.present(item);
            self.say(&format!("Listen... {}", item.description));
            self.wait(self.timings.discovery_listen).await?;

            self.session.sounds_discovered.push(item.id.clone());
            self.emit(SessionEvent::SoundDiscovered {
                id: item.id.clone(),
            });
            self.progress_challenge(ChallengeKind::Discover);
            self.wait(self.timings.discovery_gap).await?;
        }

        self.say(&format!(
            "Wow! You discovered {} sounds!",
            self.session.sounds_discovered.len()
        ));
        self.wait(self.timings.phase_outro).await
    }

    async fn expression(&mut self) -> Result<(), CeilingReached> {
        let items = filter_by_difficulty(&self.catalog.animal_sounds, self.difficulty.level());
        self.say("Now it's YOUR turn to make sounds! Let's be animals together!");
        self.wait(self.timings.expression_intro).await?;

        for item in &items {
            self.present(item);
            self.say(&format!("Echo makes: {}", item.display_name));
            self.wait(self.timings.expression_demonstration).await?;

            self.say(&format!(
                "Now YOU try! Can you sound like a {}?",
                item.display_name
            ));
            self.emit(SessionEvent::ListeningStarted {
                phase: self.phase,
                id: item.id.clone(),
            });
            let outcome = self
                .listen(
                    ListeningWindow::voice(self.timings.expression_max_polls),
                    self.timings.expression_poll_interval,
                )
                .await?;
            let matched = outcome.is_matched();

            self.session.sounds_imitated.push(item.id.clone());
            self.emit(SessionEvent::SoundImitated {
                id: item.id.clone(),
                matched,
            });
            self.record_performance(matched);
            self.progress_challenge(ChallengeKind::Imitate);

            if matched {
                self.encourage();
                self.wait(self.timings.expression_after_success).await?;
            } else {
                self.say("That's okay! Sometimes we need time to think. Let's try together!");
                self.wait(self.timings.expression_after_timeout).await?;
            }
        }

        self.say(&format!(
            "Amazing! You made {} different animal sounds!",
            self.session.sounds_imitated.len()
        ));
        self.wait(self.timings.phase_outro).await
    }

    async fn creation(&mut self) -> Result<(), CeilingReached> {
        let patterns = filter_by_difficulty(&self.catalog.rhythm_patterns, self.difficulty.level());
        self.say("Let's create our own special song, you lead!");
        self.wait(self.timings.creation_intro).await?;

        for pattern in &patterns {
            self.emit(SessionEvent::ItemPresented {
                phase: self.phase,
                id: pattern.id.clone(),
            });
            self.say(&format!("Echo plays: {}", pattern.name));
            self.play_pattern(pattern).await?;
            self.wait(self.timings.creation_listen_delay).await?;

            self.say("Now YOU make the beat! Clap along!");
            self.emit(SessionEvent::ListeningStarted {
                phase: self.phase,
                id: pattern.id.clone(),
            });
            let outcome = self
                .listen(
                    ListeningWindow::claps(
                        pattern.beat_count(),
                        self.timings.clap_volume_threshold,
                        self.timings.creation_max_polls,
                    ),
                    self.timings.creation_poll_interval,
                )
                .await?;
            let matched = outcome.is_matched();

            self.session.rhythms_created += 1;
            self.emit(SessionEvent::RhythmCompleted {
                id: pattern.id.clone(),
                matched,
                claps: outcome.claps(),
            });
            self.record_performance(matched);
            self.progress_challenge(ChallengeKind::Rhythm);

            if matched {
                self.encourage();
                self.wait(self.timings.creation_after_success).await?;
            } else {
                self.say("Great effort! Every beat you make is special!");
                self.wait(self.timings.creation_after_attempt).await?;
            }
        }

        self.free_play().await?;
        self.say("What an amazing musical adventure! You're a true rhythm master!");
        self.wait(self.timings.phase_outro).await
    }

    async fn play_pattern(&mut self, pattern: &RhythmPattern) -> Result<(), CeilingReached> {
        for beat in &pattern.pattern {
            if *beat == 1 {
                let clip = tone_clip(self.timings.rhythm_tone_hz, self.timings.rhythm_tone);
                self.play_clip(clip).await;
            }
            self.wait(self.timings.rhythm_beat).await?;
        }
        Ok(())
    }

    async fn free_play(&mut self) -> Result<(), CeilingReached> {
        self.say("Now make ANY beat you want! You're the band leader!");
        let until = self.clock.now() + self.timings.free_play;
        while self.clock.now() < until {
            self.wait(self.timings.free_play_poll_interval).await?;
            let volume = self.features.volume();
            if volume > self.timings.free_play_encourage_volume
                && self.rng.random_bool(self.timings.free_play_encourage_chance)
            {
                self.encourage();
            }
        }
        Ok(())
    }

    async fn listen(
        &mut self,
        mut window: ListeningWindow,
        interval: Duration,
    ) -> Result<WindowOutcome, CeilingReached> {
        loop {
            self.wait(interval).await?;
            let features = self.features.features();
            tracing::debug!(
                poll = window.polls() + 1,
                volume = features.volume,
                vocalizing = features.is_vocalizing,
                "listening poll"
            );
            match window.poll(&features) {
                WindowOutcome::Pending => continue,
                done => return Ok(done),
            }
        }
    }

    /// Sleeps for `duration` of session time, firing every emotion tick that
    /// falls due along the way. Fails once the session ceiling has passed.
    async fn wait(&mut self, duration: Duration) -> Result<(), CeilingReached> {
        let until = self.clock.now() + duration;
        loop {
            let now = self.clock.now();
            if now >= self.deadline {
                return Err(CeilingReached);
            }
            if now >= self.next_tick {
                self.emotion_tick().await;
                self.next_tick += self.timings.emotion_tick;
                if self.next_tick <= now {
                    self.next_tick = now + self.timings.emotion_tick;
                }
                continue;
            }
            if now >= until {
                return Ok(());
            }
            let wake = until.min(self.next_tick).min(self.deadline);
            self.clock.sleep(wake - now).await;
        }
    }

    async fn emotion_tick(&mut self) {
        let at = self.clock.now().saturating_sub(self.started_at);
        let sample = self.classifier.analyze(self.features.features(), at);
        self.session.emotional_states.push(EmotionalState {
            timestamp: at,
            emotion: sample.emotion,
            confidence: sample.confidence,
        });

        let engagement = self.classifier.engagement_level();
        if self.last_engagement != Some(engagement) {
            self.last_engagement = Some(engagement);
            self.emit(SessionEvent::EngagementChanged { level: engagement });
        }

        if self.preferences.auto_comfort_enabled && self.classifier.should_trigger_comfort() {
            self.comfort().await;
        }
    }

    async fn comfort(&mut self) {
        if self.comfort_sounds.is_empty() {
            tracing::info!("comfort triggered without recorded comfort sounds");
            self.emit(SessionEvent::ComfortTriggered { sound_id: None });
            self.say(COMFORT_FALLBACK);
            return;
        }

        let index = self.rng.random_range(0..self.comfort_sounds.len());
        let sound = self.comfort_sounds[index].clone();
        tracing::info!(sound_id = %sound.id, label = %sound.label, "playing comfort sound");
        self.emit(SessionEvent::ComfortTriggered {
            sound_id: Some(sound.id.clone()),
        });
        self.say("Let's hear your special sound...");
        self.play_clip(sound.clip).await;
        self.session.comfort_sounds_played.push(sound.id);
    }

    async fn play_clip(&mut self, clip: AudioClip) {
        if let Err(e) = self.playback.play(clip).await {
            tracing::warn!(error = %e, "playback failed; continuing");
        }
    }

    fn record_performance(&mut self, success: bool) {
        let engagement = self.classifier.engagement_level();
        if let Some(level) = self.difficulty.record_performance(success, engagement) {
            self.emit(SessionEvent::DifficultyChanged { level });
        }
    }

    fn progress_challenge(&mut self, kind: ChallengeKind) {
        if let Some(progress) = self.challenge.record_progress(kind, 1) {
            self.emit(SessionEvent::ChallengeProgressed(progress));
        }
    }

    fn enter_phase(&mut self, to: SessionPhase) {
        let from = self.phase;
        if to <= from {
            return;
        }
        tracing::info!(?from, ?to, "phase changed");
        self.phase = to;
        self.session.furthest_phase = self.session.furthest_phase.max(to);
        self.emit(SessionEvent::PhaseChanged { from, to });
    }

    fn present(&mut self, item: &SoundItem) {
        self.emit(SessionEvent::ItemPresented {
            phase: self.phase,
            id: item.id.clone(),
        });
    }

    fn encourage(&mut self) {
        let text = ENCOURAGEMENTS[self.rng.random_range(0..ENCOURAGEMENTS.len())];
        self.emit(SessionEvent::Encouragement {
            text: text.to_owned(),
        });
    }

    /// Companion speech; only surfaced when captions are on.
    fn say(&mut self, text: &str) {
        if self.preferences.accessibility.captions {
            self.emit(SessionEvent::Caption {
                text: text.to_owned(),
            });
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        if tx.send(event).is_err() {
            tracing::warn!("session event receiver dropped; further events are discarded");
            self.events = None;
        }
    }

    fn summarize(&mut self, ended_early: bool) -> SessionOutcome {
        let elapsed = self.clock.now().saturating_sub(self.started_at);
        self.session.total_duration = elapsed;
        self.session.end_time = end_time(self.session.start_time, elapsed);

        let mut history = self.history.clone();
        history.push(self.session.clone());

        let badges = newly_earned_badges(&history, &self.achievements);
        let earned_at = self.session.end_time.unwrap_or(self.session.start_time);
        let new_achievements: Vec<Achievement> = badges
            .iter()
            .map(|badge| Achievement {
                badge_id: *badge,
                earned_at,
                session_id: self.session.id.clone(),
            })
            .collect();
        for badge in &badges {
            tracing::info!(?badge, "badge earned");
            self.emit(SessionEvent::BadgeEarned { badge: *badge });
        }

        let environments_unlocked =
            newly_unlocked_environments(history.len(), &self.unlocked_environments);

        let summary = SessionSummary {
            session_id: self.session.id.clone(),
            furthest_phase: self.session.furthest_phase,
            ended_early,
            sounds_discovered: self.session.sounds_discovered.len() as u32,
            sounds_imitated: self.session.sounds_imitated.len() as u32,
            rhythms_created: self.session.rhythms_created,
            comfort_sounds_played: self.session.comfort_sounds_played.len() as u32,
            total_duration: elapsed,
            dominant_emotion: self.session.dominant_emotion(),
            final_difficulty: self.difficulty.level(),
            badges_earned: badges,
            environments_unlocked,
            daily_challenge: self.challenge.active().cloned(),
        };

        tracing::info!(
            session_id = %summary.session_id,
            ended_early,
            discovered = summary.sounds_discovered,
            imitated = summary.sounds_imitated,
            rhythms = summary.rhythms_created,
            duration_secs = elapsed.as_secs(),
            "session ended"
        );
        self.emit(SessionEvent::SessionEnded(Box::new(summary.clone())));

        SessionOutcome {
            data: self.session.clone(),
            summary,
            new_achievements,
        }
    }

    fn teardown(&mut self) {
        self.classifier.reset();
        self.features.stop();
        self.last_engagement = None;
    }
}

fn session_id_for(start_time: DateTime<Utc>) -> String {
    format!("session-{}", start_time.timestamp_millis())
}

fn end_time(start: DateTime<Utc>, elapsed: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(elapsed)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
}
