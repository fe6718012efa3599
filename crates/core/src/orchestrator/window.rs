use crate::signal::AudioFeatures;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ListenFor {
    /// Any vocalizing poll.
    Voice,
    /// `needed` polls louder than `threshold`.
    Claps { needed: u32, threshold: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowOutcome {
    Pending,
    Matched { polls: u32, claps: u32 },
    TimedOut { polls: u32, claps: u32 },
}

impl WindowOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    pub fn claps(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Matched { claps, .. } | Self::TimedOut { claps, .. } => *claps,
        }
    }
}

/// A bounded run of polls awaiting a response. The window closes on the
/// first match or after `max_polls`; a closed window keeps reporting the
/// outcome it closed with.
#[derive(Clone, Debug)]
pub struct ListeningWindow {
    target: ListenFor,
    max_polls: u32,
    polls: u32,
    claps: u32,
    closed: Option<WindowOutcome>,
}

impl ListeningWindow {
    pub fn new(target: ListenFor, max_polls: u32) -> Self {
        Self {
            target,
            max_polls,
            polls: 0,
            claps: 0,
            closed: None,
        }
    }

    pub fn voice(max_polls: u32) -> Self {
        Self::new(ListenFor::Voice, max_polls)
    }

    pub fn claps(needed: u32, threshold: f32, max_polls: u32) -> Self {
        Self::new(ListenFor::Claps { needed, threshold }, max_polls)
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn poll(&mut self, features: &AudioFeatures) -> WindowOutcome {
        if let Some(outcome) = self.closed {
            return outcome;
        }

        self.polls += 1;
        let matched = match self.target {
            ListenFor::Voice => features.is_vocalizing,
            ListenFor::Claps { needed, threshold } => {
                if features.volume > threshold {
                    self.claps += 1;
                }
                self.claps >= needed
            }
        };

        let outcome = if matched {
            WindowOutcome::Matched {
                polls: self.polls,
                claps: self.claps,
            }
        } else if self.polls >= self.max_polls {
            WindowOutcome::TimedOut {
                polls: self.polls,
                claps: self.claps,
            }
        } else {
            return WindowOutcome::Pending;
        };

        tracing::debug!(?outcome, "listening window closed");
        self.closed = Some(outcome);
        outcome
    }
}
