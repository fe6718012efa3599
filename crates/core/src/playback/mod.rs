#[cfg(feature = "audio-device")]
mod audio;
mod recording;
mod tone;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "audio-device")]
pub use audio::AudioPlaybackSink;
pub use recording::RecordingPlaybackSink;
pub use tone::{tone_clip, TONE_SAMPLE_RATE_HZ};

/// Interleaved 16-bit PCM.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioClip {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

impl AudioClip {
    pub fn is_blank(&self) -> bool {
        self.sample_rate_hz == 0
            || self.channels == 0
            || self.pcm_i16.is_empty()
            || self.pcm_i16.len() % usize::from(self.channels) != 0
    }

    pub fn duration(&self) -> Duration {
        if self.is_blank() {
            return Duration::ZERO;
        }
        let frames = (self.pcm_i16.len() / usize::from(self.channels)) as f64;
        Duration::from_secs_f64(frames / f64::from(self.sample_rate_hz))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },
    #[error("no audio output device")]
    NoOutputDevice,
}

/// Starts playing a clip. Implementations queue the clip and return without
/// waiting for it to finish; the caller paces itself with its own clock.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, clip: AudioClip) -> BoxFuture<'_, Result<(), PlaybackError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_duration_counts_frames() {
        let clip = AudioClip {
            sample_rate_hz: 8_000,
            channels: 2,
            pcm_i16: vec![0; 8_000],
        };
        assert_eq!(clip.duration(), Duration::from_millis(500));
    }

    #[test]
    fn ragged_clip_is_blank() {
        let clip = AudioClip {
            sample_rate_hz: 8_000,
            channels: 2,
            pcm_i16: vec![0; 3],
        };
        assert!(clip.is_blank());
        assert_eq!(clip.duration(), Duration::ZERO);
    }
}
