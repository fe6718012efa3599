use crate::playback::{AudioClip, PlaybackError, PlaybackSink};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex};

/// Keeps every clip in memory instead of playing it. Clones share the log.
#[derive(Clone, Default)]
pub struct RecordingPlaybackSink {
    played: Arc<Mutex<Vec<AudioClip>>>,
}

impl RecordingPlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<AudioClip> {
        match self.played.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn play_count(&self) -> usize {
        self.played().len()
    }
}

impl PlaybackSink for RecordingPlaybackSink {
    fn play(&self, clip: AudioClip) -> BoxFuture<'_, Result<(), PlaybackError>> {
        async move {
            match self.played.lock() {
                Ok(mut g) => g.push(clip),
                Err(poisoned) => poisoned.into_inner().push(clip),
            }
            Ok(())
        }
        .boxed()
    }
}
