use crate::playback::{AudioClip, PlaybackError, PlaybackSink};
use futures::future::BoxFuture;
use futures::FutureExt;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::source::Source;
use rodio::{OutputStream, OutputStreamBuilder, Sink, StreamError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The speaker stream, opened on first use and kept for the whole session.
///
/// A dropped [`OutputStream`] silences every sink connected to it, so clips
/// share one stream instead of opening their own.
struct SharedOutput {
    stream: Mutex<Option<OutputStream>>,
}

impl SharedOutput {
    fn new() -> Self {
        Self {
            stream: Mutex::new(None),
        }
    }

    fn connect(
        &self,
        open: impl FnOnce() -> Result<OutputStream, PlaybackError>,
    ) -> Result<Sink, PlaybackError> {
        let mut guard = match self.stream.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("speaker stream lock was poisoned; recovering");
                poisoned.into_inner()
            }
        };

        let stream = match guard.take() {
            Some(s) => s,
            None => open()?,
        };
        let mixer = stream.mixer();
        let sink = Sink::connect_new(&mixer);
        *guard = Some(stream);
        Ok(sink)
    }
}

/// Speaker output through rodio. `play` queues the clip on a detached sink
/// and returns immediately.
#[derive(Clone)]
pub struct AudioPlaybackSink {
    output_device_name: Option<String>,
    volume: f32,
    output: Arc<SharedOutput>,
    /// Set once no output device exists; later clips are dropped quietly.
    disabled: Arc<AtomicBool>,
    failure_reported: Arc<AtomicBool>,
}

impl AudioPlaybackSink {
    pub fn new() -> Self {
        Self {
            output_device_name: None,
            volume: 1.0,
            output: Arc::new(SharedOutput::new()),
            disabled: Arc::new(AtomicBool::new(false)),
            failure_reported: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_output_device_name<S: Into<String>>(mut self, name: S) -> Self {
        self.output_device_name = Some(name.into());
        self
    }

    /// Linear gain applied to every clip, clamped to `0.0..=1.0`.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    fn open_stream(&self) -> Result<OutputStream, PlaybackError> {
        tracing::debug!(
            output_device = %self.output_device_name.as_deref().unwrap_or("<default>"),
            "opening speaker stream"
        );

        if let Some(wanted) = self.output_device_name.as_deref() {
            match open_named_stream(wanted) {
                Ok(stream) => return Ok(stream),
                Err(details) => tracing::warn!(
                    wanted_device = %wanted,
                    %details,
                    "configured speaker unusable; using the default output device"
                ),
            }
        }

        OutputStreamBuilder::open_default_stream().map_err(|e| match e {
            StreamError::NoDevice => PlaybackError::NoOutputDevice,
            other => PlaybackError::AudioOutputUnavailable {
                details: describe_stream_error(other, "open default output stream"),
            },
        })
    }

    fn report_failure(&self, err: &PlaybackError) {
        if !self.failure_reported.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %err, "speaker unavailable; session continues without sound");
        } else {
            tracing::debug!(error = %err, "speaker still unavailable");
        }

        if matches!(err, PlaybackError::NoOutputDevice) {
            self.disabled.store(true, Ordering::Relaxed);
        }
    }
}

impl Default for AudioPlaybackSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for AudioPlaybackSink {
    fn play(&self, clip: AudioClip) -> BoxFuture<'_, Result<(), PlaybackError>> {
        async move {
            if self.disabled.load(Ordering::Relaxed) {
                return Ok(());
            }
            if clip.is_blank() {
                tracing::debug!(
                    sample_rate_hz = clip.sample_rate_hz,
                    channels = clip.channels,
                    samples = clip.pcm_i16.len(),
                    "skipping blank clip"
                );
                return Ok(());
            }

            let sink = match self.output.connect(|| self.open_stream()) {
                Ok(s) => s,
                Err(e) => {
                    self.report_failure(&e);
                    return Err(e);
                }
            };

            tracing::debug!(duration_ms = clip.duration().as_millis() as u64, "queueing clip");
            sink.set_volume(self.volume);
            sink.append(ClipSource::new(clip));
            sink.detach();
            Ok(())
        }
        .boxed()
    }
}

fn open_named_stream(wanted: &str) -> Result<OutputStream, String> {
    let wanted = wanted.trim().to_ascii_lowercase();
    let device = rodio::cpal::default_host()
        .output_devices()
        .map_err(|e| format!("failed to list output devices: {e}"))?
        .find(|d| {
            d.name()
                .map(|n| n.trim().to_ascii_lowercase() == wanted)
                .unwrap_or(false)
        })
        .ok_or_else(|| "device not found".to_owned())?;

    OutputStreamBuilder::from_device(device)
        .and_then(|b| b.open_stream_or_fallback())
        .map_err(|e| describe_stream_error(e, "open configured output device"))
}

fn describe_stream_error(err: StreamError, context: &str) -> String {
    let details = format!("{context}: {err}");
    #[cfg(feature = "playback-device-enum")]
    let details = match output_device_names() {
        Ok(devices) if devices.is_empty() => format!("{details}; available_output_devices=<none>"),
        Ok(devices) => format!("{details}; available_output_devices={}", devices.join(", ")),
        Err(_) => details,
    };
    details
}

#[cfg(feature = "playback-device-enum")]
pub fn output_device_names() -> Result<Vec<String>, PlaybackError> {
    let devices = rodio::cpal::default_host().output_devices().map_err(|e| {
        PlaybackError::AudioOutputUnavailable {
            details: format!("failed to list output devices: {e}"),
        }
    })?;

    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "<unnamed>".to_owned()))
        .collect())
}

/// Plays an [`AudioClip`] as normalized `f32` samples.
struct ClipSource {
    samples: std::vec::IntoIter<i16>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
}

impl ClipSource {
    fn new(clip: AudioClip) -> Self {
        let duration = clip.duration();
        Self {
            samples: clip.pcm_i16.into_iter(),
            sample_rate: clip.sample_rate_hz,
            channels: clip.channels,
            duration,
        }
    }
}

impl Iterator for ClipSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.samples.next().map(|s| f32::from(s) / f32::from(i16::MAX))
    }
}

impl Source for ClipSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(pcm: Vec<i16>) -> AudioClip {
        AudioClip {
            sample_rate_hz: 8_000,
            channels: 1,
            pcm_i16: pcm,
        }
    }

    #[test]
    fn clip_source_scales_to_unit_range() {
        let mut src = ClipSource::new(clip(vec![i16::MAX, 0]));
        assert_eq!(src.channels(), 1);
        assert_eq!(src.sample_rate(), 8_000);
        assert_eq!(src.next(), Some(1.0));
        assert_eq!(src.next(), Some(0.0));
        assert_eq!(src.next(), None);
    }

    #[test]
    fn clip_source_reports_clip_length() {
        let src = ClipSource::new(clip(vec![0; 4_000]));
        assert_eq!(src.total_duration(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn volume_is_clamped() {
        assert_eq!(AudioPlaybackSink::new().with_volume(1.5).volume, 1.0);
        assert_eq!(AudioPlaybackSink::new().with_volume(-0.2).volume, 0.0);
    }

    #[test]
    fn disabled_sink_drops_clips_without_touching_devices() {
        let sink = AudioPlaybackSink::new();
        sink.disabled.store(true, Ordering::Relaxed);
        futures::executor::block_on(sink.play(clip(vec![1, 2, 3]))).expect("dropped quietly");
    }

    #[test]
    fn blank_clip_is_skipped() {
        let sink = AudioPlaybackSink::new();
        futures::executor::block_on(sink.play(clip(Vec::new()))).expect("skipped");
    }

    #[test]
    fn missing_device_disables_the_sink() {
        let sink = AudioPlaybackSink::new();
        sink.report_failure(&PlaybackError::NoOutputDevice);
        assert!(sink.disabled.load(Ordering::Relaxed));
        assert!(sink.failure_reported.load(Ordering::Relaxed));
    }

    #[test]
    fn other_failures_keep_the_sink_enabled() {
        let sink = AudioPlaybackSink::new();
        sink.report_failure(&PlaybackError::AudioOutputUnavailable {
            details: "open default output stream: NoDevice mentioned in text".to_owned(),
        });
        assert!(!sink.disabled.load(Ordering::Relaxed));
        assert!(sink.failure_reported.load(Ordering::Relaxed));
    }
}
