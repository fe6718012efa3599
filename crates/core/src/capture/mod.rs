#[cfg(feature = "audio-device")]
mod device;
mod synthetic;

#[cfg(feature = "audio-device")]
pub use device::DeviceCapture;
pub use synthetic::{Signal, SignalHandle, SyntheticCapture};

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("audio input unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("unsupported input sample format: {format}")]
    UnsupportedFormat { format: String },
}

/// A live microphone (or stand-in) that keeps a rolling window of recent
/// mono samples normalized to [-1, 1].
pub trait AudioCapture: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn sample_rate(&self) -> u32;

    /// Copies the newest samples into `out`, oldest first, and returns how many
    /// were written. Never blocks on the device.
    fn read_frame(&self, out: &mut [f32]) -> usize;
}

impl<T: AudioCapture + ?Sized> AudioCapture for Box<T> {
    fn start(&mut self) -> Result<(), CaptureError> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read_frame(&self, out: &mut [f32]) -> usize {
        (**self).read_frame(out)
    }
}
