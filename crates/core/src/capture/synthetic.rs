use crate::capture::{AudioCapture, CaptureError, DEFAULT_SAMPLE_RATE_HZ};
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};

/// What a [`SyntheticCapture`] is currently "hearing".
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Signal {
    Silence,
    Sine { freq_hz: f32, amplitude: f32 },
}

/// Generates frames from a [`Signal`] instead of a microphone. Used for dry
/// runs and tests; the signal can be swapped at any time through a
/// [`SignalHandle`].
pub struct SyntheticCapture {
    signal: Arc<Mutex<Signal>>,
    sample_rate: u32,
    running: bool,
    unavailable: bool,
}

#[derive(Clone)]
pub struct SignalHandle {
    signal: Arc<Mutex<Signal>>,
}

impl SignalHandle {
    pub fn set(&self, signal: Signal) {
        match self.signal.lock() {
            Ok(mut g) => *g = signal,
            Err(poisoned) => *poisoned.into_inner() = signal,
        }
    }
}

impl SyntheticCapture {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal: Arc::new(Mutex::new(signal)),
            sample_rate: DEFAULT_SAMPLE_RATE_HZ,
            running: false,
            unavailable: false,
        }
    }

    pub fn silent() -> Self {
        Self::new(Signal::Silence)
    }

    /// A capture whose `start` always fails, as when microphone permission is denied.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::silent()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn handle(&self) -> SignalHandle {
        SignalHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    fn current(&self) -> Signal {
        match self.signal.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl AudioCapture for SyntheticCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.unavailable {
            return Err(CaptureError::DeviceUnavailable {
                details: "synthetic device configured as unavailable".to_owned(),
            });
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frame(&self, out: &mut [f32]) -> usize {
        if !self.running {
            return 0;
        }
        match self.current() {
            Signal::Silence => out.fill(0.0),
            Signal::Sine { freq_hz, amplitude } => {
                let step = TAU * freq_hz / self.sample_rate as f32;
                for (i, s) in out.iter_mut().enumerate() {
                    *s = amplitude * (step * i as f32).sin();
                }
            }
        }
        out.len()
    }
}
