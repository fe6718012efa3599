use crate::capture::{AudioCapture, CaptureError, DEFAULT_SAMPLE_RATE_HZ};
use crate::util::RingBuffer;
use rodio::cpal;
use rodio::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rodio::cpal::{SampleFormat, Stream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// Samples kept for analysis; matches the extractor's FFT window.
const WINDOW_SAMPLES: usize = 2048;

/// Microphone capture through cpal.
///
/// `cpal::Stream` is not `Send` on every platform, so the stream lives on a
/// dedicated thread that only exists between `start` and `stop`. The audio
/// callback downmixes to mono and appends into a shared rolling window which
/// `read_frame` copies out.
pub struct DeviceCapture {
    input_device_name: Option<String>,
    window: Arc<Mutex<RingBuffer<f32>>>,
    sample_rate: Arc<AtomicU32>,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl DeviceCapture {
    pub fn new() -> Self {
        Self {
            input_device_name: None,
            window: Arc::new(Mutex::new(RingBuffer::new(WINDOW_SAMPLES))),
            sample_rate: Arc::new(AtomicU32::new(DEFAULT_SAMPLE_RATE_HZ)),
            worker: None,
        }
    }

    pub fn with_input_device_name<S: Into<String>>(mut self, name: S) -> Self {
        self.input_device_name = Some(name.into());
        self
    }
}

impl Default for DeviceCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCapture for DeviceCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, CaptureError>>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let window = Arc::clone(&self.window);
        let wanted = self.input_device_name.clone();

        let handle = std::thread::Builder::new()
            .name("sound-safari-capture".to_owned())
            .spawn(move || match open_input_stream(wanted.as_deref(), window) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // Plain OS thread, so blocking here never stalls the runtime.
                    // Returns on `stop` or when the sender is dropped.
                    let _ = stop_rx.blocking_recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CaptureError::DeviceUnavailable {
                details: format!("failed to spawn capture thread: {e}"),
            })?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(CaptureError::DeviceUnavailable {
                details: "capture thread exited before opening the stream".to_owned(),
            })
        });

        match ready {
            Ok(sample_rate) => {
                self.sample_rate.store(sample_rate, Ordering::Relaxed);
                self.worker = Some(CaptureWorker { stop_tx, handle });
                tracing::info!(
                    sample_rate,
                    input_device = %self.input_device_name.as_deref().unwrap_or("<default>"),
                    "audio capture started"
                );
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                tracing::warn!("capture thread panicked during shutdown");
            }
            lock_window(&self.window).clear();
            tracing::info!("audio capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    fn read_frame(&self, out: &mut [f32]) -> usize {
        if self.worker.is_none() {
            return 0;
        }
        lock_window(&self.window).copy_into(out)
    }
}

impl Drop for DeviceCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_window(window: &Mutex<RingBuffer<f32>>) -> MutexGuard<'_, RingBuffer<f32>> {
    match window.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("capture window lock was poisoned; recovering and continuing");
            poisoned.into_inner()
        }
    }
}

fn open_input_stream(
    wanted: Option<&str>,
    window: Arc<Mutex<RingBuffer<f32>>>,
) -> Result<(Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = match wanted {
        Some(name) => find_input_device(&host, name)?,
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                details: "no default input device".to_owned(),
            })?,
    };

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable {
            details: format!("failed to query input config: {e}"),
        })?;
    let sample_format = supported.sample_format();
    let config = supported.config();
    let channels = usize::from(config.channels.max(1));
    let sample_rate = config.sample_rate.0;

    let on_error = |err: cpal::StreamError| {
        tracing::warn!(error = %err, "input stream error");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_downmixed(&window, data, channels, |s| s);
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_downmixed(&window, data, channels, |s| s as f32 / i16::MAX as f32);
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::UnsupportedFormat {
                format: format!("{other:?}"),
            })
        }
    }
    .map_err(|e| CaptureError::DeviceUnavailable {
        details: format!("failed to build input stream: {e}"),
    })?;

    stream.play().map_err(|e| CaptureError::DeviceUnavailable {
        details: format!("failed to start input stream: {e}"),
    })?;

    Ok((stream, sample_rate))
}

fn find_input_device(host: &cpal::Host, wanted: &str) -> Result<cpal::Device, CaptureError> {
    let wanted_norm = wanted.trim().to_ascii_lowercase();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceUnavailable {
            details: format!("failed to list input devices: {e}"),
        })?;

    let mut available = Vec::new();
    for d in devices {
        let name = d.name().unwrap_or_else(|_| "<unnamed>".to_owned());
        if name.trim().to_ascii_lowercase() == wanted_norm {
            return Ok(d);
        }
        available.push(name);
    }

    Err(CaptureError::DeviceUnavailable {
        details: format!(
            "input device {wanted:?} not found (available: {})",
            if available.is_empty() {
                "<none>".to_owned()
            } else {
                available.join(", ")
            }
        ),
    })
}

fn push_downmixed<T: Copy>(
    window: &Mutex<RingBuffer<f32>>,
    interleaved: &[T],
    channels: usize,
    to_f32: impl Fn(T) -> f32,
) {
    let mut guard = lock_window(window);
    for frame in interleaved.chunks(channels) {
        let sum: f32 = frame.iter().map(|s| to_f32(*s)).sum();
        guard.push((sum / frame.len() as f32).clamp(-1.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let window = Mutex::new(RingBuffer::new(4));
        push_downmixed(&window, &[0.5_f32, -0.5, 1.0, 0.0], 2, |s| s);

        let guard = lock_window(&window);
        assert_eq!(guard.iter().copied().collect::<Vec<_>>(), vec![0.0, 0.5]);
    }

    #[test]
    fn downmix_scales_i16() {
        let window = Mutex::new(RingBuffer::new(4));
        push_downmixed(&window, &[i16::MAX, 0], 1, |s| s as f32 / i16::MAX as f32);

        let guard = lock_window(&window);
        assert_eq!(guard.iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0]);
    }

    fn parked_worker() -> CaptureWorker {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = std::thread::spawn(move || {
            let _ = stop_rx.blocking_recv();
        });
        CaptureWorker { stop_tx, handle }
    }

    #[test]
    fn stop_releases_the_capture_thread() {
        let mut cap = DeviceCapture::new();
        cap.worker = Some(parked_worker());
        lock_window(&cap.window).push(0.5);
        assert!(cap.is_running());

        cap.stop();
        assert!(!cap.is_running());
        let mut out = [0.0_f32; 4];
        assert_eq!(cap.read_frame(&mut out), 0);
        assert!(lock_window(&cap.window).is_empty());
    }

    #[tokio::test]
    async fn stop_inside_the_runtime_does_not_deadlock() {
        let mut cap = DeviceCapture::new();
        cap.worker = Some(parked_worker());
        cap.stop();
        assert!(!cap.is_running());
    }

    #[test]
    fn read_frame_is_empty_before_start() {
        let cap = DeviceCapture::new();
        let mut out = [0.0_f32; 8];
        assert_eq!(cap.read_frame(&mut out), 0);
        assert!(!cap.is_running());
    }
}
