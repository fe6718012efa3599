use crate::playback::AudioClip;
use std::f32::consts::TAU;
use std::time::Duration;

pub const TONE_SAMPLE_RATE_HZ: u32 = 22_050;

const START_GAIN: f32 = 0.3;
const END_GAIN: f32 = 0.01;

/// A mono sine beep whose gain decays exponentially from 0.3 to 0.01.
pub fn tone_clip(freq_hz: f32, duration: Duration) -> AudioClip {
    let n = (duration.as_secs_f32() * TONE_SAMPLE_RATE_HZ as f32).round() as usize;
    let step = TAU * freq_hz / TONE_SAMPLE_RATE_HZ as f32;
    let ratio = END_GAIN / START_GAIN;

    let pcm_i16 = (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            let gain = START_GAIN * ratio.powf(t);
            let s = gain * (step * i as f32).sin();
            (s * i16::MAX as f32) as i16
        })
        .collect();

    AudioClip {
        sample_rate_hz: TONE_SAMPLE_RATE_HZ,
        channels: 1,
        pcm_i16,
    }
}
