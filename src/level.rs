//! Microphone input level analysis.
//!
//! The monitor attaches to one live audio track and publishes a smoothed
//! 0..1 level at display rate. The response is VU-meter-like: a louder
//! reading is published immediately (fast attack) while a quieter one
//! decays by a fixed step per tick (slow release).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::platform::MediaTrack;

/// Analysis window length in samples.
const FFT_SIZE: usize = 1024;

/// Tick cadence, approximating one display refresh.
const TICK: Duration = Duration::from_millis(16);

/// Mean byte magnitudes below this floor map to level 0.
const NOISE_FLOOR: f32 = 50.0;

/// Top of the byte magnitude scale.
const BYTE_MAX: f32 = 255.0;

/// dB mapped to byte 0.
const MIN_DB: f32 = -100.0;

/// dB mapped to byte 255.
const MAX_DB: f32 = -30.0;

/// Decay applied per tick when the signal falls (slow release).
const DECAY_STEP: f32 = 0.05;

/// Converts a time-domain window into byte-scaled frequency magnitudes.
///
/// Bins are Hann-windowed FFT magnitudes mapped from the
/// [`MIN_DB`]..[`MAX_DB`] range onto 0..255, matching the byte-frequency
/// convention the level heuristics are calibrated against.
struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    bytes: Vec<f32>,
}

impl SpectrumAnalyzer {
    fn new() -> Self {
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let bytes = vec![0.0; spectrum.len()];

        let window = (0..FFT_SIZE)
            .map(|n| {
                let phase = (n as f32) / ((FFT_SIZE - 1) as f32);
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * phase).cos())
            })
            .collect();

        Self {
            fft,
            window,
            input,
            spectrum,
            bytes,
        }
    }

    /// Byte-scaled magnitudes for one full window of samples.
    fn byte_spectrum(&mut self, samples: &[f32]) -> &[f32] {
        debug_assert_eq!(samples.len(), FFT_SIZE);
        for (slot, (sample, coeff)) in self
            .input
            .iter_mut()
            .zip(samples.iter().zip(self.window.iter()))
        {
            *slot = sample * coeff;
        }

        if self.fft.process(&mut self.input, &mut self.spectrum).is_err() {
            // Sizes come from the plan itself, so this cannot happen;
            // degrade to silence rather than propagate.
            self.bytes.fill(0.0);
            return &self.bytes;
        }

        let scale = 2.0 / FFT_SIZE as f32;
        for (byte, bin) in self.bytes.iter_mut().zip(self.spectrum.iter()) {
            let magnitude = (bin.norm() * scale).max(1e-10);
            let db = 20.0 * magnitude.log10();
            *byte = ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0) * BYTE_MAX;
        }
        &self.bytes
    }
}

/// Mean byte magnitude with the noise floor applied, normalized to 0..1.
///
/// A mean below [`NOISE_FLOOR`] yields exactly 0 before gain scaling.
fn mean_level(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let mean = bins.iter().sum::<f32>() / bins.len() as f32;
    if mean < NOISE_FLOOR {
        0.0
    } else {
        (mean / BYTE_MAX).clamp(0.0, 1.0)
    }
}

/// Asymmetric smoothing: fast attack, fixed-step release floored at 0.
fn smooth(previous: f32, next: f32) -> f32 {
    if next > previous {
        next
    } else {
        (previous - DECAY_STEP).max(0.0)
    }
}

/// Display-rate level monitor for one audio track.
///
/// Created by the coordinator once per track identity; selecting an
/// unrelated device never restarts a running monitor. The tick loop ends
/// on [`stop`](LevelMonitor::stop), on drop, or as soon as the source
/// track reports stopped, and always publishes a final level of 0.
pub struct LevelMonitor {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LevelMonitor {
    /// Attaches to a track and starts the tick loop.
    ///
    /// `gain` is the system input gain sampled once when the microphone
    /// was chosen; the published level is scaled by it.
    pub fn attach(
        track: Arc<dyn MediaTrack>,
        gain: f32,
        level_tx: watch::Sender<f32>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let gain = gain.clamp(0.0, 1.0);

        let handle = tokio::spawn(async move {
            let mut analyzer = SpectrumAnalyzer::new();
            let mut window: Vec<f32> = Vec::with_capacity(FFT_SIZE * 2);
            let mut pending: Vec<f32> = Vec::new();
            let mut published = 0.0f32;

            let mut ticks = tokio::time::interval(TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                if !flag.load(Ordering::SeqCst) || track.is_stopped() {
                    break;
                }

                pending.clear();
                track.read_samples(&mut pending);
                window.extend_from_slice(&pending);
                if window.len() > FFT_SIZE {
                    let excess = window.len() - FFT_SIZE;
                    window.drain(..excess);
                }

                let scaled = if window.len() == FFT_SIZE {
                    mean_level(analyzer.byte_spectrum(&window)) * gain
                } else {
                    0.0
                };

                published = smooth(published, scaled);
                let _ = level_tx.send(published);
            }

            // The level has no identity of its own - reset on detach.
            let _ = level_tx.send(0.0);
            tracing::debug!("level monitor detached");
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stops the tick loop. Idempotent.
    ///
    /// The task notices the flag on its next tick, publishes a final
    /// level of 0 and exits; it is never aborted mid-publish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Detach - the task self-terminates within one tick.
        drop(self.handle.take());
    }
}

impl Drop for LevelMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceId, DeviceKind};
    use crate::platform::{MediaPlatform, MockPlatform, TrackConstraints};

    #[test]
    fn test_silence_yields_zero_bins() {
        let mut analyzer = SpectrumAnalyzer::new();
        let silence = vec![0.0f32; FFT_SIZE];
        let bins = analyzer.byte_spectrum(&silence);
        assert!(bins.iter().all(|&b| b == 0.0));
        assert_eq!(mean_level(bins), 0.0);
    }

    #[test]
    fn test_noise_yields_level_in_bounds() {
        let mut analyzer = SpectrumAnalyzer::new();

        // Deterministic full-scale noise energizes every bin.
        let mut seed: u32 = 12345;
        let noise: Vec<f32> = (0..FFT_SIZE)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                ((seed >> 16) as f32 / 32768.0) - 1.0
            })
            .collect();

        let level = mean_level(analyzer.byte_spectrum(&noise));
        assert!(level > 0.0, "broadband noise should clear the floor");
        assert!(level <= 1.0);
    }

    #[test]
    fn test_noise_floor_maps_to_exact_zero() {
        let quiet = vec![NOISE_FLOOR - 1.0; 16];
        assert_eq!(mean_level(&quiet), 0.0);

        let at_floor = vec![NOISE_FLOOR; 16];
        assert!(mean_level(&at_floor) > 0.0);
    }

    #[test]
    fn test_mean_level_clamps_to_one() {
        let loud = vec![BYTE_MAX; 16];
        assert_eq!(mean_level(&loud), 1.0);
    }

    #[test]
    fn test_smooth_fast_attack() {
        assert_eq!(smooth(0.1, 0.9), 0.9);
    }

    #[test]
    fn test_smooth_slow_release_floors_at_zero() {
        let mut level = 0.12;
        level = smooth(level, 0.0);
        assert!((level - 0.07).abs() < 1e-6);
        level = smooth(level, 0.0);
        assert!((level - 0.02).abs() < 1e-6);
        level = smooth(level, 0.0);
        assert_eq!(level, 0.0);
        // Stays at the floor.
        assert_eq!(smooth(level, 0.0), 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_monitor_publishes_and_resets() {
        let platform = MockPlatform::new();
        let constraints = TrackConstraints::audio(DeviceId::new("mic1"));
        let track = platform
            .open_track(DeviceKind::AudioInput, &constraints)
            .await
            .unwrap();

        let mock = platform.last_opened(DeviceKind::AudioInput).unwrap();
        mock.feed_noise(FFT_SIZE * 4, 0.9);

        let (level_tx, level_rx) = watch::channel(0.0f32);
        let mut monitor = LevelMonitor::attach(track.clone(), 1.0, level_tx);

        // A few ticks are enough to fill the window and publish.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let live = *level_rx.borrow();
        assert!(live > 0.0, "expected a non-zero level, got {live}");
        assert!(live <= 1.0);

        // Stopping the track ends the loop and resets the level.
        track.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*level_rx.borrow(), 0.0);
        monitor.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_monitor_gain_scales_level() {
        let platform = MockPlatform::new();
        let constraints = TrackConstraints::audio(DeviceId::new("mic1"));
        let track = platform
            .open_track(DeviceKind::AudioInput, &constraints)
            .await
            .unwrap();
        platform
            .last_opened(DeviceKind::AudioInput)
            .unwrap()
            .feed_noise(FFT_SIZE * 4, 0.9);

        let (level_tx, level_rx) = watch::channel(0.0f32);
        let _monitor = LevelMonitor::attach(track, 0.0, level_tx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        // Zero gain silences the published level entirely.
        assert_eq!(*level_rx.borrow(), 0.0);
    }
}
