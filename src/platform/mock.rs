//! Scriptable mock platform for testing without hardware.
//!
//! The mock models the whole platform seam: device catalogs, permission
//! denial, per-device open failures, enumeration latency, hot-plug
//! notifications and synthetic audio sample feeds. Everything the
//! integration tests exercise runs against this.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::device::{DeviceId, DeviceKind};
use crate::error::MediaSelectError;
use crate::platform::{MediaPlatform, MediaTrack, OutputTarget, RawDevice, TrackConstraints};
use crate::probe::Capabilities;

/// A mock capture track with a synthetic sample feed.
pub struct MockTrack {
    kind: DeviceKind,
    device_id: DeviceId,
    stopped: AtomicBool,
    samples: Mutex<Vec<f32>>,
}

impl MockTrack {
    fn new(kind: DeviceKind, device_id: DeviceId) -> Arc<Self> {
        Arc::new(Self {
            kind,
            device_id,
            stopped: AtomicBool::new(false),
            samples: Mutex::new(Vec::new()),
        })
    }

    /// Appends raw samples for the level monitor to drain.
    pub fn feed_samples(&self, samples: &[f32]) {
        self.samples
            .lock()
            .expect("mock track lock poisoned")
            .extend_from_slice(samples);
    }

    /// Appends deterministic white noise at the given amplitude.
    ///
    /// Uses a fixed-seed LCG so tests are reproducible.
    pub fn feed_noise(&self, count: usize, amplitude: f32) {
        let mut seed: u32 = 12345;
        let mut noise = Vec::with_capacity(count);
        for _ in 0..count {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let unit = ((seed >> 16) as f32 / 32768.0) - 1.0;
            noise.push(unit * amplitude);
        }
        self.feed_samples(&noise);
    }
}

impl MediaTrack for MockTrack {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn read_samples(&self, buf: &mut Vec<f32>) -> usize {
        if self.is_stopped() {
            return 0;
        }
        let mut samples = self.samples.lock().expect("mock track lock poisoned");
        let drained = samples.len();
        buf.append(&mut samples);
        drained
    }
}

struct MockState {
    capabilities: Capabilities,
    devices: Vec<RawDevice>,
    deny_permission: bool,
    fail_enumeration: bool,
    fail_open: HashSet<String>,
    enumeration_delay: Option<Duration>,
    input_gain: f32,
    opened: Vec<Arc<MockTrack>>,
    ephemeral: Vec<Arc<MockTrack>>,
}

/// A scriptable [`MediaPlatform`] for tests.
///
/// # Example
///
/// ```
/// use media_select::platform::{MockPlatform, RawDevice};
///
/// let platform = MockPlatform::with_devices(vec![
///     RawDevice::new("mic1", "audioinput", "Mic 1"),
///     RawDevice::new("speaker1", "audiooutput", "Speaker 1"),
/// ]);
/// platform.notify_device_change(); // simulate hot-plug
/// ```
pub struct MockPlatform {
    state: Mutex<MockState>,
    hotplug_tx: watch::Sender<u64>,
    enumerations: AtomicU32,
    permission_requests: AtomicU32,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// A fully capable platform with an empty device catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::with_devices(Vec::new())
    }

    /// A fully capable platform pre-seeded with devices.
    #[must_use]
    pub fn with_devices(devices: Vec<RawDevice>) -> Self {
        let (hotplug_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(MockState {
                capabilities: Capabilities::full(),
                devices,
                deny_permission: false,
                fail_enumeration: false,
                fail_open: HashSet::new(),
                enumeration_delay: None,
                input_gain: 1.0,
                opened: Vec::new(),
                ephemeral: Vec::new(),
            }),
            hotplug_tx,
            enumerations: AtomicU32::new(0),
            permission_requests: AtomicU32::new(0),
        }
    }

    /// A platform reporting the given capability flags.
    #[must_use]
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        let platform = Self::new();
        platform.lock().capabilities = capabilities;
        platform
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock platform lock poisoned")
    }

    /// Replaces the device catalog (takes effect on the next refresh).
    pub fn set_devices(&self, devices: Vec<RawDevice>) {
        self.lock().devices = devices;
    }

    /// Fires a hot-plug notification.
    pub fn notify_device_change(&self) {
        self.hotplug_tx.send_modify(|n| *n += 1);
    }

    /// Makes permission requests fail with `PermissionDenied`.
    pub fn deny_permission(&self) {
        self.lock().deny_permission = true;
    }

    /// Makes device enumeration fail (takes effect on the next refresh).
    pub fn fail_enumeration(&self, fail: bool) {
        self.lock().fail_enumeration = fail;
    }

    /// Makes `open_track` fail for the given device id.
    pub fn fail_open(&self, id: impl Into<String>) {
        self.lock().fail_open.insert(id.into());
    }

    /// Delays every enumeration, for exercising coalescing.
    pub fn set_enumeration_delay(&self, delay: Duration) {
        self.lock().enumeration_delay = Some(delay);
    }

    /// Sets the reported platform input gain.
    pub fn set_input_gain(&self, gain: f32) {
        self.lock().input_gain = gain;
    }

    /// How many enumerations have run.
    #[must_use]
    pub fn enumeration_count(&self) -> u32 {
        self.enumerations.load(Ordering::SeqCst)
    }

    /// How many permission requests were made.
    #[must_use]
    pub fn permission_request_count(&self) -> u32 {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// Every non-ephemeral track ever opened, in open order.
    #[must_use]
    pub fn opened_tracks(&self) -> Vec<Arc<MockTrack>> {
        self.lock().opened.clone()
    }

    /// Every ephemeral permission-probe track ever created.
    #[must_use]
    pub fn ephemeral_tracks(&self) -> Vec<Arc<MockTrack>> {
        self.lock().ephemeral.clone()
    }

    /// The most recently opened track of a kind, if any.
    #[must_use]
    pub fn last_opened(&self, kind: DeviceKind) -> Option<Arc<MockTrack>> {
        self.lock()
            .opened
            .iter()
            .rev()
            .find(|t| t.kind() == kind)
            .cloned()
    }
}

#[async_trait]
impl MediaPlatform for MockPlatform {
    fn capabilities(&self) -> Capabilities {
        self.lock().capabilities
    }

    async fn request_permission(
        &self,
        include_video: bool,
    ) -> Result<Vec<Arc<dyn MediaTrack>>, MediaSelectError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);

        let denied = self.lock().deny_permission;
        if denied {
            return Err(MediaSelectError::PermissionDenied);
        }

        let mut tracks: Vec<Arc<dyn MediaTrack>> = Vec::new();
        let mut state = self.lock();
        let audio = MockTrack::new(DeviceKind::AudioInput, DeviceId::new("ephemeral-audio"));
        state.ephemeral.push(audio.clone());
        tracks.push(audio);
        if include_video {
            let video = MockTrack::new(DeviceKind::VideoInput, DeviceId::new("ephemeral-video"));
            state.ephemeral.push(video.clone());
            tracks.push(video);
        }
        Ok(tracks)
    }

    async fn enumerate_devices(&self) -> Result<Vec<RawDevice>, MediaSelectError> {
        let delay = self.lock().enumeration_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.enumerations.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.fail_enumeration {
            return Err(MediaSelectError::enumeration("device query failed"));
        }
        Ok(state.devices.clone())
    }

    async fn open_track(
        &self,
        kind: DeviceKind,
        constraints: &TrackConstraints,
    ) -> Result<Arc<dyn MediaTrack>, MediaSelectError> {
        let mut state = self.lock();
        if state.fail_open.contains(constraints.device_id.as_str()) {
            return Err(MediaSelectError::device_access(
                kind,
                "device refused to open",
            ));
        }

        let track = MockTrack::new(kind, constraints.device_id.clone());
        state.opened.push(track.clone());
        Ok(track)
    }

    fn watch_devices(&self) -> watch::Receiver<u64> {
        self.hotplug_tx.subscribe()
    }

    fn input_gain(&self, _device: &DeviceId) -> f32 {
        self.lock().input_gain
    }
}

/// An [`OutputTarget`] that records every routing request.
pub struct MockOutput {
    routes: Mutex<Vec<DeviceId>>,
    fail: AtomicBool,
}

impl Default for MockOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOutput {
    /// A target that accepts every route.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes subsequent routing requests fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every device this target was routed to, in order.
    #[must_use]
    pub fn routed(&self) -> Vec<DeviceId> {
        self.routes.lock().expect("mock output lock poisoned").clone()
    }

    /// The current route, if any.
    #[must_use]
    pub fn current_route(&self) -> Option<DeviceId> {
        self.routed().last().cloned()
    }
}

impl OutputTarget for MockOutput {
    fn route_to(&self, device: &DeviceId) -> Result<(), MediaSelectError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaSelectError::selection("output target rejected device"));
        }
        self.routes
            .lock()
            .expect("mock output lock poisoned")
            .push(device.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_enumeration_counts() {
        let platform = MockPlatform::with_devices(vec![RawDevice::new("mic1", "audioinput", "")]);

        let devices = platform.enumerate_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(platform.enumeration_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_enumeration_failure_is_switchable() {
        let platform = MockPlatform::with_devices(vec![RawDevice::new("mic1", "audioinput", "")]);
        platform.fail_enumeration(true);

        let result = platform.enumerate_devices().await;
        assert!(matches!(
            result,
            Err(MediaSelectError::EnumerationFailed { .. })
        ));

        platform.fail_enumeration(false);
        assert_eq!(platform.enumerate_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_permission_denial() {
        let platform = MockPlatform::new();
        platform.deny_permission();

        let result = platform.request_permission(false).await;
        assert!(matches!(result, Err(MediaSelectError::PermissionDenied)));
        assert_eq!(platform.permission_request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_permission_grants_ephemeral_tracks() {
        let platform = MockPlatform::new();

        let tracks = platform.request_permission(true).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(platform.ephemeral_tracks().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_open_failure() {
        let platform = MockPlatform::new();
        platform.fail_open("mic1");

        let constraints = TrackConstraints::audio(DeviceId::new("mic1"));
        let result = platform
            .open_track(DeviceKind::AudioInput, &constraints)
            .await;
        assert!(matches!(
            result,
            Err(MediaSelectError::DeviceAccessFailed { .. })
        ));
    }

    #[test]
    fn test_mock_track_feed_and_drain() {
        let track = MockTrack::new(DeviceKind::AudioInput, DeviceId::new("mic1"));
        track.feed_samples(&[0.1, 0.2, 0.3]);

        let mut buf = Vec::new();
        assert_eq!(track.read_samples(&mut buf), 3);
        assert_eq!(buf, vec![0.1, 0.2, 0.3]);
        // Drained - second read yields nothing.
        assert_eq!(track.read_samples(&mut buf), 0);
    }

    #[test]
    fn test_mock_track_stop_is_idempotent() {
        let track = MockTrack::new(DeviceKind::VideoInput, DeviceId::new("cam1"));
        assert!(!track.is_stopped());
        track.stop();
        track.stop();
        assert!(track.is_stopped());

        let mut buf = Vec::new();
        track.feed_samples(&[0.5]);
        assert_eq!(track.read_samples(&mut buf), 0);
    }

    #[test]
    fn test_mock_noise_is_deterministic_and_bounded() {
        let a = MockTrack::new(DeviceKind::AudioInput, DeviceId::new("m"));
        let b = MockTrack::new(DeviceKind::AudioInput, DeviceId::new("m"));
        a.feed_noise(512, 0.8);
        b.feed_noise(512, 0.8);

        let (mut buf_a, mut buf_b) = (Vec::new(), Vec::new());
        a.read_samples(&mut buf_a);
        b.read_samples(&mut buf_b);
        assert_eq!(buf_a, buf_b);
        assert!(buf_a.iter().all(|s| s.abs() <= 0.8));
    }

    #[test]
    fn test_mock_output_records_routes() {
        let output = MockOutput::new();
        output.route_to(&DeviceId::new("speaker1")).unwrap();
        output.route_to(&DeviceId::new("speaker2")).unwrap();

        assert_eq!(output.current_route(), Some(DeviceId::new("speaker2")));
        assert_eq!(output.routed().len(), 2);

        output.set_fail(true);
        assert!(output.route_to(&DeviceId::new("speaker3")).is_err());
    }
}
