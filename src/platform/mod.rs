//! Platform seam: the capabilities the host must provide.
//!
//! The coordinator never talks to device APIs directly - everything goes
//! through [`MediaPlatform`]. The crate ships two implementations:
//!
//! - [`HostPlatform`]: CPAL-backed desktop audio devices
//! - [`MockPlatform`]: fully scriptable, for tests without hardware
//!
//! You can implement the traits yourself to bridge another device stack.

mod host;
mod mock;

pub use host::HostPlatform;
pub use mock::{MockOutput, MockPlatform, MockTrack};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::device::{DeviceId, DeviceKind};
use crate::error::MediaSelectError;
use crate::probe::Capabilities;

/// Ideal capture width requested for video tracks (4:3 hint).
pub const VIDEO_IDEAL_WIDTH: u32 = 640;
/// Ideal capture height requested for video tracks (4:3 hint).
pub const VIDEO_IDEAL_HEIGHT: u32 = 480;

/// A device record as the platform reports it, before catalog mapping.
///
/// The `kind` field is the platform's own kind string (`"audioinput"`,
/// `"videoinput"`, `"audiooutput"`); the catalog maps it to
/// [`DeviceKind`] and defaults unrecognized strings to audio input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    /// Stable identifier. Entries with an empty id are filtered out.
    pub id: String,
    /// Platform kind string.
    pub kind: String,
    /// Human-readable label; empty until permission is granted.
    pub label: String,
    /// Physical grouping hint.
    pub group_id: String,
}

impl RawDevice {
    /// Creates a raw record with an empty group id.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            group_id: String::new(),
        }
    }
}

/// Constraints for opening a capture track, keyed on an exact device id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackConstraints {
    /// Exact device to bind.
    pub device_id: DeviceId,
    /// Echo-cancellation hint for audio tracks.
    pub echo_cancellation: bool,
    /// Ideal capture width for video tracks.
    pub ideal_width: Option<u32>,
    /// Ideal capture height for video tracks.
    pub ideal_height: Option<u32>,
}

impl TrackConstraints {
    /// Constraints for an audio capture track.
    #[must_use]
    pub fn audio(device_id: DeviceId) -> Self {
        Self {
            device_id,
            echo_cancellation: true,
            ideal_width: None,
            ideal_height: None,
        }
    }

    /// Constraints for a video capture track (fixed ideal 4:3 resolution).
    #[must_use]
    pub fn video(device_id: DeviceId) -> Self {
        Self {
            device_id,
            echo_cancellation: false,
            ideal_width: Some(VIDEO_IDEAL_WIDTH),
            ideal_height: Some(VIDEO_IDEAL_HEIGHT),
        }
    }
}

/// A live capture track handle.
///
/// Tracks are shared (`Arc`) between the stream session, the view-model
/// and the level monitor; `stop()` must be idempotent and safe from any
/// holder.
pub trait MediaTrack: Send + Sync {
    /// The input kind this track captures.
    fn kind(&self) -> DeviceKind;

    /// The device this track is bound to.
    fn device_id(&self) -> &DeviceId;

    /// Stops the track and releases the platform resource. Idempotent.
    fn stop(&self);

    /// Whether the track has been stopped.
    fn is_stopped(&self) -> bool;

    /// Drains pending audio samples into `buf`, returning how many were
    /// appended. Video tracks and stopped tracks return 0.
    fn read_samples(&self, buf: &mut Vec<f32>) -> usize {
        let _ = buf;
        0
    }
}

/// The host's media device surface.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability if needed
/// - `capabilities()` must be pure and side-effect free (the probe calls
///   it repeatedly)
/// - `request_permission` may prompt the user; the tracks it returns are
///   ephemeral and are stopped by the caller immediately
/// - `watch_devices` returns a `watch` receiver whose value changes on
///   every hot-plug; `watch` conflation is what coalesces bursts
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Reports what this platform can do.
    fn capabilities(&self) -> Capabilities;

    /// Requests capture permission by opening an ephemeral stream
    /// (audio, plus video when `include_video` is set).
    ///
    /// # Errors
    ///
    /// `PermissionDenied` if the user or OS refused.
    async fn request_permission(
        &self,
        include_video: bool,
    ) -> Result<Vec<Arc<dyn MediaTrack>>, MediaSelectError>;

    /// Enumerates all devices the platform knows about.
    ///
    /// Labels may be empty if permission has not been granted yet.
    async fn enumerate_devices(&self) -> Result<Vec<RawDevice>, MediaSelectError>;

    /// Opens a live capture track for an input kind.
    async fn open_track(
        &self,
        kind: DeviceKind,
        constraints: &TrackConstraints,
    ) -> Result<Arc<dyn MediaTrack>, MediaSelectError>;

    /// Hot-plug notification channel. The value is a change counter;
    /// platforms without change notification return a receiver that
    /// never changes.
    fn watch_devices(&self) -> watch::Receiver<u64>;

    /// Approximation of the platform input gain (0..1) for a device,
    /// sampled once when a microphone is chosen.
    fn input_gain(&self, device: &DeviceId) -> f32 {
        let _ = device;
        1.0
    }
}

/// A playback element whose audio output can be re-routed.
///
/// Supplied by the embedder; selecting a speaker routes playback through
/// this seam instead of creating a capture stream.
pub trait OutputTarget: Send + Sync {
    /// Routes the element's audio output to the given output device.
    ///
    /// # Errors
    ///
    /// Returns an error if the element rejects the device.
    fn route_to(&self, device: &DeviceId) -> Result<(), MediaSelectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_constraints() {
        let c = TrackConstraints::audio(DeviceId::new("mic1"));
        assert!(c.echo_cancellation);
        assert_eq!(c.ideal_width, None);
        assert_eq!(c.device_id.as_str(), "mic1");
    }

    #[test]
    fn test_video_constraints_use_4_3_hint() {
        let c = TrackConstraints::video(DeviceId::new("cam1"));
        assert_eq!(c.ideal_width, Some(640));
        assert_eq!(c.ideal_height, Some(480));
        // 4:3 aspect
        assert_eq!(c.ideal_width.unwrap() * 3, c.ideal_height.unwrap() * 4);
    }

    #[test]
    fn test_platform_is_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn MediaPlatform>();
        assert_send_sync::<dyn MediaTrack>();
        assert_send_sync::<dyn OutputTarget>();
    }
}
