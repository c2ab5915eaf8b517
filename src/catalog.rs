//! The authoritative device catalog and its refresh logic.

use std::sync::Arc;

use crate::device::{DeviceDescriptor, DeviceId, DeviceKind};
use crate::error::MediaSelectError;
use crate::platform::MediaPlatform;

/// Capture-permission state for the session.
///
/// Monotonic in practice from `Prompt`; `Denied` and `NotSupported` are
/// terminal for the session (no automatic retry); `Granted` allows
/// catalog refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    /// Permission has not been requested yet.
    #[default]
    Prompt,
    /// Permission was granted; enumeration returns full labels.
    Granted,
    /// Permission was denied. Terminal for the session.
    Denied,
    /// The environment has no device support. Terminal.
    NotSupported,
}

/// Owns the deduplication and mapping rules for device enumeration.
///
/// The catalog never caches a device list across refreshes - each
/// [`refresh`](DeviceCatalog::refresh) returns a structurally new
/// immutable collection, and the partitioned view is derived from it by
/// the coordinator.
pub struct DeviceCatalog {
    platform: Arc<dyn MediaPlatform>,
    include_video: bool,
    permission: PermissionStatus,
}

impl DeviceCatalog {
    /// Creates a catalog over a platform.
    ///
    /// `include_video` is fixed for the whole session: when disabled, no
    /// video-input entry ever appears and the permission probe skips the
    /// camera.
    pub fn new(platform: Arc<dyn MediaPlatform>, include_video: bool) -> Self {
        Self {
            platform,
            include_video,
            permission: PermissionStatus::Prompt,
        }
    }

    /// Current permission state.
    #[must_use]
    pub fn permission(&self) -> PermissionStatus {
        self.permission
    }

    /// Refreshes the catalog from the platform.
    ///
    /// If permission has not been granted yet, an ephemeral capture
    /// request runs first (audio; plus video only when camera inclusion
    /// is enabled); its tracks are stopped immediately and never exposed.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` if the permission probe was refused (the
    /// catalog records `Denied`); `EnumerationFailed` for any other
    /// failure.
    pub async fn refresh(&mut self) -> Result<Arc<[DeviceDescriptor]>, MediaSelectError> {
        if self.permission != PermissionStatus::Granted {
            match self.platform.request_permission(self.include_video).await {
                Ok(ephemeral) => {
                    // The grant probe's tracks must never outlive the check.
                    for track in &ephemeral {
                        track.stop();
                    }
                    self.permission = PermissionStatus::Granted;
                }
                Err(MediaSelectError::PermissionDenied) => {
                    self.permission = PermissionStatus::Denied;
                    return Err(MediaSelectError::PermissionDenied);
                }
                Err(other) => {
                    return Err(MediaSelectError::enumeration(other));
                }
            }
        }

        let raw = self
            .platform
            .enumerate_devices()
            .await
            .map_err(|e| match e {
                MediaSelectError::EnumerationFailed { .. } => e,
                other => MediaSelectError::enumeration(other),
            })?;

        let mut catalog = Vec::with_capacity(raw.len());
        for device in raw {
            if device.id.is_empty() {
                // No stable identity - nothing to select against.
                continue;
            }
            let kind = map_kind(&device.kind);
            if kind == DeviceKind::VideoInput && !self.include_video {
                continue;
            }
            catalog.push(DeviceDescriptor {
                id: DeviceId::new(device.id),
                kind,
                label: device.label,
                group_id: device.group_id,
            });
        }

        tracing::debug!("catalog refreshed: {} devices", catalog.len());
        Ok(catalog.into())
    }
}

/// Maps a platform kind string to the three-way kind enum.
///
/// Unrecognized kinds map to audio input rather than being dropped - a
/// documented quirk carried over from the platform contract.
fn map_kind(raw: &str) -> DeviceKind {
    match raw {
        "audioinput" => DeviceKind::AudioInput,
        "videoinput" => DeviceKind::VideoInput,
        "audiooutput" => DeviceKind::AudioOutput,
        other => {
            tracing::debug!("unrecognized device kind {other:?}, treating as audio input");
            DeviceKind::AudioInput
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MediaTrack, MockPlatform, RawDevice};

    fn platform_with(devices: Vec<RawDevice>) -> Arc<MockPlatform> {
        Arc::new(MockPlatform::with_devices(devices))
    }

    #[test]
    fn test_map_kind() {
        assert_eq!(map_kind("audioinput"), DeviceKind::AudioInput);
        assert_eq!(map_kind("videoinput"), DeviceKind::VideoInput);
        assert_eq!(map_kind("audiooutput"), DeviceKind::AudioOutput);
        // Documented quirk: unknown kinds become audio input.
        assert_eq!(map_kind("depthsensor"), DeviceKind::AudioInput);
    }

    #[tokio::test]
    async fn test_refresh_requests_permission_once() {
        let platform = platform_with(vec![RawDevice::new("mic1", "audioinput", "Mic")]);
        let mut catalog = DeviceCatalog::new(platform.clone(), true);

        assert_eq!(catalog.permission(), PermissionStatus::Prompt);
        catalog.refresh().await.unwrap();
        assert_eq!(catalog.permission(), PermissionStatus::Granted);

        catalog.refresh().await.unwrap();
        // Second refresh reuses the grant.
        assert_eq!(platform.permission_request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_stops_ephemeral_tracks() {
        let platform = platform_with(Vec::new());
        let mut catalog = DeviceCatalog::new(platform.clone(), true);
        catalog.refresh().await.unwrap();

        let ephemeral = platform.ephemeral_tracks();
        assert_eq!(ephemeral.len(), 2); // audio + video probe
        assert!(ephemeral.iter().all(|t| t.is_stopped()));
    }

    #[tokio::test]
    async fn test_refresh_skips_video_probe_when_camera_disabled() {
        let platform = platform_with(Vec::new());
        let mut catalog = DeviceCatalog::new(platform.clone(), false);
        catalog.refresh().await.unwrap();

        assert_eq!(platform.ephemeral_tracks().len(), 1); // audio only
    }

    #[tokio::test]
    async fn test_refresh_denied_is_recorded() {
        let platform = platform_with(Vec::new());
        platform.deny_permission();
        let mut catalog = DeviceCatalog::new(platform, true);

        let result = catalog.refresh().await;
        assert!(matches!(result, Err(MediaSelectError::PermissionDenied)));
        assert_eq!(catalog.permission(), PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_refresh_filters_unstable_ids() {
        let platform = platform_with(vec![
            RawDevice::new("", "audioinput", "ghost"),
            RawDevice::new("mic1", "audioinput", "Mic"),
        ]);
        let mut catalog = DeviceCatalog::new(platform, true);

        let devices = catalog.refresh().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, DeviceId::new("mic1"));
    }

    #[tokio::test]
    async fn test_refresh_filters_video_when_camera_disabled() {
        let platform = platform_with(vec![
            RawDevice::new("mic1", "audioinput", "Mic"),
            RawDevice::new("cam1", "videoinput", "Cam"),
        ]);
        let mut catalog = DeviceCatalog::new(platform, false);

        let devices = catalog.refresh().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind, DeviceKind::AudioInput);
    }

    #[tokio::test]
    async fn test_refresh_returns_fresh_collections() {
        let platform = platform_with(vec![RawDevice::new("mic1", "audioinput", "Mic")]);
        let mut catalog = DeviceCatalog::new(platform, true);

        let first = catalog.refresh().await.unwrap();
        let second = catalog.refresh().await.unwrap();

        // Same contents, structurally distinct allocations.
        assert_eq!(*first, *second);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
