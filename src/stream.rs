//! Ownership and lifecycle of the live capture streams.
//!
//! All track acquisition and teardown funnels through [`StreamSession`];
//! no other component starts or stops tracks directly. The session
//! guarantees at most one live capture per input kind, even transiently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::device::{DeviceId, DeviceKind};
use crate::error::MediaSelectError;
use crate::platform::{MediaPlatform, MediaTrack, TrackConstraints};

/// Read-only handle to the currently live capture tracks.
///
/// Cloning shares the underlying track handles; consumers (preview,
/// analyzer) must not stop tracks through it - teardown goes through the
/// coordinator.
#[derive(Clone, Default)]
pub struct ActiveStream {
    /// The live audio track, if any.
    pub audio: Option<Arc<dyn MediaTrack>>,
    /// The live video track, if any.
    pub video: Option<Arc<dyn MediaTrack>>,
}

impl ActiveStream {
    /// The live track for an input kind.
    #[must_use]
    pub fn track(&self, kind: DeviceKind) -> Option<&Arc<dyn MediaTrack>> {
        match kind {
            DeviceKind::AudioInput => self.audio.as_ref(),
            DeviceKind::VideoInput => self.video.as_ref(),
            DeviceKind::AudioOutput => None,
        }
    }

    /// Whether any track is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}

impl std::fmt::Debug for ActiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveStream")
            .field("audio", &self.audio.as_ref().map(|t| t.device_id().clone()))
            .field("video", &self.video.as_ref().map(|t| t.device_id().clone()))
            .finish()
    }
}

/// Exclusive owner of the live capture streams, one slot per input kind.
pub struct StreamSession {
    platform: Arc<dyn MediaPlatform>,
    disposed: Arc<AtomicBool>,
    audio: Option<Arc<dyn MediaTrack>>,
    video: Option<Arc<dyn MediaTrack>>,
}

impl StreamSession {
    /// Creates a session sharing the coordinator's disposal flag.
    pub fn new(platform: Arc<dyn MediaPlatform>, disposed: Arc<AtomicBool>) -> Self {
        Self {
            platform,
            disposed,
            audio: None,
            video: None,
        }
    }

    /// Acquires a capture track for an input kind, tearing down any
    /// previous track of the same kind first.
    ///
    /// If the session was disposed while the acquisition was in flight,
    /// the fresh track is stopped and discarded rather than stored.
    ///
    /// # Errors
    ///
    /// `DeviceAccessFailed` if the platform refused the device;
    /// `SelectionFailed` for output kinds (they never own tracks);
    /// `SessionClosed` when the result arrived after disposal.
    pub async fn acquire(
        &mut self,
        kind: DeviceKind,
        device: &DeviceId,
    ) -> Result<Arc<dyn MediaTrack>, MediaSelectError> {
        let constraints = match kind {
            DeviceKind::AudioInput => TrackConstraints::audio(device.clone()),
            DeviceKind::VideoInput => TrackConstraints::video(device.clone()),
            DeviceKind::AudioOutput => {
                return Err(MediaSelectError::selection(
                    "output devices do not own capture streams",
                ))
            }
        };

        // One live capture per kind, even transiently.
        self.release_kind(kind);

        let track = self
            .platform
            .open_track(kind, &constraints)
            .await
            .map_err(|e| match e {
                failed @ MediaSelectError::DeviceAccessFailed { .. } => failed,
                other => MediaSelectError::device_access(kind, other),
            })?;

        if self.disposed.load(Ordering::SeqCst) {
            track.stop();
            return Err(MediaSelectError::SessionClosed);
        }

        match kind {
            DeviceKind::AudioInput => self.audio = Some(track.clone()),
            DeviceKind::VideoInput => self.video = Some(track.clone()),
            DeviceKind::AudioOutput => unreachable!("rejected above"),
        }

        tracing::debug!("acquired {} stream for {device}", kind.noun());
        Ok(track)
    }

    /// Stops and clears the track of one kind. Idempotent; returns
    /// whether a live track was released.
    pub fn release_kind(&mut self, kind: DeviceKind) -> bool {
        let slot = match kind {
            DeviceKind::AudioInput => &mut self.audio,
            DeviceKind::VideoInput => &mut self.video,
            DeviceKind::AudioOutput => return false,
        };

        if let Some(track) = slot.take() {
            track.stop();
            tracing::debug!("released {} stream", kind.noun());
            true
        } else {
            false
        }
    }

    /// Stops every track and clears the handles. Idempotent.
    pub fn release(&mut self) {
        self.release_kind(DeviceKind::AudioInput);
        self.release_kind(DeviceKind::VideoInput);
    }

    /// The combined live stream handle.
    #[must_use]
    pub fn active(&self) -> ActiveStream {
        ActiveStream {
            audio: self.audio.clone(),
            video: self.video.clone(),
        }
    }

    /// The live audio track, if any.
    #[must_use]
    pub fn audio_track(&self) -> Option<Arc<dyn MediaTrack>> {
        self.audio.clone()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;

    fn session() -> (Arc<MockPlatform>, StreamSession, Arc<AtomicBool>) {
        let platform = Arc::new(MockPlatform::new());
        let disposed = Arc::new(AtomicBool::new(false));
        let session = StreamSession::new(platform.clone(), disposed.clone());
        (platform, session, disposed)
    }

    #[tokio::test]
    async fn test_acquire_tears_down_same_kind_first() {
        let (platform, mut session, _) = session();

        let first = session
            .acquire(DeviceKind::AudioInput, &DeviceId::new("mic1"))
            .await
            .unwrap();
        let second = session
            .acquire(DeviceKind::AudioInput, &DeviceId::new("mic2"))
            .await
            .unwrap();

        assert!(first.is_stopped());
        assert!(!second.is_stopped());
        assert_eq!(platform.opened_tracks().len(), 2);
    }

    #[tokio::test]
    async fn test_acquire_leaves_other_kind_untouched() {
        let (_, mut session, _) = session();

        let audio = session
            .acquire(DeviceKind::AudioInput, &DeviceId::new("mic1"))
            .await
            .unwrap();
        session
            .acquire(DeviceKind::VideoInput, &DeviceId::new("cam1"))
            .await
            .unwrap();

        assert!(!audio.is_stopped());
        assert!(session.active().audio.is_some());
        assert!(session.active().video.is_some());
    }

    #[tokio::test]
    async fn test_acquire_output_kind_rejected() {
        let (_, mut session, _) = session();
        let result = session
            .acquire(DeviceKind::AudioOutput, &DeviceId::new("speaker1"))
            .await;
        assert!(matches!(result, Err(MediaSelectError::SelectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_acquire_after_dispose_discards_track() {
        let (platform, mut session, disposed) = session();
        disposed.store(true, Ordering::SeqCst);

        let result = session
            .acquire(DeviceKind::AudioInput, &DeviceId::new("mic1"))
            .await;
        assert!(matches!(result, Err(MediaSelectError::SessionClosed)));

        // The track was opened but immediately stopped, never stored.
        let opened = platform.opened_tracks();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].is_stopped());
        assert!(session.active().is_empty());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (_, mut session, _) = session();
        let track = session
            .acquire(DeviceKind::AudioInput, &DeviceId::new("mic1"))
            .await
            .unwrap();

        assert!(session.release_kind(DeviceKind::AudioInput));
        assert!(!session.release_kind(DeviceKind::AudioInput));
        session.release();
        assert!(track.is_stopped());
        assert!(session.active().is_empty());
    }

    #[tokio::test]
    async fn test_failed_acquire_keeps_nothing() {
        let (platform, mut session, _) = session();
        platform.fail_open("mic1");

        let result = session
            .acquire(DeviceKind::AudioInput, &DeviceId::new("mic1"))
            .await;
        assert!(matches!(
            result,
            Err(MediaSelectError::DeviceAccessFailed { .. })
        ));
        assert!(session.active().is_empty());
    }
}
