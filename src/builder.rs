//! Session construction.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::coordinator::{Coordinator, ViewModel};
use crate::event::{EventCallback, SessionEvent};
use crate::platform::{HostPlatform, MediaPlatform, OutputTarget};
use crate::session::DeviceSession;

/// Command mailbox depth; commands are applied one at a time.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Entry point for creating device-selection sessions.
///
/// # Example
///
/// ```no_run
/// use media_select::MediaSelect;
///
/// # async fn run() {
/// let session = MediaSelect::builder().start().await;
/// let vm = session.view_model();
/// println!("{} microphones", vm.device_lists.microphones.len());
/// # }
/// ```
pub struct MediaSelect;

impl MediaSelect {
    /// Starts building a session.
    #[must_use]
    pub fn builder() -> MediaSelectBuilder {
        MediaSelectBuilder::new()
    }
}

/// Builder for a [`DeviceSession`].
#[must_use = "builders do nothing until start() is called"]
pub struct MediaSelectBuilder {
    platform: Option<Arc<dyn MediaPlatform>>,
    include_camera: bool,
    output: Option<Arc<dyn OutputTarget>>,
    event_callback: Option<EventCallback>,
}

impl Default for MediaSelectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSelectBuilder {
    /// Creates a builder with camera inclusion enabled and the host
    /// platform as the device backend.
    pub fn new() -> Self {
        Self {
            platform: None,
            include_camera: true,
            output: None,
            event_callback: None,
        }
    }

    /// Replaces the device backend (the default is [`HostPlatform`]).
    pub fn platform(mut self, platform: Arc<dyn MediaPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Enables or disables camera handling for the whole session.
    ///
    /// When disabled, no video device is ever enumerated, probed or
    /// acquired, and camera selection commands fail.
    pub fn include_camera(mut self, include: bool) -> Self {
        self.include_camera = include;
        self
    }

    /// Attaches the playback element whose output follows the speaker
    /// selection. Without one, speaker selection only updates state.
    pub fn output_target(mut self, target: Arc<dyn OutputTarget>) -> Self {
        self.output = Some(target);
        self
    }

    /// Registers a callback for runtime events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Arc::new(callback));
        self
    }

    /// Starts the session: spawns the coordinator task and waits for the
    /// initial transition (environment probe plus first refresh attempt),
    /// so the first [`view_model`](DeviceSession::view_model) call
    /// already reflects a settled state.
    ///
    /// Never fails: an unsupported environment or a denied permission is
    /// reported through the view-model, not as an error here.
    pub async fn start(self) -> DeviceSession {
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(HostPlatform::new()));

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (vm_tx, vm_rx) = watch::channel(ViewModel::initial());
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let disposed = Arc::new(AtomicBool::new(false));

        let coordinator = Coordinator::new(
            platform,
            self.include_camera,
            self.output,
            self.event_callback,
            disposed.clone(),
            vm_tx,
            level_tx,
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(coordinator.run(cmd_rx, ready_tx));
        let _ = ready_rx.await;

        tracing::debug!("device session started");
        DeviceSession::new(cmd_tx, vm_rx, level_rx, disposed, task)
    }
}
