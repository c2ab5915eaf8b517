//! The selection coordinator: one state machine over catalog, streams
//! and level analysis.
//!
//! The coordinator runs as a single actor task (a `tokio::select!` loop
//! over the command mailbox and the hot-plug watch), so every transition
//! is centrally authored and no two device operations overlap. All
//! suspension points - permission probe, enumeration, acquisition - are
//! awaited inline, which is also what coalesces hot-plug bursts: watch
//! notifications conflate while a refresh is in flight, leaving at most
//! one trailing re-run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::catalog::{DeviceCatalog, PermissionStatus};
use crate::device::{DeviceId, DeviceKind, DeviceLists};
use crate::error::MediaSelectError;
use crate::event::{EventCallback, SessionEvent};
use crate::level::LevelMonitor;
use crate::platform::{MediaPlatform, MediaTrack, OutputTarget};
use crate::selection::SelectionState;
use crate::stream::{ActiveStream, StreamSession};

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Created, environment not probed yet.
    #[default]
    Idle,
    /// The environment lacks device support. Terminal.
    Unsupported,
    /// A device enumeration is in flight.
    Enumerating,
    /// Device lists and selection are consistent; commands apply.
    Ready,
    /// A capture acquisition is in flight.
    Acquiring,
    /// Capture permission was denied. Terminal.
    Denied,
}

/// The coordinator's published snapshot, safe to poll on every render.
///
/// Immutable by construction: a fresh value is published through the
/// watch channel after every transition; nothing in it is shared mutable
/// state.
#[derive(Debug, Clone)]
pub struct ViewModel {
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Partitioned device catalog view.
    pub device_lists: DeviceLists,
    /// Current selection, one slot per kind.
    pub selected: SelectionState,
    /// Live capture tracks, if any.
    pub active: ActiveStream,
    /// Capture permission state.
    pub permission: PermissionStatus,
    /// True until the first successful enumeration completes. Hot-plug
    /// re-enumerations never flip this back.
    pub is_loading: bool,
    /// The most recent error; cleared by the next successful operation
    /// of the same kind.
    pub error: Option<MediaSelectError>,
    /// Whether the environment probe found device support.
    pub media_devices_supported: bool,
}

impl ViewModel {
    pub(crate) fn initial() -> Self {
        Self {
            phase: SessionPhase::Idle,
            device_lists: DeviceLists::empty(),
            selected: SelectionState::default(),
            active: ActiveStream::default(),
            permission: PermissionStatus::Prompt,
            is_loading: true,
            error: None,
            media_devices_supported: true,
        }
    }
}

/// Commands sent from the session handle to the coordinator task.
pub(crate) enum Command {
    /// Apply a selection intent for a kind (None = deselect).
    Select {
        kind: DeviceKind,
        device: Option<DeviceId>,
        done: oneshot::Sender<()>,
    },
    /// Confirm the current selection (emits an event for the embedder).
    Confirm { done: oneshot::Sender<()> },
    /// Close the dialog: tear down streams/monitor, keep the session.
    RequestClose { done: oneshot::Sender<()> },
    /// Dispose the session.
    Close,
}

pub(crate) struct Coordinator {
    platform: Arc<dyn MediaPlatform>,
    catalog: DeviceCatalog,
    streams: StreamSession,
    output: Option<Arc<dyn OutputTarget>>,
    event_callback: Option<EventCallback>,
    include_video: bool,
    disposed: Arc<AtomicBool>,
    vm_tx: watch::Sender<ViewModel>,
    level_tx: watch::Sender<f32>,
    vm: ViewModel,
    monitor: Option<LevelMonitor>,
    monitor_track: Option<Arc<dyn MediaTrack>>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        platform: Arc<dyn MediaPlatform>,
        include_video: bool,
        output: Option<Arc<dyn OutputTarget>>,
        event_callback: Option<EventCallback>,
        disposed: Arc<AtomicBool>,
        vm_tx: watch::Sender<ViewModel>,
        level_tx: watch::Sender<f32>,
    ) -> Self {
        Self {
            catalog: DeviceCatalog::new(platform.clone(), include_video),
            streams: StreamSession::new(platform.clone(), disposed.clone()),
            platform,
            output,
            event_callback,
            include_video,
            disposed,
            vm_tx,
            level_tx,
            vm: ViewModel::initial(),
            monitor: None,
            monitor_track: None,
        }
    }

    /// The actor body. `ready` fires once the initial transition
    /// (probe + first refresh attempt) has been applied.
    pub(crate) async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, ready: oneshot::Sender<()>) {
        let report = crate::probe::probe(self.platform.as_ref());
        self.vm.media_devices_supported = report.is_supported();

        if let Some(error) = report.error {
            // Terminal: publish the verdict and stop. Later commands see
            // a closed mailbox and fail with SessionClosed.
            self.vm.phase = SessionPhase::Unsupported;
            self.vm.permission = PermissionStatus::NotSupported;
            self.vm.is_loading = false;
            self.fail(error);
            self.publish();
            let _ = ready.send(());
            self.dispose();
            return;
        }

        let mut hotplug_rx = self.platform.watch_devices();
        let mut hotplug_open = true;

        self.vm.phase = SessionPhase::Enumerating;
        self.publish();
        self.refresh_catalog(true).await;
        let _ = ready.send(());

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Select { kind, device, done }) => {
                        self.handle_select(kind, device).await;
                        let _ = done.send(());
                    }
                    Some(Command::Confirm { done }) => {
                        self.emit(SessionEvent::SelectionConfirmed {
                            selection: self.vm.selected.clone(),
                        });
                        let _ = done.send(());
                    }
                    Some(Command::RequestClose { done }) => {
                        self.handle_request_close();
                        let _ = done.send(());
                    }
                    Some(Command::Close) | None => break,
                },
                changed = hotplug_rx.changed(), if hotplug_open => {
                    if changed.is_ok() {
                        self.emit(SessionEvent::DeviceChange);
                        // A denial is terminal: refreshing here would
                        // re-run the permission prompt on every device
                        // change.
                        if self.vm.phase != SessionPhase::Denied {
                            self.refresh_catalog(false).await;
                        }
                    } else {
                        hotplug_open = false;
                    }
                }
            }
        }

        self.dispose();
    }

    /// Runs one catalog refresh and folds the result into the state.
    ///
    /// `initial` marks the first enumeration: only it gates `is_loading`
    /// and the eager default-microphone acquisition.
    async fn refresh_catalog(&mut self, initial: bool) {
        match self.catalog.refresh().await {
            Ok(devices) => {
                if self.is_disposed() {
                    // Late result after disposal - discard, never apply.
                    return;
                }

                self.vm.device_lists = DeviceLists::partition(&devices);
                self.vm.permission = self.catalog.permission();
                let had_microphone = self.vm.selected.microphone_id.is_some();
                self.vm.selected.seed_defaults(&self.vm.device_lists);
                if initial {
                    self.vm.is_loading = false;
                }
                self.vm.phase = SessionPhase::Ready;
                if matches!(self.vm.error, Some(MediaSelectError::EnumerationFailed { .. })) {
                    self.vm.error = None;
                }

                self.emit(SessionEvent::DevicesRefreshed {
                    count: devices.len(),
                });
                // Stale selections stay selected; only surface them.
                for (kind, device_id) in self.vm.selected.missing_from(&self.vm.device_lists) {
                    self.emit(SessionEvent::SelectedDeviceMissing { kind, device_id });
                }
                self.publish();

                // Eager acquisition whenever this refresh seeded the
                // default microphone - the first enumeration, or a later
                // hot-plug that introduced the first one.
                if !had_microphone {
                    if let Some(mic) = self.vm.selected.microphone_id.clone() {
                        self.acquire_input(DeviceKind::AudioInput, mic).await;
                    }
                }
            }
            Err(MediaSelectError::PermissionDenied) => {
                self.vm.phase = SessionPhase::Denied;
                self.vm.permission = PermissionStatus::Denied;
                self.vm.is_loading = false;
                self.fail(MediaSelectError::PermissionDenied);
                self.publish();
            }
            Err(error) => {
                // First load keeps is_loading; known-good lists survive.
                self.fail(error);
                self.publish();
            }
        }
    }

    async fn handle_select(&mut self, kind: DeviceKind, device: Option<DeviceId>) {
        if kind == DeviceKind::VideoInput && !self.include_video {
            self.fail(MediaSelectError::selection(
                "camera selection is disabled for this session",
            ));
            self.publish();
            return;
        }

        // Selection is optimistic and synchronous, decoupled from
        // whatever acquisition does afterwards.
        self.vm.selected.set(kind, device.clone());
        self.publish();

        match kind {
            DeviceKind::AudioOutput => {
                if let Some(id) = device {
                    self.route_output(&id);
                }
            }
            DeviceKind::AudioInput | DeviceKind::VideoInput => match device {
                Some(id) => {
                    // Terminal permission states never acquire.
                    if self.vm.permission == PermissionStatus::Granted {
                        self.acquire_input(kind, id).await;
                    }
                }
                None => {
                    if kind == DeviceKind::AudioInput {
                        self.detach_monitor();
                    }
                    if self.streams.release_kind(kind) {
                        self.emit(SessionEvent::StreamReleased { kind });
                    }
                    self.vm.active = self.streams.active();
                    self.publish();
                }
            },
        }
    }

    async fn acquire_input(&mut self, kind: DeviceKind, device: DeviceId) {
        self.vm.phase = SessionPhase::Acquiring;
        self.publish();

        match self.streams.acquire(kind, &device).await {
            Ok(track) => {
                self.vm.active = self.streams.active();
                if matches!(
                    &self.vm.error,
                    Some(MediaSelectError::DeviceAccessFailed { kind: k, .. }) if *k == kind
                ) {
                    self.vm.error = None;
                }
                self.emit(SessionEvent::StreamAcquired {
                    kind,
                    device_id: device.clone(),
                });
                if kind == DeviceKind::AudioInput {
                    self.attach_monitor(track, &device);
                }
            }
            Err(MediaSelectError::SessionClosed) => {
                // Disposed mid-flight; the track was already discarded.
            }
            Err(error) => {
                // Selection stays as chosen; other kinds are untouched.
                self.vm.active = self.streams.active();
                self.fail(error);
            }
        }

        if self.vm.phase == SessionPhase::Acquiring {
            self.vm.phase = SessionPhase::Ready;
        }
        self.publish();
    }

    fn route_output(&mut self, device: &DeviceId) {
        let Some(output) = self.output.clone() else {
            // No playback element attached; the selection alone is the outcome.
            return;
        };
        match output.route_to(device) {
            Ok(()) => {
                if matches!(self.vm.error, Some(MediaSelectError::SelectionFailed { .. })) {
                    self.vm.error = None;
                }
                self.emit(SessionEvent::OutputRouted {
                    device_id: device.clone(),
                });
            }
            Err(error) => self.fail(error),
        }
        self.publish();
    }

    /// Monitor attachment is keyed on track identity, so unrelated
    /// updates (camera selection etc.) never restart the analysis.
    fn attach_monitor(&mut self, track: Arc<dyn MediaTrack>, device: &DeviceId) {
        if let Some(current) = &self.monitor_track {
            if Arc::ptr_eq(current, &track) {
                return;
            }
        }
        self.detach_monitor();

        // System gain is sampled once per microphone choice.
        let gain = self.platform.input_gain(device);
        self.monitor = Some(LevelMonitor::attach(track.clone(), gain, self.level_tx.clone()));
        self.monitor_track = Some(track);
    }

    fn detach_monitor(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.monitor_track = None;
    }

    fn handle_request_close(&mut self) {
        self.emit(SessionEvent::CloseRequested);
        self.detach_monitor();
        self.streams.release();
        self.vm.active = self.streams.active();
        self.publish();
    }

    fn dispose(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.detach_monitor();
        self.streams.release();
        self.vm.active = self.streams.active();
        self.publish();
        tracing::debug!("device session disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn publish(&self) {
        let _ = self.vm_tx.send(self.vm.clone());
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event);
        }
    }

    fn fail(&mut self, error: MediaSelectError) {
        tracing::warn!("session error: {error}");
        self.emit(SessionEvent::SessionError {
            error: error.clone(),
        });
        self.vm.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_view_model() {
        let vm = ViewModel::initial();
        assert_eq!(vm.phase, SessionPhase::Idle);
        assert!(vm.is_loading);
        assert!(vm.error.is_none());
        assert!(vm.device_lists.is_empty());
        assert_eq!(vm.permission, PermissionStatus::Prompt);
    }

    #[test]
    fn test_phase_default() {
        assert_eq!(SessionPhase::default(), SessionPhase::Idle);
    }
}
