//! The public handle to a running device session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::coordinator::{Command, ViewModel};
use crate::device::{DeviceId, DeviceKind};
use crate::error::MediaSelectError;

/// A running device-selection session.
///
/// Created by [`MediaSelectBuilder::start()`]. The handle is the only way
/// to drive the session: commands are forwarded to the coordinator task
/// and applied in order, and each command future resolves after its
/// transition has been applied to the published view-model.
///
/// Dropping the handle disposes the session; [`close`](Self::close) does
/// the same but waits for the teardown to finish.
///
/// [`MediaSelectBuilder::start()`]: crate::MediaSelectBuilder::start
pub struct DeviceSession {
    cmd_tx: mpsc::Sender<Command>,
    vm_rx: watch::Receiver<ViewModel>,
    level_rx: watch::Receiver<f32>,
    disposed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl DeviceSession {
    pub(crate) fn new(
        cmd_tx: mpsc::Sender<Command>,
        vm_rx: watch::Receiver<ViewModel>,
        level_rx: watch::Receiver<f32>,
        disposed: Arc<AtomicBool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            cmd_tx,
            vm_rx,
            level_rx,
            disposed,
            task: Some(task),
        }
    }

    /// The latest published view-model snapshot.
    #[must_use]
    pub fn view_model(&self) -> ViewModel {
        self.vm_rx.borrow().clone()
    }

    /// Subscribes to view-model updates.
    ///
    /// Every state transition publishes a fresh snapshot; `watch`
    /// semantics mean a slow consumer only ever sees the newest one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.vm_rx.clone()
    }

    /// The current smoothed microphone level in `0..=1`.
    ///
    /// Published on a separate channel from the view-model so the
    /// display-rate stream never invalidates structural state.
    #[must_use]
    pub fn audio_level(&self) -> f32 {
        *self.level_rx.borrow()
    }

    /// Subscribes to the microphone level stream.
    #[must_use]
    pub fn level_watch(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    /// Whether the session has been disposed or its task has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst) || self.cmd_tx.is_closed()
    }

    /// Selects a device for a kind, or deselects with `None`.
    ///
    /// The selection itself applies unconditionally; any stream
    /// acquisition, teardown or output routing it implies happens before
    /// the returned future resolves. Failures of those side effects are
    /// surfaced in the view-model, not here.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session was disposed.
    pub async fn select_device(
        &self,
        kind: DeviceKind,
        device: Option<DeviceId>,
    ) -> Result<(), MediaSelectError> {
        self.command(|done| Command::Select { kind, device, done })
            .await
    }

    /// Confirms the current selection, emitting
    /// [`SelectionConfirmed`](crate::SessionEvent::SelectionConfirmed).
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session was disposed.
    pub async fn confirm_selection(&self) -> Result<(), MediaSelectError> {
        self.command(|done| Command::Confirm { done }).await
    }

    /// Closes the selection dialog: releases live streams and the level
    /// monitor but keeps the session alive for reuse.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session was disposed.
    pub async fn request_close(&self) -> Result<(), MediaSelectError> {
        self.command(|done| Command::RequestClose { done }).await
    }

    /// Disposes the session and waits for the coordinator to finish its
    /// teardown (streams stopped, monitor detached, final state
    /// published).
    pub async fn close(mut self) {
        // The flag makes any in-flight acquisition discard its result.
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.send(Command::Close).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn command(
        &self,
        make: impl FnOnce(oneshot::Sender<()>) -> Command,
    ) -> Result<(), MediaSelectError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(MediaSelectError::SessionClosed);
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(done_tx))
            .await
            .map_err(|_| MediaSelectError::SessionClosed)?;
        done_rx.await.map_err(|_| MediaSelectError::SessionClosed)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.task.is_none() {
            // Already closed explicitly.
            return;
        }
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.try_send(Command::Close);
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("closed", &self.is_closed())
            .finish()
    }
}
