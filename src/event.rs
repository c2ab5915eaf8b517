//! Runtime events for monitoring the device session.
//!
//! Events are non-fatal notifications about session behavior. The session
//! keeps running after events are emitted - they're for logging/metrics
//! and for presentation-layer reactions (confirm, close), not error
//! handling. Errors travel through the view-model instead.

use std::sync::Arc;

use crate::device::{DeviceId, DeviceKind};
use crate::error::MediaSelectError;
use crate::selection::SelectionState;

/// Runtime events emitted by the selection coordinator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A device enumeration completed successfully.
    DevicesRefreshed {
        /// Number of devices in the fresh catalog.
        count: usize,
    },

    /// The platform signaled that the device set changed (hot-plug).
    ///
    /// A re-enumeration follows; multiple notifications during an
    /// in-flight refresh coalesce into a single trailing one.
    DeviceChange,

    /// A currently selected device is no longer present in the catalog.
    ///
    /// Policy: the stale id is retained in the selection rather than
    /// silently replaced. The presentation layer may render a warning.
    SelectedDeviceMissing {
        /// Kind of the missing device.
        kind: DeviceKind,
        /// The id that is no longer enumerated.
        device_id: DeviceId,
    },

    /// A capture stream was acquired for an input device.
    StreamAcquired {
        /// The input kind that went live.
        kind: DeviceKind,
        /// The device the stream is bound to.
        device_id: DeviceId,
    },

    /// The capture stream of a kind was released.
    StreamReleased {
        /// The input kind that was torn down.
        kind: DeviceKind,
    },

    /// Playback output was re-routed to a speaker device.
    OutputRouted {
        /// The output device now in use.
        device_id: DeviceId,
    },

    /// The user confirmed the current selection.
    SelectionConfirmed {
        /// Snapshot of the selection at confirmation time.
        selection: SelectionState,
    },

    /// The user asked to close the dialog. Live streams and the level
    /// monitor are torn down; the session itself stays usable.
    CloseRequested,

    /// An operation failed. The same error is surfaced in the view-model.
    SessionError {
        /// The error that occurred.
        error: MediaSelectError,
    },
}

/// Callback type for receiving runtime events.
///
/// Register via [`MediaSelectBuilder::on_event()`].
///
/// [`MediaSelectBuilder::on_event()`]: crate::MediaSelectBuilder::on_event
pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use media_select::{event_callback, SessionEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(SessionEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
