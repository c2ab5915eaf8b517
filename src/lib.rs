//! # media-select
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Media device selection with live preview state.
//!
//! `media-select` drives the device-picker flow of a media application:
//! it enumerates microphones, cameras and speakers, manages capture
//! permission, keeps live preview streams for the chosen inputs, monitors
//! the microphone level, and publishes everything as an immutable
//! view-model snapshot the UI can poll on every render.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use media_select::{DeviceKind, MediaSelect};
//!
//! let session = MediaSelect::builder()
//!     .include_camera(true)
//!     .on_event(|e| tracing::warn!(?e, "session event"))
//!     .start()
//!     .await;
//!
//! let vm = session.view_model();
//! if let Some(mic) = vm.device_lists.microphones.first() {
//!     session
//!         .select_device(DeviceKind::AudioInput, Some(mic.id.clone()))
//!         .await?;
//! }
//!
//! println!("level: {:.2}", session.audio_level());
//! session.close().await;
//! ```
//!
//! ## Architecture
//!
//! All state lives in a single coordinator task:
//!
//! - **Coordinator**: one `tokio::select!` actor applies every transition,
//!   so device operations never overlap
//! - **Platform seam**: device APIs are reached only through the
//!   [`MediaPlatform`] trait ([`HostPlatform`] for desktop audio,
//!   [`MockPlatform`](platform::MockPlatform) for tests)
//! - **View-model**: each transition publishes a fresh immutable snapshot
//!   over a `watch` channel; the display-rate microphone level travels on
//!   its own channel so it never invalidates structural state
//!
//! Hot-plug notifications coalesce while a refresh is in flight, and
//! disposal discards the results of any operation still in the air.

#![warn(missing_docs)]
// Audio analysis requires intentional numeric casts between sample scales
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod catalog;
mod coordinator;
mod device;
mod error;
mod event;
mod level;
pub mod platform;
mod probe;
mod selection;
mod session;
mod stream;

pub use builder::{MediaSelect, MediaSelectBuilder};
pub use catalog::{DeviceCatalog, PermissionStatus};
pub use coordinator::{SessionPhase, ViewModel};
pub use device::{DeviceDescriptor, DeviceId, DeviceKind, DeviceLists};
pub use error::MediaSelectError;
pub use event::{event_callback, EventCallback, SessionEvent};
pub use level::LevelMonitor;
pub use platform::{HostPlatform, MediaPlatform, MediaTrack, OutputTarget, RawDevice, TrackConstraints};
pub use probe::{probe, Capabilities, CapabilityReport};
pub use selection::SelectionState;
pub use session::DeviceSession;
pub use stream::{ActiveStream, StreamSession};
