//! Error types for media-select.
//!
//! Errors are split into two categories:
//! - **Session errors** ([`MediaSelectError`]): surfaced through the
//!   view-model and returned from the command surface
//! - **Runtime notifications**: non-fatal events surfaced via
//!   [`EventCallback`](crate::EventCallback)
//!
//! `Unsupported` and `PermissionDenied` are terminal for a session - the
//! coordinator never retries them internally. `EnumerationFailed` and
//! `DeviceAccessFailed` surface as the current error without invalidating
//! previously known good state.

use crate::device::DeviceKind;

/// Errors surfaced by the device session.
///
/// The error type is `Clone` because the latest error is carried inside
/// the published view-model snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaSelectError {
    /// The host environment lacks a required device capability.
    ///
    /// Terminal for the session. The reason names the most specific
    /// missing capability.
    #[error("media devices unsupported: {reason}")]
    Unsupported {
        /// Which capability is missing.
        reason: String,
    },

    /// Permission to capture was denied.
    ///
    /// Terminal for the session - recovery requires external action
    /// (page reload, OS settings).
    #[error("permission denied for media capture (check OS settings)")]
    PermissionDenied,

    /// Device enumeration failed for a reason other than denial.
    #[error("device enumeration failed: {reason}")]
    EnumerationFailed {
        /// The underlying cause.
        reason: String,
    },

    /// Acquiring a capture stream for a device failed.
    ///
    /// The optimistic selection is kept; any previously live stream of
    /// another kind is untouched.
    #[error("failed to access {} device: {reason}", kind.noun())]
    DeviceAccessFailed {
        /// Which input kind failed.
        kind: DeviceKind,
        /// The underlying cause.
        reason: String,
    },

    /// A selection intent could not be applied.
    #[error("selection failed: {reason}")]
    SelectionFailed {
        /// Why the selection was rejected.
        reason: String,
    },

    /// A command was issued after the session was closed.
    #[error("session closed")]
    SessionClosed,
}

impl MediaSelectError {
    /// Creates an enumeration failure from any displayable cause.
    pub fn enumeration(cause: impl std::fmt::Display) -> Self {
        Self::EnumerationFailed {
            reason: cause.to_string(),
        }
    }

    /// Creates a device access failure for a kind from any displayable cause.
    pub fn device_access(kind: DeviceKind, cause: impl std::fmt::Display) -> Self {
        Self::DeviceAccessFailed {
            kind,
            reason: cause.to_string(),
        }
    }

    /// Creates a selection failure from any displayable cause.
    pub fn selection(cause: impl std::fmt::Display) -> Self {
        Self::SelectionFailed {
            reason: cause.to_string(),
        }
    }

    /// Whether this error is terminal for the session (no internal retry).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediaSelectError::Unsupported {
            reason: "no device API".to_string(),
        };
        assert_eq!(err.to_string(), "media devices unsupported: no device API");
    }

    #[test]
    fn test_device_access_display_names_kind() {
        let err = MediaSelectError::device_access(DeviceKind::AudioInput, "busy");
        assert_eq!(err.to_string(), "failed to access microphone device: busy");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(MediaSelectError::PermissionDenied.is_terminal());
        assert!(MediaSelectError::Unsupported {
            reason: String::new()
        }
        .is_terminal());
        assert!(!MediaSelectError::enumeration("boom").is_terminal());
        assert!(!MediaSelectError::device_access(DeviceKind::VideoInput, "gone").is_terminal());
    }
}
