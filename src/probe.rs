//! Environment probe: capability detection for the host platform.
//!
//! The probe is the single source of truth the coordinator consults before
//! attempting any device operation. It is pure and synchronous - safe to
//! call repeatedly, no side effects, no prompts.

use crate::error::MediaSelectError;
use crate::platform::MediaPlatform;

/// Raw capability flags reported by a platform implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A host runtime with media APIs exists at all.
    pub is_host_runtime: bool,
    /// The device API surface is present.
    pub has_device_api: bool,
    /// Capture streams can be requested.
    pub has_capture_api: bool,
    /// Devices can be enumerated.
    pub has_enumeration_api: bool,
}

impl Capabilities {
    /// Capabilities for a fully featured platform.
    #[must_use]
    pub fn full() -> Self {
        Self {
            is_host_runtime: true,
            has_device_api: true,
            has_capture_api: true,
            has_enumeration_api: true,
        }
    }

    /// Capabilities for an environment with no media support at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            is_host_runtime: false,
            has_device_api: false,
            has_capture_api: false,
            has_enumeration_api: false,
        }
    }
}

/// The probe's verdict, consumed once at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityReport {
    /// The raw flags the verdict was computed from.
    pub capabilities: Capabilities,
    /// Set when a required capability is absent; names the most
    /// specific missing capability.
    pub error: Option<MediaSelectError>,
}

impl CapabilityReport {
    /// Whether every required capability is present.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.error.is_none()
    }
}

/// Probes a platform and produces a capability report.
///
/// Missing capabilities are reported in order of specificity: no host
/// runtime, then no device API, then no capture API, then no
/// enumeration API.
#[must_use]
pub fn probe(platform: &dyn MediaPlatform) -> CapabilityReport {
    let capabilities = platform.capabilities();

    let missing = if !capabilities.is_host_runtime {
        Some("no media-capable host runtime")
    } else if !capabilities.has_device_api {
        Some("host runtime exposes no device API")
    } else if !capabilities.has_capture_api {
        Some("device API cannot request capture streams")
    } else if !capabilities.has_enumeration_api {
        Some("device API cannot enumerate devices")
    } else {
        None
    };

    CapabilityReport {
        capabilities,
        error: missing.map(|reason| MediaSelectError::Unsupported {
            reason: reason.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;

    #[test]
    fn test_full_capabilities_supported() {
        let platform = MockPlatform::new();
        let report = probe(&platform);
        assert!(report.is_supported());
        assert_eq!(report.error, None);
    }

    #[test]
    fn test_missing_reported_by_specificity() {
        let cases = [
            (Capabilities::none(), "no media-capable host runtime"),
            (
                Capabilities {
                    is_host_runtime: true,
                    ..Capabilities::none()
                },
                "host runtime exposes no device API",
            ),
            (
                Capabilities {
                    is_host_runtime: true,
                    has_device_api: true,
                    ..Capabilities::none()
                },
                "device API cannot request capture streams",
            ),
            (
                Capabilities {
                    has_enumeration_api: false,
                    ..Capabilities::full()
                },
                "device API cannot enumerate devices",
            ),
        ];

        for (caps, expected) in cases {
            let platform = MockPlatform::with_capabilities(caps);
            let report = probe(&platform);
            match report.error {
                Some(MediaSelectError::Unsupported { reason }) => assert_eq!(reason, expected),
                other => panic!("expected Unsupported, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_probe_is_repeatable() {
        let platform = MockPlatform::new();
        assert_eq!(probe(&platform), probe(&platform));
    }
}
