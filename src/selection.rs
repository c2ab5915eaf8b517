//! Current device selection and its seeding rules.

use crate::device::{DeviceId, DeviceKind, DeviceLists};

/// The user's current device choices, one slot per kind.
///
/// All three fields are independently nullable; `None` means "nothing
/// selected for that kind" and never triggers stream acquisition.
///
/// # Defaults
///
/// - `camera_id` starts as `None` and is never auto-seeded from the
///   catalog, even when camera inclusion is enabled.
/// - `microphone_id` and `speaker_id` seed to the first catalog entry of
///   their kind the first time the catalog is non-empty, but only if the
///   user hasn't already chosen - re-enumeration never overwrites an
///   explicit choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// Selected microphone, if any.
    pub microphone_id: Option<DeviceId>,
    /// Selected camera, if any. Never auto-selected.
    pub camera_id: Option<DeviceId>,
    /// Selected speaker, if any.
    pub speaker_id: Option<DeviceId>,
}

impl SelectionState {
    /// The selected id for a kind.
    #[must_use]
    pub fn get(&self, kind: DeviceKind) -> Option<&DeviceId> {
        match kind {
            DeviceKind::AudioInput => self.microphone_id.as_ref(),
            DeviceKind::VideoInput => self.camera_id.as_ref(),
            DeviceKind::AudioOutput => self.speaker_id.as_ref(),
        }
    }

    /// Replaces the selection slot for a kind.
    pub(crate) fn set(&mut self, kind: DeviceKind, id: Option<DeviceId>) {
        match kind {
            DeviceKind::AudioInput => self.microphone_id = id,
            DeviceKind::VideoInput => self.camera_id = id,
            DeviceKind::AudioOutput => self.speaker_id = id,
        }
    }

    /// Seeds default microphone and speaker choices from the catalog.
    ///
    /// Only unset slots are filled; the camera slot is left alone
    /// unconditionally. Safe to call after every refresh.
    pub(crate) fn seed_defaults(&mut self, lists: &DeviceLists) {
        if self.microphone_id.is_none() {
            self.microphone_id = lists.first(DeviceKind::AudioInput).map(|d| d.id.clone());
        }
        if self.speaker_id.is_none() {
            self.speaker_id = lists.first(DeviceKind::AudioOutput).map(|d| d.id.clone());
        }
    }

    /// Selected ids that are not present in the given catalog view.
    ///
    /// These stay selected (no forced fallback); callers surface them as
    /// "selected device not in catalog".
    #[must_use]
    pub fn missing_from(&self, lists: &DeviceLists) -> Vec<(DeviceKind, DeviceId)> {
        let mut missing = Vec::new();
        for kind in [
            DeviceKind::AudioInput,
            DeviceKind::VideoInput,
            DeviceKind::AudioOutput,
        ] {
            if let Some(id) = self.get(kind) {
                if !lists.contains(kind, id) {
                    missing.push((kind, id.clone()));
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceDescriptor;

    fn lists(entries: &[(&str, DeviceKind)]) -> DeviceLists {
        let catalog: Vec<DeviceDescriptor> = entries
            .iter()
            .map(|(id, kind)| DeviceDescriptor {
                id: DeviceId::new(*id),
                kind: *kind,
                label: String::new(),
                group_id: String::new(),
            })
            .collect();
        DeviceLists::partition(&catalog)
    }

    #[test]
    fn test_seed_fills_mic_and_speaker_only() {
        let lists = lists(&[
            ("mic1", DeviceKind::AudioInput),
            ("mic2", DeviceKind::AudioInput),
            ("cam1", DeviceKind::VideoInput),
            ("speaker1", DeviceKind::AudioOutput),
        ]);

        let mut selection = SelectionState::default();
        selection.seed_defaults(&lists);

        assert_eq!(selection.microphone_id, Some(DeviceId::new("mic1")));
        assert_eq!(selection.speaker_id, Some(DeviceId::new("speaker1")));
        assert_eq!(selection.camera_id, None);
    }

    #[test]
    fn test_seed_never_overwrites_user_choice() {
        let lists = lists(&[
            ("mic1", DeviceKind::AudioInput),
            ("mic2", DeviceKind::AudioInput),
        ]);

        let mut selection = SelectionState::default();
        selection.set(DeviceKind::AudioInput, Some(DeviceId::new("mic2")));
        selection.seed_defaults(&lists);

        assert_eq!(selection.microphone_id, Some(DeviceId::new("mic2")));
    }

    #[test]
    fn test_seed_on_empty_catalog_leaves_none() {
        let mut selection = SelectionState::default();
        selection.seed_defaults(&DeviceLists::empty());
        assert_eq!(selection, SelectionState::default());
    }

    #[test]
    fn test_missing_from_reports_stale_ids() {
        let before = lists(&[("mic1", DeviceKind::AudioInput)]);
        let mut selection = SelectionState::default();
        selection.seed_defaults(&before);

        let after = lists(&[("mic9", DeviceKind::AudioInput)]);
        let missing = selection.missing_from(&after);

        assert_eq!(
            missing,
            vec![(DeviceKind::AudioInput, DeviceId::new("mic1"))]
        );
        // The stale id itself stays selected.
        assert_eq!(selection.microphone_id, Some(DeviceId::new("mic1")));
    }

    #[test]
    fn test_get_and_set_by_kind() {
        let mut selection = SelectionState::default();
        selection.set(DeviceKind::VideoInput, Some(DeviceId::new("cam1")));

        assert_eq!(
            selection.get(DeviceKind::VideoInput),
            Some(&DeviceId::new("cam1"))
        );
        assert_eq!(selection.get(DeviceKind::AudioInput), None);

        selection.set(DeviceKind::VideoInput, None);
        assert_eq!(selection.camera_id, None);
    }
}
