//! Device identity and catalog view types.

use std::sync::Arc;

/// The three kinds of media device the session works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Audio input (microphone).
    AudioInput,
    /// Video input (camera).
    VideoInput,
    /// Audio output (speaker).
    AudioOutput,
}

impl DeviceKind {
    /// Human-readable noun for labels and messages.
    #[must_use]
    pub fn noun(&self) -> &'static str {
        match self {
            Self::AudioInput => "microphone",
            Self::VideoInput => "camera",
            Self::AudioOutput => "speaker",
        }
    }

    /// Returns `true` for kinds that own capture tracks when selected.
    ///
    /// Output devices never own tracks - selecting a speaker only
    /// re-routes playback.
    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::AudioInput | Self::VideoInput)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AudioInput => "audioinput",
            Self::VideoInput => "videoinput",
            Self::AudioOutput => "audiooutput",
        };
        write!(f, "{s}")
    }
}

/// Unique identifier for a media device.
///
/// `DeviceId` is a lightweight, cloneable identifier. It uses `Arc<str>`
/// internally so cloning is an Arc pointer copy, no heap allocation.
///
/// # Example
///
/// ```
/// use media_select::DeviceId;
///
/// let mic = DeviceId::new("mic1");
/// assert_eq!(mic, DeviceId::new("mic1"));
/// assert_ne!(mic, DeviceId::new("mic2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates a new device ID from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An entry in the device catalog.
///
/// Immutable once constructed - the catalog replaces the whole collection
/// on each refresh rather than mutating individual descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Stable device identity.
    pub id: DeviceId,
    /// Which of the three device kinds this is.
    pub kind: DeviceKind,
    /// Human-readable label. May be empty before permission is granted
    /// (platform privacy rule) - use [`display_label`](Self::display_label).
    pub label: String,
    /// Physical grouping hint from the platform (same hardware).
    pub group_id: String,
}

impl DeviceDescriptor {
    /// Label for display. Falls back to `"Unknown <kind>"` when the
    /// platform withheld the label (no permission yet).
    #[must_use]
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("Unknown {}", self.kind.noun())
        } else {
            self.label.clone()
        }
    }
}

/// The catalog partitioned by kind for consumption.
///
/// This is a derived view: it is always recomputed from the flat catalog
/// via [`DeviceLists::partition`], never maintained independently. The
/// per-kind slices are `Arc`-shared so cloning the view is cheap.
#[derive(Debug, Clone)]
pub struct DeviceLists {
    /// Audio input devices, in catalog order.
    pub microphones: Arc<[DeviceDescriptor]>,
    /// Video input devices, in catalog order.
    pub cameras: Arc<[DeviceDescriptor]>,
    /// Audio output devices, in catalog order.
    pub speakers: Arc<[DeviceDescriptor]>,
}

impl Default for DeviceLists {
    fn default() -> Self {
        Self::empty()
    }
}

impl DeviceLists {
    /// An empty view, used before the first enumeration.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            microphones: Arc::from([]),
            cameras: Arc::from([]),
            speakers: Arc::from([]),
        }
    }

    /// Partitions a flat catalog into the three per-kind views.
    #[must_use]
    pub fn partition(catalog: &[DeviceDescriptor]) -> Self {
        let of_kind = |kind: DeviceKind| -> Arc<[DeviceDescriptor]> {
            catalog
                .iter()
                .filter(|d| d.kind == kind)
                .cloned()
                .collect::<Vec<_>>()
                .into()
        };

        Self {
            microphones: of_kind(DeviceKind::AudioInput),
            cameras: of_kind(DeviceKind::VideoInput),
            speakers: of_kind(DeviceKind::AudioOutput),
        }
    }

    /// The list for a given kind.
    #[must_use]
    pub fn of_kind(&self, kind: DeviceKind) -> &[DeviceDescriptor] {
        match kind {
            DeviceKind::AudioInput => &self.microphones,
            DeviceKind::VideoInput => &self.cameras,
            DeviceKind::AudioOutput => &self.speakers,
        }
    }

    /// First catalog entry of a kind, used for default seeding.
    #[must_use]
    pub fn first(&self, kind: DeviceKind) -> Option<&DeviceDescriptor> {
        self.of_kind(kind).first()
    }

    /// Whether a device id is present in the list for its kind.
    #[must_use]
    pub fn contains(&self, kind: DeviceKind, id: &DeviceId) -> bool {
        self.of_kind(kind).iter().any(|d| &d.id == id)
    }

    /// Whether all three views are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.microphones.is_empty() && self.cameras.is_empty() && self.speakers.is_empty()
    }
}
