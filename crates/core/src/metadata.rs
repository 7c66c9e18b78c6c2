use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "m4v", "3gp"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Photo)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` for out-of-range values and for the (0, 0) point that
    /// cameras write when they have no fix.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        if latitude == 0.0 && longitude == 0.0 {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub place: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Place {
    pub fn parts(&self) -> [Option<&str>; 4] {
        [
            self.place.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.country.as_deref(),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.parts()
            .iter()
            .all(|part| part.map(str::trim).unwrap_or_default().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationSource {
    #[default]
    None,
    Gps,
    Borrowed {
        from: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    Metadata,
    FileModified,
    Unknown,
}

/// What a single extraction backend managed to read from a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMetadata {
    pub created: Option<DateTime<Local>>,
    pub coordinates: Option<Coordinates>,
}

impl PartialMetadata {
    pub fn merge_missing_from(&mut self, fallback: &PartialMetadata) {
        if self.created.is_none() {
            self.created = fallback.created;
        }
        if self.coordinates.is_none() {
            self.coordinates = fallback.coordinates;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.created.is_some() && self.coordinates.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub coordinates: Option<Coordinates>,
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub location_source: LocationSource,
    pub place: Option<Place>,
}

impl MediaFile {
    pub fn new(
        path: PathBuf,
        kind: MediaKind,
        partial: PartialMetadata,
        modified: Option<DateTime<Local>>,
    ) -> Self {
        let location_source = if partial.coordinates.is_some() {
            LocationSource::Gps
        } else {
            LocationSource::None
        };
        Self {
            path,
            kind,
            coordinates: partial.coordinates,
            created: partial.created,
            modified,
            location_source,
            place: None,
        }
    }

    /// Creation time, falling back to the file modification time.
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        self.created.or(self.modified)
    }

    pub fn time_source(&self) -> TimeSource {
        match (self.created, self.modified) {
            (Some(_), _) => TimeSource::Metadata,
            (None, Some(_)) => TimeSource::FileModified,
            (None, None) => TimeSource::Unknown,
        }
    }

    pub fn has_own_gps(&self) -> bool {
        self.coordinates.is_some() && self.location_source == LocationSource::Gps
    }
}
