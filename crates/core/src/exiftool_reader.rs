use crate::error::ExtractError;
use crate::exif_reader::parse_date;
use crate::extractor::FallbackReader;
use crate::metadata::{Coordinates, PartialMetadata};
use exiftool::ExifTool;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

const DATE_KEYS: &[&str] = &[
    "DateTimeOriginal",
    "CreateDate",
    "MediaCreateDate",
    "TrackCreateDate",
    "CreationDate",
    "ModifyDate",
];

/// Lazily started `exiftool` process used when the primary backend comes up
/// short. A failed start is remembered so the batch does not retry it per file.
#[derive(Default)]
pub struct ExiftoolFallback {
    tool: Option<ExifTool>,
    unavailable: bool,
}

impl FallbackReader for ExiftoolFallback {
    fn read(&mut self, path: &Path) -> Option<PartialMetadata> {
        let tool = self.tool()?;
        match tool.json(path, &["-n"]) {
            Ok(value) => Some(metadata_from_json(&value)),
            Err(err) => {
                let err = ExtractError::from(err);
                warn!(path = %path.display(), "{err}");
                None
            }
        }
    }
}

impl ExiftoolFallback {
    fn tool(&mut self) -> Option<&mut ExifTool> {
        if self.unavailable {
            return None;
        }
        if self.tool.is_none() {
            match ExifTool::new() {
                Ok(tool) => self.tool = Some(tool),
                Err(err) => {
                    debug!("exiftoolを起動できませんでした: {err}");
                    self.unavailable = true;
                    return None;
                }
            }
        }
        self.tool.as_mut()
    }
}

/// Reads `exiftool -n` output, where GPS values are already signed decimals.
pub(crate) fn metadata_from_json(value: &Value) -> PartialMetadata {
    let created = DATE_KEYS
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find_map(parse_date);

    let coordinates = match (
        value.get("GPSLatitude").and_then(Value::as_f64),
        value.get("GPSLongitude").and_then(Value::as_f64),
    ) {
        (Some(lat), Some(lon)) => Coordinates::new(lat, lon),
        _ => None,
    };

    PartialMetadata {
        created,
        coordinates,
    }
}
