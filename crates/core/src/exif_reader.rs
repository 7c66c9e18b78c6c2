use crate::error::ExtractError;
use crate::metadata::{Coordinates, PartialMetadata};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn read_exif_metadata(path: &Path) -> Result<PartialMetadata, ExtractError> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut buf)?;

    let created = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .find_map(|field| parse_date(&field.display_value().to_string()));

    Ok(PartialMetadata {
        created,
        coordinates: read_gps(&exif),
    })
}

fn read_gps(exif: &Exif) -> Option<Coordinates> {
    let latitude = read_gps_axis(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let longitude = read_gps_axis(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
    Coordinates::new(latitude, longitude)
}

fn read_gps_axis(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(ref parts) = field.value else {
        return None;
    };
    let dms: Vec<f64> = parts.iter().map(|r| r.to_f64()).collect();
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .map(|f| f.display_value().to_string());
    dms_to_decimal(&dms, reference.as_deref())
}

/// Degrees/minutes/seconds to signed decimal degrees. Minutes and seconds may
/// be missing; an `S` or `W` reference flips the sign.
pub(crate) fn dms_to_decimal(dms: &[f64], reference: Option<&str>) -> Option<f64> {
    let degrees = *dms.first()?;
    let minutes = dms.get(1).copied().unwrap_or(0.0);
    let seconds = dms.get(2).copied().unwrap_or(0.0);
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if !decimal.is_finite() {
        return None;
    }

    let negative = reference
        .map(|r| r.trim().trim_matches('"'))
        .is_some_and(|r| r.eq_ignore_ascii_case("S") || r.eq_ignore_ascii_case("W"));
    Some(if negative { -decimal } else { decimal })
}

pub(crate) fn parse_date(input: &str) -> Option<DateTime<Local>> {
    let normalized = input.trim().trim_matches('"');

    if let Ok(dt) = DateTime::parse_from_rfc3339(normalized) {
        return Some(dt.with_timezone(&Local));
    }

    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
    ];

    for fmt in candidates {
        if let Ok(dt) = DateTime::parse_from_str(normalized, fmt) {
            return Some(dt.with_timezone(&Local));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(normalized, fmt) {
            if let Some(local) = Local.from_local_datetime(&naive).earliest() {
                return Some(local);
            }
        }
    }

    None
}
