use crate::metadata::{LocationSource, MediaFile};
use tracing::info;

pub const DEFAULT_WINDOW_SECS: i64 = 3600;

/// Gives every file without coordinates the coordinates of the GPS-bearing
/// file closest to it in time, provided the gap is at most `window_secs`.
///
/// Only files carrying their own GPS act as donors, so borrowed coordinates
/// never chain. On equal distance the donor that appears first in `files`
/// wins. Returns the number of files that received coordinates.
pub fn assign_nearby_locations(files: &mut [MediaFile], window_secs: i64) -> usize {
    let donors: Vec<usize> = files
        .iter()
        .enumerate()
        .filter(|(_, file)| file.has_own_gps() && file.timestamp().is_some())
        .map(|(index, _)| index)
        .collect();
    if donors.is_empty() {
        return 0;
    }

    let mut assignments = Vec::new();
    for (index, file) in files.iter().enumerate() {
        if file.coordinates.is_some() {
            continue;
        }
        let Some(timestamp) = file.timestamp() else {
            continue;
        };

        let mut best: Option<(usize, i64)> = None;
        for &donor in &donors {
            let Some(donor_time) = files[donor].timestamp() else {
                continue;
            };
            let delta = (timestamp - donor_time).num_seconds().abs();
            if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                best = Some((donor, delta));
            }
        }

        if let Some((donor, delta)) = best {
            if delta <= window_secs {
                assignments.push((index, donor));
            }
        }
    }

    for &(index, donor) in &assignments {
        let coordinates = files[donor].coordinates;
        let from = files[donor].path.clone();
        info!(
            file = %files[index].path.display(),
            donor = %from.display(),
            "近い時刻のファイルから位置情報を借用しました"
        );
        let file = &mut files[index];
        file.coordinates = coordinates;
        file.location_source = LocationSource::Borrowed { from };
    }

    assignments.len()
}
