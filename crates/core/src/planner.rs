use crate::config::{AppConfig, DEFAULT_MAX_FILENAME_LEN};
use crate::extractor::MetadataExtractor;
use crate::filename::{build_stem, extension_with_dot, resolve_collision, NameParts};
use crate::geocoder::{GeocodeCache, ReverseGeocoder};
use crate::heuristic::{assign_nearby_locations, DEFAULT_WINDOW_SECS};
use crate::metadata::{
    Coordinates, LocationSource, MediaFile, MediaKind, PartialMetadata, Place, TimeSource,
};
use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub max_filename_len: usize,
    pub heuristic_window_secs: i64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            heuristic_window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl From<&AppConfig> for PlanOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_filename_len: config.max_filename_len,
            heuristic_window_secs: config.heuristic_window_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub kind: MediaKind,
    pub location_source: LocationSource,
    pub coordinates: Option<Coordinates>,
    pub place: Option<Place>,
    pub time_source: TimeSource,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub inputs: usize,
    pub skipped_missing: usize,
    pub skipped_not_file: usize,
    pub skipped_unsupported: usize,
    pub skipped_duplicate: usize,
    pub extraction_failures: usize,
    pub with_gps: usize,
    pub borrowed: usize,
    pub geocoded: usize,
    pub geocode_failures: usize,
    pub planned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub candidates: Vec<RenameCandidate>,
    pub stats: RenameStats,
}

/// Computes every target name without touching the filesystem. Dry-run
/// prints this plan; live mode hands it to `apply_plan`.
///
/// Per-file problems are logged and counted in `RenameStats`; they never
/// fail the whole plan. Passing `None` for `geocoder` skips place lookups.
pub fn generate_plan(
    inputs: &[PathBuf],
    options: &PlanOptions,
    extractor: &mut dyn MetadataExtractor,
    geocoder: Option<&mut dyn ReverseGeocoder>,
) -> Result<RenamePlan> {
    let mut stats = RenameStats {
        inputs: inputs.len(),
        ..RenameStats::default()
    };

    let mut files = collect_media_files(inputs, extractor, &mut stats);
    stats.with_gps = files.iter().filter(|f| f.has_own_gps()).count();
    stats.borrowed = assign_nearby_locations(&mut files, options.heuristic_window_secs);

    if let Some(geocoder) = geocoder {
        resolve_places(&mut files, geocoder, &mut stats);
    }

    let mut candidates = Vec::with_capacity(files.len());
    let mut planned_paths = HashSet::<PathBuf>::new();

    for file in files {
        let extension = extension_with_dot(&file.path);
        let original_stem = file
            .path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();

        let stem = build_stem(
            &NameParts {
                place: file.place.as_ref(),
                timestamp: file.timestamp(),
                original_stem: &original_stem,
                extension: &extension,
            },
            options.max_filename_len,
        );
        let target = resolve_collision(
            &file.path,
            &stem,
            &extension,
            &mut planned_paths,
            options.max_filename_len,
        )?;

        let changed = target != file.path;
        if !changed {
            stats.unchanged += 1;
        }
        stats.planned += 1;

        candidates.push(RenameCandidate {
            time_source: file.time_source(),
            original_path: file.path,
            target_path: target,
            kind: file.kind,
            location_source: file.location_source,
            coordinates: file.coordinates,
            place: file.place,
            changed,
        });
    }

    Ok(RenamePlan { candidates, stats })
}

fn collect_media_files(
    inputs: &[PathBuf],
    extractor: &mut dyn MetadataExtractor,
    stats: &mut RenameStats,
) -> Vec<MediaFile> {
    let mut seen = HashSet::<PathBuf>::new();
    let mut files = Vec::with_capacity(inputs.len());

    for path in inputs {
        if !path.exists() {
            warn!(path = %path.display(), "ファイルが見つかりません");
            stats.skipped_missing += 1;
            continue;
        }
        if !path.is_file() {
            warn!(path = %path.display(), "通常のファイルではないためスキップします");
            stats.skipped_not_file += 1;
            continue;
        }
        let Some(kind) = MediaKind::from_path(path) else {
            warn!(path = %path.display(), "未対応のファイル形式です");
            stats.skipped_unsupported += 1;
            continue;
        };
        let identity = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        if !seen.insert(identity) {
            warn!(path = %path.display(), "同じファイルが複数回指定されています");
            stats.skipped_duplicate += 1;
            continue;
        }

        info!(path = %path.display(), "メタデータを読み込みます");
        let partial = match extractor.extract(path, kind) {
            Ok(partial) => partial,
            Err(err) => {
                warn!(path = %path.display(), "メタデータを取得できませんでした: {err}");
                stats.extraction_failures += 1;
                PartialMetadata::default()
            }
        };

        files.push(MediaFile::new(
            path.clone(),
            kind,
            partial,
            file_modified_to_local(path),
        ));
    }

    files
}

fn resolve_places(
    files: &mut [MediaFile],
    geocoder: &mut dyn ReverseGeocoder,
    stats: &mut RenameStats,
) {
    let mut cache = GeocodeCache::default();
    for file in files.iter_mut() {
        let Some(coordinates) = file.coordinates else {
            continue;
        };
        match cache.lookup(geocoder, coordinates) {
            Ok(place) => {
                if place.is_some() {
                    stats.geocoded += 1;
                }
                file.place = place;
            }
            Err(err) => {
                warn!(path = %file.path.display(), "地名を取得できませんでした: {err}");
                stats.geocode_failures += 1;
            }
        }
    }
}

fn file_modified_to_local(path: &Path) -> Option<DateTime<Local>> {
    let time = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::from(time))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::apply::apply_plan;
    use crate::error::{ExtractError, GeocodeError};
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    pub(crate) struct StubExtractor {
        pub entries: HashMap<String, PartialMetadata>,
    }

    impl StubExtractor {
        pub fn with(
            mut self,
            name: &str,
            offset_secs: Option<i64>,
            coords: Option<(f64, f64)>,
        ) -> Self {
            self.entries.insert(
                name.to_string(),
                PartialMetadata {
                    created: offset_secs.map(|s| base_time() + Duration::seconds(s)),
                    coordinates: coords.and_then(|(lat, lon)| Coordinates::new(lat, lon)),
                },
            );
            self
        }
    }

    impl MetadataExtractor for StubExtractor {
        fn extract(&mut self, path: &Path, _: MediaKind) -> Result<PartialMetadata, ExtractError> {
            let name = path
                .file_name()
                .map(|v| v.to_string_lossy().to_string())
                .unwrap_or_default();
            self.entries.get(&name).cloned().ok_or_else(|| {
                ExtractError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "no metadata",
                ))
            })
        }
    }

    pub(crate) struct StubGeocoder {
        pub calls: usize,
        pub fail: bool,
    }

    impl ReverseGeocoder for StubGeocoder {
        fn reverse(&mut self, coordinates: Coordinates) -> Result<Option<Place>, GeocodeError> {
            self.calls += 1;
            if self.fail {
                return Err(GeocodeError::Timeout);
            }
            let city = if coordinates.latitude > 0.0 { "Kyoto" } else { "Lima" };
            Ok(Some(Place {
                place: None,
                city: Some(city.to_string()),
                state: None,
                country: Some("Somewhere".to_string()),
            }))
        }
    }

    pub(crate) fn base_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).expect("write fixture");
        path
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn full_pipeline_borrows_geocodes_and_names() {
        let temp = tempdir().expect("tempdir");
        let inputs = vec![
            touch(temp.path(), "gps.jpg"),
            touch(temp.path(), "nogps.mov"),
            touch(temp.path(), "late.jpg"),
        ];
        let mut extractor = StubExtractor::default()
            .with("gps.jpg", Some(0), Some((35.0, 135.7)))
            .with("nogps.mov", Some(1800), None)
            .with("late.jpg", Some(7200), None);
        let mut geocoder = StubGeocoder {
            calls: 0,
            fail: false,
        };

        let plan = generate_plan(
            &inputs,
            &PlanOptions::default(),
            &mut extractor,
            Some(&mut geocoder),
        )
        .expect("plan");

        let names: Vec<String> = plan
            .candidates
            .iter()
            .map(|c| file_name(&c.target_path))
            .collect();
        assert_eq!(
            names,
            vec![
                "Kyoto_Somewhere_20240601_093000_gps.jpg",
                "Kyoto_Somewhere_20240601_100000_nogps.mov",
                "20240601_113000_late.jpg",
            ]
        );
        assert_eq!(geocoder.calls, 1);
        assert_eq!(plan.stats.with_gps, 1);
        assert_eq!(plan.stats.borrowed, 1);
        assert_eq!(plan.stats.geocoded, 2);
        assert_eq!(plan.stats.planned, 3);
        assert!(matches!(
            plan.candidates[1].location_source,
            LocationSource::Borrowed { .. }
        ));
    }

    #[test]
    fn same_target_name_in_batch_gets_suffix_and_keeps_both_files() {
        let temp = tempdir().expect("tempdir");
        let inputs = vec![touch(temp.path(), "a.jpg"), touch(temp.path(), "a .jpg")];
        let mut extractor = StubExtractor::default()
            .with("a.jpg", Some(0), None)
            .with("a .jpg", Some(0), None);

        let plan = generate_plan(&inputs, &PlanOptions::default(), &mut extractor, None)
            .expect("plan");

        assert_eq!(plan.candidates.len(), 2);
        assert_eq!(
            file_name(&plan.candidates[0].target_path),
            "20240601_093000_a.jpg"
        );
        assert_eq!(
            file_name(&plan.candidates[1].target_path),
            "20240601_093000_a_001.jpg"
        );

        let result = apply_plan(&plan);
        assert_eq!(result.applied, 2);
        assert_eq!(
            fs::read(temp.path().join("20240601_093000_a.jpg")).expect("read first"),
            b"a.jpg"
        );
        assert_eq!(
            fs::read(temp.path().join("20240601_093000_a_001.jpg")).expect("read second"),
            b"a .jpg"
        );
        assert_eq!(
            list_dir(temp.path()),
            vec!["20240601_093000_a.jpg", "20240601_093000_a_001.jpg"]
        );
    }

    #[test]
    fn identical_names_from_different_sources_get_numeric_suffix() {
        let temp = tempdir().expect("tempdir");
        let first = touch(temp.path(), "a.jpg");
        fs::write(temp.path().join("20240601_093000_a.jpg"), b"someone else").expect("write");
        let mut extractor = StubExtractor::default().with("a.jpg", Some(0), None);

        let plan = generate_plan(
            std::slice::from_ref(&first),
            &PlanOptions::default(),
            &mut extractor,
            None,
        )
        .expect("plan");

        assert_eq!(
            file_name(&plan.candidates[0].target_path),
            "20240601_093000_a_001.jpg"
        );
    }

    #[test]
    fn missing_unsupported_and_duplicate_inputs_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let photo = touch(temp.path(), "p.jpg");
        let inputs = vec![
            photo.clone(),
            temp.path().join("gone.jpg"),
            touch(temp.path(), "notes.txt"),
            photo,
        ];
        let mut extractor = StubExtractor::default().with("p.jpg", Some(0), None);

        let plan = generate_plan(&inputs, &PlanOptions::default(), &mut extractor, None)
            .expect("plan");

        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.stats.inputs, 4);
        assert_eq!(plan.stats.skipped_missing, 1);
        assert_eq!(plan.stats.skipped_unsupported, 1);
        assert_eq!(plan.stats.skipped_duplicate, 1);
    }

    #[test]
    fn directory_input_is_not_reported_as_missing() {
        let temp = tempdir().expect("tempdir");
        let folder = temp.path().join("holiday.jpg");
        fs::create_dir(&folder).expect("mkdir");
        let inputs = vec![folder.clone(), touch(temp.path(), "p.jpg")];
        let mut extractor = StubExtractor::default().with("p.jpg", Some(0), None);

        let plan = generate_plan(&inputs, &PlanOptions::default(), &mut extractor, None)
            .expect("plan");

        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.stats.skipped_not_file, 1);
        assert_eq!(plan.stats.skipped_missing, 0);
        assert!(folder.is_dir());
    }

    #[test]
    fn extraction_failure_falls_back_to_modified_time() {
        let temp = tempdir().expect("tempdir");
        let inputs = vec![touch(temp.path(), "broken.jpg")];
        let mut extractor = StubExtractor::default();

        let plan = generate_plan(&inputs, &PlanOptions::default(), &mut extractor, None)
            .expect("plan");

        let candidate = &plan.candidates[0];
        assert_eq!(plan.stats.extraction_failures, 1);
        assert_eq!(candidate.time_source, TimeSource::FileModified);
        assert_eq!(candidate.location_source, LocationSource::None);
        let name = file_name(&candidate.target_path);
        assert!(name.ends_with("_broken.jpg"), "{name}");
        assert_eq!(name.len(), "YYYYmmdd_HHMMSS_broken.jpg".len());
    }

    #[test]
    fn geocode_failure_keeps_coordinates_but_no_place() {
        let temp = tempdir().expect("tempdir");
        let inputs = vec![touch(temp.path(), "gps.jpg")];
        let mut extractor =
            StubExtractor::default().with("gps.jpg", Some(0), Some((-12.0, -77.0)));
        let mut geocoder = StubGeocoder {
            calls: 0,
            fail: true,
        };

        let plan = generate_plan(
            &inputs,
            &PlanOptions::default(),
            &mut extractor,
            Some(&mut geocoder),
        )
        .expect("plan");

        assert_eq!(plan.stats.geocode_failures, 1);
        assert!(plan.candidates[0].coordinates.is_some());
        assert!(plan.candidates[0].place.is_none());
        assert_eq!(
            file_name(&plan.candidates[0].target_path),
            "20240601_093000_gps.jpg"
        );
    }

    #[test]
    fn planning_never_touches_the_filesystem() {
        let temp = tempdir().expect("tempdir");
        let inputs = vec![touch(temp.path(), "x.jpg"), touch(temp.path(), "y.mp4")];
        let mut extractor = StubExtractor::default()
            .with("x.jpg", Some(0), Some((1.0, 1.0)))
            .with("y.mp4", Some(60), None);
        let before = list_dir(temp.path());

        let plan = generate_plan(&inputs, &PlanOptions::default(), &mut extractor, None)
            .expect("plan");

        assert!(plan.candidates.iter().all(|c| c.changed));
        assert_eq!(list_dir(temp.path()), before);
    }

    pub(crate) fn list_dir(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}
