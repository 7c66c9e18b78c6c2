mod apply;
mod config;
mod error;
mod exif_reader;
mod exiftool_reader;
mod extractor;
mod ffprobe_reader;
mod filename;
mod geocoder;
mod heuristic;
mod metadata;
mod planner;
mod sanitize;

pub use apply::{apply_plan, ApplyResult};
pub use config::{
    app_paths, load_config, parse_config, AppConfig, AppPaths, ExtractorConfig, GeocoderConfig,
};
pub use error::{ExtractError, GeocodeError};
pub use extractor::{FallbackReader, MediaExtractor, MetadataExtractor};
pub use filename::{build_stem, NameParts, TIMESTAMP_FORMAT};
pub use geocoder::{GeocodeCache, NominatimGeocoder, ReverseGeocoder, RetryPolicy, Throttle};
pub use heuristic::assign_nearby_locations;
pub use metadata::{
    Coordinates, LocationSource, MediaFile, MediaKind, PartialMetadata, Place, TimeSource,
};
pub use planner::{generate_plan, PlanOptions, RenameCandidate, RenamePlan, RenameStats};
