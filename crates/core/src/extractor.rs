use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::exif_reader::read_exif_metadata;
use crate::exiftool_reader::ExiftoolFallback;
use crate::ffprobe_reader::read_ffprobe_metadata;
use crate::metadata::{MediaKind, PartialMetadata};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Source of GPS and creation time for one file.
pub trait MetadataExtractor {
    fn extract(&mut self, path: &Path, kind: MediaKind) -> Result<PartialMetadata, ExtractError>;
}

/// Secondary backend consulted when the primary one fails or leaves gaps.
/// `None` means it had nothing to offer for this file.
pub trait FallbackReader {
    fn read(&mut self, path: &Path) -> Option<PartialMetadata>;
}

/// Photos go through kamadak-exif, videos through ffprobe. Either way
/// exiftool fills whatever the primary backend left empty.
pub struct MediaExtractor {
    fallback: Box<dyn FallbackReader>,
    ffprobe_timeout: Duration,
}

impl MediaExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self::with_fallback(config, ExiftoolFallback::default())
    }

    pub fn with_fallback(
        config: &ExtractorConfig,
        fallback: impl FallbackReader + 'static,
    ) -> Self {
        Self {
            fallback: Box::new(fallback),
            ffprobe_timeout: config.ffprobe_timeout(),
        }
    }
}

impl MetadataExtractor for MediaExtractor {
    fn extract(&mut self, path: &Path, kind: MediaKind) -> Result<PartialMetadata, ExtractError> {
        let primary = match kind {
            MediaKind::Photo => read_exif_metadata(path),
            MediaKind::Video => read_ffprobe_metadata(path, self.ffprobe_timeout),
        };
        fill_from_fallback(path, primary, self.fallback.as_mut())
    }
}

fn fill_from_fallback(
    path: &Path,
    primary: Result<PartialMetadata, ExtractError>,
    fallback: &mut dyn FallbackReader,
) -> Result<PartialMetadata, ExtractError> {
    match primary {
        Ok(meta) if meta.is_complete() => Ok(meta),
        Ok(mut meta) => {
            if let Some(extra) = fallback.read(path) {
                debug!(path = %path.display(), "exiftoolで不足項目を補完します");
                meta.merge_missing_from(&extra);
            }
            Ok(meta)
        }
        Err(err) => {
            debug!(path = %path.display(), "一次バックエンド失敗: {err}");
            fallback.read(path).ok_or(err)
        }
    }
}
