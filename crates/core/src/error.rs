use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("ファイルを読めませんでした: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIFを解析できませんでした: {0}")]
    Exif(#[from] exif::Error),
    #[error("exiftoolの実行に失敗しました: {0}")]
    Exiftool(#[from] exiftool::ExifToolError),
    #[error("ffprobeの実行に失敗しました: {0}")]
    Ffprobe(String),
    #[error("メタデータJSONを解析できませんでした: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("ジオコーディングがタイムアウトしました")]
    Timeout,
    #[error("ジオコーディングサービスが一時的に利用できません: {0}")]
    Transient(String),
    #[error("ジオコーディングのHTTPリクエストに失敗しました: {0}")]
    Http(String),
    #[error("ジオコーディング応答を解析できませんでした: {0}")]
    Decode(String),
}

impl GeocodeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transient(_))
    }
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Transient(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
