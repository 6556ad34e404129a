// error.rs — 错误类型

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TourError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode image {name}: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid manifest: {0}")]
    Manifest(String),
    #[error("missing resource: {0}")]
    MissingResource(String),
    #[error("unknown view: {0}")]
    UnknownView(String),
    #[error("graphics setup failed: {0}")]
    Gpu(String),
}

pub type Result<T> = std::result::Result<T, TourError>;
