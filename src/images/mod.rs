pub mod capture;
pub mod cloudinary;

pub use capture::{ChartCapture, CapturedChart, CAPTURE_TIMEFRAMES};
pub use cloudinary::{CloudinaryClient, ImageHost, UploadedImage};

use thiserror::Error;

use crate::error::AppError;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image host rejected request: {0}")]
    Api(String),

    #[error("image host not configured")]
    NotConfigured,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Io(e) => AppError::Io(e),
            other => AppError::ImageHost(other.to_string()),
        }
    }
}
