//! Error types for trailfx.
//!
//! Only loading steps can fail. Frame-time operations never return errors:
//! stale hosts surface as `None` or `is_valid() == false`, and missing
//! textures just skip drawing.

use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Debug, Error)]
pub enum TextureError {
    /// Failed to decode the image.
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    /// Failed to read the file from disk.
    #[error("Failed to read texture file: {0}")]
    Io(#[from] std::io::Error),
    /// Raw pixel data does not match the stated size.
    #[error("RGBA data size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// `width * height * 4`.
        expected: usize,
        /// Length of the data handed in.
        actual: usize,
    },
}

/// Errors that can occur when reading effect settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings text is not valid TOML for [`FxSettings`](crate::config::FxSettings).
    #[error("Failed to parse effect settings: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to read the settings file.
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}
