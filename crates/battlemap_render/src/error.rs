use thiserror::Error;

/// Errors raised while loading tile imagery.
///
/// These never reach the user: the image cache substitutes a transparent
/// placeholder and logs a warning.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to read image '{src}': {source}")]
    Io {
        src: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image '{src}': {source}")]
    Decode {
        src: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Image '{0}' not found")]
    NotFound(String),
}
