//! Error types for the cutout-pipeline crate.

use crate::engine::RunState;

/// Errors that can occur while preparing images and compositing cutouts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bytes that should contain a raster image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// A computed pixel buffer could not be serialized to its target format.
    ///
    /// The resize stage absorbs this and falls back to the unscaled source;
    /// in the post-processing stage it is terminal.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The external background removal model failed.
    ///
    /// The display message stays generic; the model's failure detail is only
    /// reachable through [`std::error::Error::source`].
    #[error("background removal failed")]
    Removal(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A run stopped without producing either a final image or an error.
    #[error("pipeline stopped in state `{state}` without a final image")]
    Incomplete {
        /// State the run was in when it stopped.
        state: RunState,
    },
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let incomplete = Error::Incomplete {
            state: RunState::Removing,
        };
        assert!(incomplete.to_string().contains("removing"));
    }

    #[test]
    fn removal_display_stays_generic() {
        let inner = std::io::Error::other("model weights missing");
        let err = Error::Removal(Box::new(inner));

        assert_eq!(err.to_string(), "background removal failed");

        let source = std::error::Error::source(&err).expect("source preserved");
        assert!(source.to_string().contains("model weights missing"));
    }
}
