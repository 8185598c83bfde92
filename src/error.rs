//! Error types shared by the solarnet utilities.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied parameter is outside its valid domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Nothing matched a lookup (e.g. no checkpoint for a pattern)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A checkpoint filename does not follow `<type>[_<qualifier>]_<...>-<metric>`
    #[error("Malformed checkpoint name '{name}': {reason}")]
    MalformedName { name: String, reason: String },

    #[error("Unknown model type '{0}'")]
    UnrecognizedModelType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded, saved or validated
    #[error("Settings error: {0}")]
    Settings(String),

    /// The global logger could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image error: {0}")]
    Image(String),
}

impl Error {
    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        Error::MalformedName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::malformed("segmenter", "expected 2 or 3 fields, found 1");
        assert_eq!(
            err.to_string(),
            "Malformed checkpoint name 'segmenter': expected 2 or 3 fields, found 1"
        );
        assert_eq!(
            Error::UnrecognizedModelType("unknown".into()).to_string(),
            "Unknown model type 'unknown'"
        );
        assert_eq!(
            Error::Logging("a global default trace dispatcher has already been set".into())
                .to_string(),
            "Logging error: a global default trace dispatcher has already been set"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
