//! Error types for folio operations.

use thiserror::Error;

/// Errors raised while reading a container or assembling a publication.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Entry not found in container: {0}")]
    NotFound(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Malformed SMIL: {0}")]
    MalformedSync(String),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the resource transform pipeline.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The resource is marked encrypted but no registered transformer claims it.
    #[error("no transformer supports encrypted resource {href} ({algorithm})")]
    Unsupported { href: String, algorithm: String },

    #[error("decryption failed for {href}: {reason}")]
    DecryptionFailed { href: String, reason: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while hydrating a media overlay.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("SMIL document not found: {0}")]
    NotFound(String),

    #[error("cannot decode encrypted SMIL document: {0}")]
    DecryptionUnsupported(#[source] TransformError),

    #[error("Malformed SMIL: {0}")]
    MalformedSync(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl From<Error> for OverlayError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(path) => OverlayError::NotFound(path),
            Error::Io(e) => OverlayError::Io(e),
            Error::Xml(e) => OverlayError::Xml(e),
            Error::MalformedSync(msg) => OverlayError::MalformedSync(msg),
            Error::Zip(e) => OverlayError::Io(std::io::Error::other(e)),
            Error::InvalidPackage(msg) => OverlayError::MalformedSync(msg),
            Error::Transform(e) => OverlayError::DecryptionUnsupported(e),
        }
    }
}
