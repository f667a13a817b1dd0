//! Error types for pesgen.

use thiserror::Error;

/// Result type alias using pesgen's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for PES generation.
#[derive(Error, Debug)]
pub enum Error {
    /// The stream's codec cannot be muxed into an MPEG-2 TS by this crate.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(&'static str),

    /// The codec configuration record in `extra_data` is malformed.
    #[error("malformed codec configuration: {0}")]
    MalformedConfig(&'static str),

    /// Key or IV material has the wrong size for AES-128-CBC.
    #[error("invalid key material: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial {
        /// Required length in bytes.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A sample could not be converted to its TS elementary-stream form.
    #[error("sample conversion failed: {0}")]
    Conversion(&'static str),

    /// An operation was called in the wrong generator state.
    #[error("invalid generator state: {0}")]
    InvalidState(&'static str),
}
