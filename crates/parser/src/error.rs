use thiserror::Error;

use crate::mzml::structs::ArrayRole;

/// File-level failures. Any of these aborts the file being ripped.
#[derive(Debug, Error)]
pub enum RipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CV table: {0}")]
    InvalidCvTable(String),

    #[error("spectral hashing failed: {0}")]
    Hash(String),
}

impl From<quick_xml::Error> for RipError {
    fn from(e: quick_xml::Error) -> Self {
        RipError::MalformedDocument(e.to_string())
    }
}

/// Scan-level failures. The scan is dropped; the rest of the file is still processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error("no MS level accession")]
    MissingMsLevel,

    #[error("MS level {0:?} is outside 1..=4")]
    UnsupportedMsLevel(String),

    #[error("missing {0} array")]
    MissingArray(ArrayRole),

    #[error("array length mismatch: {mz} m/z values vs {intensity} intensities")]
    LengthMismatch { mz: usize, intensity: usize },

    #[error("{role} array declares {declared} values but decoded {decoded}")]
    DeclaredLength {
        role: ArrayRole,
        declared: usize,
        decoded: usize,
    },

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("base64 decode failed: {0}")]
    Base64(String),

    #[error("zlib decompress failed: {0}")]
    Decompress(String),

    #[error("payload of {len} bytes is not a whole number of {width}-byte values")]
    TruncatedPayload { len: usize, width: usize },
}
