use base64::{Engine as _, engine::general_purpose::STANDARD};
use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::{
    error::ScanError,
    mzml::{
        cv_table::{CvRole, CvTable},
        document::Element,
        structs::{ArrayRole, EncodedArray, PeakList, ScanElement},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    F32,
    F64,
}

impl Precision {
    #[inline]
    pub fn width(self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Zlib,
}

/// How one binary array is packed, as declared by its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayEncoding {
    pub precision: Precision,
    pub compression: Compression,
}

impl ArrayEncoding {
    pub fn new(precision: Precision, compression: Compression) -> Self {
        ArrayEncoding {
            precision,
            compression,
        }
    }

    /// Resolves precision and compression from accession roles.
    ///
    /// A missing compression parameter means the payload is stored as is.
    /// Integer widths, numpress and contradicting declarations are refused.
    pub fn from_params(params: &[&Element], table: &CvTable) -> Result<Self, ScanError> {
        let mut precision: Option<Precision> = None;
        let mut compression: Option<Compression> = None;

        for param in params {
            let Some(role) = table.role_of(param) else {
                continue;
            };
            if role.is_precision() {
                let found = match role {
                    CvRole::Float32 => Precision::F32,
                    CvRole::Float64 => Precision::F64,
                    other => {
                        return Err(ScanError::UnsupportedEncoding(format!(
                            "{other:?} values"
                        )));
                    }
                };
                match precision {
                    Some(p) if p != found => {
                        return Err(ScanError::UnsupportedEncoding(
                            "both 32-bit and 64-bit float declared".to_string(),
                        ));
                    }
                    _ => precision = Some(found),
                }
            } else if role.is_compression() {
                let found = match role {
                    CvRole::NoCompression => Compression::None,
                    CvRole::Zlib => Compression::Zlib,
                    other => {
                        return Err(ScanError::UnsupportedEncoding(format!(
                            "{other:?} compression"
                        )));
                    }
                };
                match compression {
                    Some(c) if c != found => {
                        return Err(ScanError::UnsupportedEncoding(
                            "conflicting compression declarations".to_string(),
                        ));
                    }
                    _ => compression = Some(found),
                }
            }
        }

        let precision = precision.ok_or_else(|| {
            ScanError::UnsupportedEncoding("no numeric precision declared".to_string())
        })?;
        Ok(ArrayEncoding::new(precision, compression.unwrap_or_default()))
    }
}

/// base64 -> optional zlib -> little-endian floats.
pub fn decode_binary(payload: &str, encoding: ArrayEncoding) -> Result<Vec<f64>, ScanError> {
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    let mut bytes = Vec::with_capacity(compact.len().saturating_mul(3) / 4 + 8);
    STANDARD
        .decode_vec(&compact, &mut bytes)
        .map_err(|e| ScanError::Base64(e.to_string()))?;

    if encoding.compression == Compression::Zlib {
        bytes = decompress_zlib_allow_pad0(&bytes)?;
    }

    let width = encoding.precision.width();
    if bytes.len() % width != 0 {
        return Err(ScanError::TruncatedPayload {
            len: bytes.len(),
            width,
        });
    }

    Ok(match encoding.precision {
        Precision::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        Precision::F64 => bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
    })
}

/// Some writers pad the compressed stream with trailing zero bytes.
#[inline]
fn decompress_zlib_allow_pad0(input: &[u8]) -> Result<Vec<u8>, ScanError> {
    let first_err = match decompress_to_vec_zlib(input) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    let mut end = input.len();
    for _ in 0..7 {
        if end == 0 || input[end - 1] != 0 {
            break;
        }
        end -= 1;
        if let Ok(v) = decompress_to_vec_zlib(&input[..end]) {
            return Ok(v);
        }
    }
    Err(ScanError::Decompress(format!("{:?}", first_err.status)))
}

pub fn decode_array(array: &EncodedArray<'_>, table: &CvTable) -> Result<Vec<f64>, ScanError> {
    let encoding = ArrayEncoding::from_params(&array.params, table)?;
    decode_binary(array.payload, encoding)
}

fn check_declared(array: &EncodedArray<'_>, decoded: usize) -> Result<(), ScanError> {
    match array.declared_length {
        Some(declared) if declared != decoded => Err(ScanError::DeclaredLength {
            role: array.role,
            declared,
            decoded,
        }),
        _ => Ok(()),
    }
}

/// Decodes both arrays of a located scan into one peak list.
pub fn decode_peaks(scan: &ScanElement<'_>, table: &CvTable) -> Result<PeakList, ScanError> {
    let (mass, intensity) = match (&scan.mass_array, &scan.intensity_array) {
        (Some(m), Some(i)) => (m, i),
        (None, None) if scan.default_array_length == Some(0) => return Ok(PeakList::default()),
        (None, _) => return Err(ScanError::MissingArray(ArrayRole::Mz)),
        (_, None) => return Err(ScanError::MissingArray(ArrayRole::Intensity)),
    };

    let mz = decode_array(mass, table)?;
    let ints = decode_array(intensity, table)?;
    if mz.len() != ints.len() {
        return Err(ScanError::LengthMismatch {
            mz: mz.len(),
            intensity: ints.len(),
        });
    }
    check_declared(mass, mz.len())?;
    check_declared(intensity, ints.len())?;

    PeakList::new(mz, ints)
}
