use base64::{Engine as _, engine::general_purpose::STANDARD};
use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::utilities::decode::{ArrayEncoding, Compression, Precision};

const ZLIB_LEVEL: u8 = 6;

/// Packs values the way mzML stores a `<binary>` payload.
pub fn encode_array(values: &[f64], encoding: ArrayEncoding) -> String {
    let mut raw = Vec::with_capacity(values.len() * encoding.precision.width());
    match encoding.precision {
        Precision::F32 => {
            for v in values {
                raw.extend_from_slice(&(*v as f32).to_le_bytes());
            }
        }
        Precision::F64 => {
            for v in values {
                raw.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    let bytes = match encoding.compression {
        Compression::None => raw,
        Compression::Zlib => compress_to_vec_zlib(&raw, ZLIB_LEVEL),
    };
    STANDARD.encode(bytes)
}
