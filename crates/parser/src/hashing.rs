//! SPLASH keys (SPectraL hASH) for ripped spectra.
//!
//! Nothing in the ripping pipeline depends on this module. Callers run
//! [`hash_spectra`] on a finished [`GroupedResult`] when they want a
//! `splash` field on every record. The key has four dash-separated blocks:
//!
//! ```text
//! splash10-0udi-0290000000-67b9bc1833fa042e580e
//! ^^^^^^^^ ^^^^ ^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^
//! type+ver top  similarity  sha256 of the peaks
//! ```

use sha2::{Digest, Sha256};

use crate::{
    error::RipError,
    mzml::structs::{GroupedResult, SpectrumRecord},
    utilities::assemble::mass_key,
};

/// A (m/z, intensity) pair as handed to a hasher.
pub type Ion = (f64, f64);

pub trait SpectralHasher {
    fn name(&self) -> &str;

    fn hash(&self, ions: &[Ion]) -> Result<String, RipError>;
}

const BASE_36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const EPS: f64 = 1.0e-7;
const RELATIVE_INTENSITY_SCALE: f64 = 100.0;

const PREFILTER_BASE: u32 = 3;
const PREFILTER_LENGTH: usize = 10;
const PREFILTER_BIN_SIZE: f64 = 5.0;
const PREFILTER_TOP_IONS: usize = 10;
const PREFILTER_BASE_PEAK_FRACTION: f64 = 0.1;
const PREFILTER_WIDTH: usize = 4;

const SIMILARITY_BASE: u32 = 10;
const SIMILARITY_LENGTH: usize = 10;
const SIMILARITY_BIN_SIZE: f64 = 100.0;

const MZ_PRECISION_FACTOR: f64 = 1.0e6;
const HASH_CHARS: usize = 20;

/// Version 0 SPLASH for MS spectra.
#[derive(Debug, Clone, Copy, Default)]
pub struct Splash;

impl Splash {
    pub const PREFIX: &'static str = "splash10";

    /// Scales the ions so the most intense one sits at 100.
    fn normalize(ions: &[Ion]) -> Result<Vec<Ion>, RipError> {
        let max = ions.iter().map(|&(_, i)| i).fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() || max <= 0.0 {
            return Err(RipError::Hash(
                "spectrum needs at least one positive intensity".to_string(),
            ));
        }
        Ok(ions
            .iter()
            .map(|&(mz, i)| (mz, i / max * RELATIVE_INTENSITY_SCALE))
            .collect())
    }

    /// Wrapping histogram of summed intensity, one base-36 digit per bin.
    fn histogram(ions: &[Ion], base: u32, length: usize, bin_size: f64) -> String {
        let mut bins = vec![0.0f64; length];
        for &(mz, i) in ions {
            bins[(mz / bin_size) as usize % length] += i;
        }
        let max = bins.iter().copied().fold(0.0, f64::max);
        bins.iter()
            .map(|&v| {
                let digit = if max > 0.0 {
                    (EPS + f64::from(base - 1) * v / max) as usize
                } else {
                    0
                };
                char::from(BASE_36[digit.min(base as usize - 1)])
            })
            .collect()
    }

    /// Ions within 10% of the base peak, at most the ten most intense.
    fn top_ions(ions: &[Ion]) -> Vec<Ion> {
        let base_peak = ions.iter().map(|&(_, i)| i).fold(0.0, f64::max);
        let mut kept: Vec<Ion> = ions
            .iter()
            .copied()
            .filter(|&(_, i)| i + EPS >= PREFILTER_BASE_PEAK_FRACTION * base_peak)
            .collect();
        if kept.len() > PREFILTER_TOP_IONS {
            kept.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.total_cmp(&b.0)));
            kept.truncate(PREFILTER_TOP_IONS);
        }
        kept
    }

    fn translate_base(digits: &str, from: u32, width: usize) -> String {
        let mut n = digits
            .chars()
            .filter_map(|c| c.to_digit(from))
            .fold(0u64, |acc, d| acc * u64::from(from) + u64::from(d));
        let mut out = Vec::with_capacity(width);
        while n > 0 {
            out.push(BASE_36[(n % 36) as usize]);
            n /= 36;
        }
        while out.len() < width {
            out.push(b'0');
        }
        out.iter().rev().map(|&b| char::from(b)).collect()
    }

    fn digest(ions: &[Ion]) -> String {
        let mut sorted = ions.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(b.1.total_cmp(&a.1)));
        let canonical = sorted
            .iter()
            .map(|&(mz, i)| {
                format!(
                    "{}:{}",
                    ((mz + EPS) * MZ_PRECISION_FACTOR) as i64,
                    (i + EPS) as i64
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let mut hex = base16ct::lower::encode_string(&Sha256::digest(canonical.as_bytes()));
        hex.truncate(HASH_CHARS);
        hex
    }
}

impl SpectralHasher for Splash {
    fn name(&self) -> &str {
        "splash"
    }

    fn hash(&self, ions: &[Ion]) -> Result<String, RipError> {
        let ions = Self::normalize(ions)?;
        let top = Self::histogram(
            &Self::top_ions(&ions),
            PREFILTER_BASE,
            PREFILTER_LENGTH,
            PREFILTER_BIN_SIZE,
        );
        Ok(format!(
            "{}-{}-{}-{}",
            Self::PREFIX,
            Self::translate_base(&top, PREFILTER_BASE, PREFILTER_WIDTH),
            Self::histogram(&ions, SIMILARITY_BASE, SIMILARITY_LENGTH, SIMILARITY_BIN_SIZE),
            Self::digest(&ions)
        ))
    }
}

/// Ions of a record, one per `mass_list` entry, valued from the mapping.
pub fn record_ions(record: &SpectrumRecord) -> Vec<Ion> {
    record
        .mass_list
        .iter()
        .filter_map(|&mz| {
            record
                .peaks
                .get(&mass_key(mz))
                .map(|intensity| (mz, intensity.as_f64()))
        })
        .collect()
}

/// Fills `splash` on every record that has a positive peak. Records with
/// nothing to hash keep no key.
pub fn hash_spectra<H: SpectralHasher + ?Sized>(
    mut result: GroupedResult,
    hasher: &H,
) -> Result<GroupedResult, RipError> {
    for record in result.records_mut() {
        let ions = record_ions(record);
        if !ions.iter().any(|&(_, i)| i > 0.0) {
            continue;
        }
        record.splash = Some(hasher.hash(&ions)?);
    }
    Ok(result)
}
