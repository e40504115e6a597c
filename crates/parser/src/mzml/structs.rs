use std::{collections::BTreeMap, fmt};

use indexmap::IndexMap;
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};

use crate::{
    error::{RipError, ScanError},
    mzml::document::Element,
};

/// Fragmentation order of a scan. Only MS1 through MS4 are ripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MsLevel {
    Ms1,
    Ms2,
    Ms3,
    Ms4,
}

impl MsLevel {
    pub const ALL: [MsLevel; 4] = [MsLevel::Ms1, MsLevel::Ms2, MsLevel::Ms3, MsLevel::Ms4];

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(MsLevel::Ms1),
            2 => Some(MsLevel::Ms2),
            3 => Some(MsLevel::Ms3),
            4 => Some(MsLevel::Ms4),
            _ => None,
        }
    }

    /// Parses the `value` of an MS-level parameter.
    pub fn from_value(raw: &str) -> Result<Self, ScanError> {
        raw.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::from_number)
            .ok_or_else(|| ScanError::UnsupportedMsLevel(raw.to_string()))
    }

    pub fn number(self) -> u8 {
        match self {
            MsLevel::Ms1 => 1,
            MsLevel::Ms2 => 2,
            MsLevel::Ms3 => 3,
            MsLevel::Ms4 => 4,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            MsLevel::Ms1 => "ms1",
            MsLevel::Ms2 => "ms2",
            MsLevel::Ms3 => "ms3",
            MsLevel::Ms4 => "ms4",
        }
    }
}

impl fmt::Display for MsLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MS{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayRole {
    Mz,
    Intensity,
}

impl fmt::Display for ArrayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArrayRole::Mz => "m/z",
            ArrayRole::Intensity => "intensity",
        })
    }
}

/// A still-encoded binary array, borrowed from the document.
#[derive(Debug, Clone)]
pub struct EncodedArray<'a> {
    pub role: ArrayRole,
    /// Parameters of the array element, group references resolved.
    pub params: Vec<&'a Element>,
    pub payload: &'a str,
    pub declared_length: Option<usize>,
}

/// One located spectrum, ready for decoding.
#[derive(Debug, Clone)]
pub struct ScanElement<'a> {
    pub id: Option<String>,
    /// Position among all scan candidates in document order.
    pub index: usize,
    pub scan_number: Option<u64>,
    pub ms_level: MsLevel,
    pub retention_time: String,
    pub parent_mass: Option<String>,
    pub parent_scan: Option<u64>,
    pub default_array_length: Option<usize>,
    pub mass_array: Option<EncodedArray<'a>>,
    pub intensity_array: Option<EncodedArray<'a>>,
}

/// A scan candidate that produced no record.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedScan {
    pub id: Option<String>,
    pub index: usize,
    pub reason: ScanError,
}

impl fmt::Display for SkippedScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "scan #{} ({id}): {}", self.index, self.reason),
            None => write!(f, "scan #{}: {}", self.index, self.reason),
        }
    }
}

/// Decoded peaks in source order. Both arrays always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakList {
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl PeakList {
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Result<Self, ScanError> {
        if mz.len() != intensity.len() {
            return Err(ScanError::LengthMismatch {
                mz: mz.len(),
                intensity: intensity.len(),
            });
        }
        Ok(PeakList { mz, intensity })
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn mz(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    /// Keeps only the peaks whose intensity passes `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(f64) -> bool) {
        let (mz, intensity) = self
            .mz
            .iter()
            .zip(&self.intensity)
            .filter(|&(_, &i)| keep(i))
            .map(|(&m, &i)| (m, i))
            .unzip();
        self.mz = mz;
        self.intensity = intensity;
    }
}

/// Intensity as written to JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intensity {
    Integral(i64),
    Float(f64),
}

impl Intensity {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    /// Whole numbers become integers so `50.0` is written as `50`.
    pub fn absolute(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= Self::MAX_EXACT {
            Intensity::Integral(value as i64)
        } else {
            Intensity::Float(value)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Intensity::Integral(v) => v as f64,
            Intensity::Float(v) => v,
        }
    }
}

impl Serialize for Intensity {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match *self {
            Intensity::Integral(v) => s.serialize_i64(v),
            Intensity::Float(v) => s.serialize_f64(v),
        }
    }
}

/// The per-spectrum output unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumRecord {
    /// Four-decimal mass key to intensity. Re-inserting a key overwrites the value in place.
    pub peaks: IndexMap<String, Intensity>,
    pub parent: String,
    pub retention_time: String,
    pub mass_list: Vec<f64>,
    pub base_peak: Option<(f64, Intensity)>,
    pub splash: Option<String>,
}

struct BasePeak<'a>(&'a (f64, Intensity));

impl Serialize for BasePeak<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(2))?;
        seq.serialize_element(&self.0.0)?;
        seq.serialize_element(&self.0.1)?;
        seq.end()
    }
}

impl Serialize for SpectrumRecord {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let extra = 3 + self.base_peak.is_some() as usize + self.splash.is_some() as usize;
        let mut map = s.serialize_map(Some(self.peaks.len() + extra))?;
        for (mass, intensity) in &self.peaks {
            map.serialize_entry(mass, intensity)?;
        }
        map.serialize_entry("parent", &self.parent)?;
        if let Some(bp) = &self.base_peak {
            map.serialize_entry("base_peak", &BasePeak(bp))?;
        }
        map.serialize_entry("retention_time", &self.retention_time)?;
        map.serialize_entry("mass_list", &self.mass_list)?;
        if let Some(splash) = &self.splash {
            map.serialize_entry("splash", splash)?;
        }
        map.end()
    }
}

/// Records of one file, grouped by MS level in encounter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedResult {
    levels: BTreeMap<MsLevel, Vec<SpectrumRecord>>,
}

impl GroupedResult {
    pub(crate) fn from_levels(levels: BTreeMap<MsLevel, Vec<SpectrumRecord>>) -> Self {
        GroupedResult { levels }
    }

    /// Records of `level`; empty when the level is absent.
    pub fn level(&self, level: MsLevel) -> &[SpectrumRecord] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_level(&self, level: MsLevel) -> bool {
        self.levels.contains_key(&level)
    }

    /// Levels present in the output, including emitted empty ones.
    pub fn levels(&self) -> impl Iterator<Item = (MsLevel, &[SpectrumRecord])> {
        self.levels.iter().map(|(l, r)| (*l, r.as_slice()))
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut SpectrumRecord> {
        self.levels.values_mut().flatten()
    }

    pub fn record_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    /// Four-space indented JSON, stable across runs.
    pub fn to_json_pretty(&self) -> Result<String, RipError> {
        let mut out = Vec::with_capacity(4096);
        self.write_json_pretty(&mut out)?;
        String::from_utf8(out)
            .map_err(|e| RipError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    pub fn write_json_pretty<W: std::io::Write>(&self, writer: W) -> Result<(), RipError> {
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(writer, fmt);
        self.serialize(&mut ser)?;
        Ok(())
    }
}

struct NumberedSpectra<'a>(&'a [SpectrumRecord]);

impl Serialize for NumberedSpectra<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (i, record) in self.0.iter().enumerate() {
            map.serialize_entry(&format!("spectrum_{}", i + 1), record)?;
        }
        map.end()
    }
}

impl Serialize for GroupedResult {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.levels.len()))?;
        for (level, records) in &self.levels {
            map.serialize_entry(level.key(), &NumberedSpectra(records))?;
        }
        map.end()
    }
}
