use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::{error::RipError, mzml::document::Element};

static RAW_JSON: &str = include_str!("cv_table.json");

/// The bundled accession table, parsed once on first use.
pub static CV_TABLE: Lazy<CvTable> =
    Lazy::new(|| CvTable::from_json(RAW_JSON).expect("bundled cv_table.json is valid"));

/// What a controlled-vocabulary accession means to the ripper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvRole {
    MsLevel,
    ScanStartTime,
    SpectrumTitle,
    FilterString,
    SelectedIonMz,
    MzArray,
    IntensityArray,
    Float32,
    Float64,
    Int32,
    Int64,
    NoCompression,
    Zlib,
    NumpressLinear,
    NumpressPic,
    NumpressSlof,
}

impl CvRole {
    pub fn is_precision(self) -> bool {
        matches!(
            self,
            CvRole::Float32 | CvRole::Float64 | CvRole::Int32 | CvRole::Int64
        )
    }

    pub fn is_compression(self) -> bool {
        matches!(
            self,
            CvRole::NoCompression
                | CvRole::Zlib
                | CvRole::NumpressLinear
                | CvRole::NumpressPic
                | CvRole::NumpressSlof
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    roles: BTreeMap<String, CvRole>,
    #[serde(default)]
    scan_containers: Vec<String>,
    #[serde(default)]
    payload_elements: Vec<String>,
    #[serde(default)]
    precursor_elements: Vec<String>,
    #[serde(default)]
    banned_elements: Vec<String>,
    #[serde(default)]
    banned_phrases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CvTable {
    roles: HashMap<String, CvRole>,
    scan_containers: HashSet<String>,
    payload_elements: HashSet<String>,
    precursor_elements: HashSet<String>,
    banned_elements: HashSet<String>,
    banned_phrases: Vec<String>,
}

impl CvTable {
    pub fn from_json(raw: &str) -> Result<Self, RipError> {
        let raw: RawTable = serde_json::from_str(raw)?;

        for required in [CvRole::MsLevel, CvRole::MzArray, CvRole::IntensityArray] {
            if !raw.roles.values().any(|r| *r == required) {
                return Err(RipError::InvalidCvTable(format!(
                    "no accession mapped to {required:?}"
                )));
            }
        }
        if raw.payload_elements.is_empty() {
            return Err(RipError::InvalidCvTable(
                "payload_elements must not be empty".to_string(),
            ));
        }

        Ok(CvTable {
            roles: raw.roles.into_iter().collect(),
            scan_containers: raw.scan_containers.into_iter().collect(),
            payload_elements: raw.payload_elements.into_iter().collect(),
            precursor_elements: raw.precursor_elements.into_iter().collect(),
            banned_elements: raw.banned_elements.into_iter().collect(),
            banned_phrases: raw
                .banned_phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        })
    }

    pub fn role(&self, accession: &str) -> Option<CvRole> {
        self.roles.get(accession).copied()
    }

    /// Role of a parameter element, unless its name hits the deny-list.
    pub fn role_of(&self, param: &Element) -> Option<CvRole> {
        if self.is_banned_param(param) {
            return None;
        }
        param.accession().and_then(|acc| self.role(acc))
    }

    pub fn is_banned_param(&self, param: &Element) -> bool {
        let Some(name) = param.attr("name") else {
            return false;
        };
        let name = name.to_lowercase();
        self.banned_phrases.iter().any(|p| name.contains(p.as_str()))
    }

    pub fn is_banned_element(&self, el: &Element) -> bool {
        self.banned_elements.contains(el.name())
    }

    pub fn is_scan_container(&self, el: &Element) -> bool {
        self.scan_containers.contains(el.name())
    }

    pub fn is_payload(&self, el: &Element) -> bool {
        self.payload_elements.contains(el.name())
    }

    /// Element holding the selected ion and the `spectrumRef` of an MSn scan.
    pub fn is_precursor(&self, el: &Element) -> bool {
        self.precursor_elements.contains(el.name())
    }
}
