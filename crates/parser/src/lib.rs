pub mod config;
pub mod error;
pub mod hashing;
pub mod mzml;
pub mod utilities;

pub use config::{EmptyLevels, IntensityMode, RipperConfig, RtUnits};
pub use error::{RipError, ScanError};
pub use mzml::{
    cv_table::{CV_TABLE, CvRole, CvTable},
    document::{Document, Element},
    structs::*,
};
pub use utilities::parse_mzml::{Extraction, rip_document, rip_mzml, rip_mzml_with_table, rip_path};
