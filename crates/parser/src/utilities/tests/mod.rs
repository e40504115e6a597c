
use crate::mzml::structs::{MsLevel, ScanElement};

pub(crate) fn bare_scan<'a>(ms_level: MsLevel) -> ScanElement<'a> {
    ScanElement {
        id: Some("scan=1".to_string()),
        index: 0,
        scan_number: Some(1),
        ms_level,
        retention_time: "1.25".to_string(),
        parent_mass: None,
        parent_scan: None,
        default_array_length: None,
        mass_array: None,
        intensity_array: None,
    }
}
