use std::{fs, path::Path};

use log::{debug, info, warn};

use crate::{
    config::RipperConfig,
    error::RipError,
    mzml::{
        cv_table::{CV_TABLE, CvTable},
        document::Document,
        locate::ScanLocator,
        structs::{GroupedResult, SkippedScan},
    },
    utilities::{assemble::assemble_record, decode::decode_peaks, group::GroupBuilder},
};

/// Output of one file: the grouped records plus every scan that was dropped.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub result: GroupedResult,
    pub skipped: Vec<SkippedScan>,
}

pub fn rip_mzml(bytes: &[u8], config: &RipperConfig) -> Result<Extraction, RipError> {
    rip_mzml_with_table(bytes, config, &CV_TABLE)
}

pub fn rip_mzml_with_table(
    bytes: &[u8],
    config: &RipperConfig,
    table: &CvTable,
) -> Result<Extraction, RipError> {
    let doc = Document::parse(bytes)?;
    Ok(rip_document(&doc, config, table))
}

pub fn rip_path(
    path: impl AsRef<Path>,
    config: &RipperConfig,
    table: &CvTable,
) -> Result<Extraction, RipError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    info!("ripping {}", path.display());
    rip_mzml_with_table(&bytes, config, table)
}

/// Locate, decode, assemble and group every scan of a loaded document.
///
/// Scan failures never abort the document; they end up in `skipped`.
pub fn rip_document(doc: &Document, config: &RipperConfig, table: &CvTable) -> Extraction {
    let mut groups = GroupBuilder::new(config.empty_levels);
    let mut skipped = Vec::new();

    for located in ScanLocator::new(doc, table).locate() {
        let scan = match located {
            Ok(scan) => scan,
            Err(skip) => {
                warn!("skipping {skip}");
                skipped.push(skip);
                continue;
            }
        };

        match decode_peaks(&scan, table) {
            Ok(peaks) => {
                let record = assemble_record(&scan, peaks, config);
                groups.push(scan.ms_level, record);
                debug!(
                    "{} scan #{} stored as spectrum_{}",
                    scan.ms_level,
                    scan.index,
                    groups.count(scan.ms_level)
                );
            }
            Err(reason) => {
                let skip = SkippedScan {
                    id: scan.id,
                    index: scan.index,
                    reason,
                };
                warn!("skipping {skip}");
                skipped.push(skip);
            }
        }
    }

    let result = groups.build();
    info!(
        "{} spectra kept, {} skipped",
        result.record_count(),
        skipped.len()
    );
    Extraction { result, skipped }
}
