use indexmap::IndexMap;

use crate::{
    config::{IntensityMode, RipperConfig, RtUnits},
    mzml::structs::{Intensity, MsLevel, PeakList, ScanElement, SpectrumRecord},
};

const RELATIVE_SCALE: f64 = 1e4;

/// Fixed four-decimal mapping key for a mass.
#[inline]
pub fn mass_key(mz: f64) -> String {
    format!("{mz:.4}")
}

#[inline]
fn round4(v: f64) -> f64 {
    (v * RELATIVE_SCALE).round() / RELATIVE_SCALE
}

/// Index of the most intense peak. Ties go to the earliest peak.
pub fn base_peak_index(intensities: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in intensities.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Retention time as written to the record. Values that do not parse as a
/// number are kept as they are.
pub fn retention_time(raw: &str, units: RtUnits) -> String {
    match units {
        RtUnits::AsRecorded => raw.to_string(),
        RtUnits::Seconds => match raw.trim().parse::<f64>() {
            Ok(seconds) => {
                let minutes = seconds / 60.0;
                if minutes.is_finite() && minutes.fract() == 0.0 {
                    format!("{minutes:.1}")
                } else {
                    minutes.to_string()
                }
            }
            Err(_) => raw.to_string(),
        },
    }
}

/// Drops peaks at or below the cut-off. MSn scans use 5% of the MS1 value.
pub fn apply_threshold(peaks: &mut PeakList, level: MsLevel, threshold: f64) {
    let cutoff = match level {
        MsLevel::Ms1 => threshold,
        _ => threshold / 100.0 * 5.0,
    };
    peaks.retain(|i| i > cutoff);
}

pub fn assemble_record(
    scan: &ScanElement<'_>,
    mut peaks: PeakList,
    config: &RipperConfig,
) -> SpectrumRecord {
    if let Some(threshold) = config.intensity_threshold {
        apply_threshold(&mut peaks, scan.ms_level, threshold);
    }

    let mut record = SpectrumRecord {
        peaks: IndexMap::with_capacity(peaks.len()),
        parent: scan.parent_mass.clone().unwrap_or_default(),
        retention_time: retention_time(&scan.retention_time, config.rt_units),
        mass_list: peaks.mz().to_vec(),
        base_peak: None,
        splash: None,
    };

    match config.intensity_mode {
        IntensityMode::Absolute => {
            for (mz, i) in peaks.iter() {
                record.peaks.insert(mass_key(mz), Intensity::absolute(i));
            }
        }
        IntensityMode::Relative => {
            let Some(base) = base_peak_index(peaks.intensity()) else {
                return record;
            };
            let max = peaks.intensity()[base];
            for (idx, (mz, i)) in peaks.iter().enumerate() {
                let value = if idx == base {
                    Intensity::Integral(100)
                } else if max > 0.0 {
                    Intensity::Float(round4(i / max * 100.0))
                } else {
                    Intensity::Float(0.0)
                };
                record.peaks.insert(mass_key(mz), value);
            }
            record.base_peak = Some((peaks.mz()[base], Intensity::absolute(max)));
        }
    }

    record
}
