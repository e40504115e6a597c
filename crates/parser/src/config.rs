use serde::{Deserialize, Serialize};

/// How peak intensities are written into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityMode {
    #[default]
    Absolute,
    /// Percent of the base peak, which is pinned to exactly 100.
    Relative,
}

/// Whether MS levels without any record still show up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyLevels {
    /// Always write `ms1`..`ms4`, empty or not.
    #[default]
    Emit,
    Omit,
}

/// Unit the source writes scan start times in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtUnits {
    /// Keep the value string exactly as written.
    #[default]
    AsRecorded,
    /// Seconds in the file, written out as minutes.
    Seconds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RipperConfig {
    pub intensity_mode: IntensityMode,
    pub empty_levels: EmptyLevels,
    /// MS1 peaks must exceed this value, MSn peaks must exceed 5% of it.
    pub intensity_threshold: Option<f64>,
    pub rt_units: RtUnits,
}

impl RipperConfig {
    pub fn relative() -> Self {
        Self {
            intensity_mode: IntensityMode::Relative,
            ..Default::default()
        }
    }

    pub fn is_relative(&self) -> bool {
        self.intensity_mode == IntensityMode::Relative
    }
}
