use std::collections::BTreeMap;

use crate::{
    config::EmptyLevels,
    mzml::structs::{GroupedResult, MsLevel, SpectrumRecord},
};

/// Collects records per MS level in the order they arrive.
#[derive(Debug, Default)]
pub struct GroupBuilder {
    empty_levels: EmptyLevels,
    levels: BTreeMap<MsLevel, Vec<SpectrumRecord>>,
}

impl GroupBuilder {
    pub fn new(empty_levels: EmptyLevels) -> Self {
        GroupBuilder {
            empty_levels,
            levels: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, level: MsLevel, record: SpectrumRecord) {
        self.levels.entry(level).or_default().push(record);
    }

    /// Records accepted so far for `level`.
    pub fn count(&self, level: MsLevel) -> usize {
        self.levels.get(&level).map_or(0, Vec::len)
    }

    pub fn build(mut self) -> GroupedResult {
        if self.empty_levels == EmptyLevels::Emit {
            for level in MsLevel::ALL {
                self.levels.entry(level).or_default();
            }
        }
        GroupedResult::from_levels(self.levels)
    }
}
