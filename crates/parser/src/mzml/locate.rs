use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::ScanError,
    mzml::{
        cv_table::{CvRole, CvTable},
        document::{Document, Element},
        structs::{ArrayRole, EncodedArray, MsLevel, ScanElement, SkippedScan},
    },
};

static SCAN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"scan=([0-9]+)").expect("scan number regex compiles"));

/// Finds spectra in a loaded document by accession, never by tag text.
pub struct ScanLocator<'d> {
    doc: &'d Document,
    table: &'d CvTable,
}

impl<'d> ScanLocator<'d> {
    pub fn new(doc: &'d Document, table: &'d CvTable) -> Self {
        ScanLocator { doc, table }
    }

    /// Scan candidates in document order.
    ///
    /// An element is a candidate when it is a scan container or carries an
    /// MS-level parameter. Banned elements are pruned with their subtree and
    /// the walk never descends into a candidate.
    pub fn candidates(&self) -> Vec<&'d Element> {
        let mut out = Vec::new();
        let mut stack = vec![self.doc.root()];
        while let Some(el) = stack.pop() {
            if self.table.is_banned_element(el) {
                continue;
            }
            if self.is_candidate(el) {
                out.push(el);
                continue;
            }
            stack.extend(el.children().iter().rev());
        }
        out
    }

    pub fn locate(&self) -> Vec<Result<ScanElement<'d>, SkippedScan>> {
        self.candidates()
            .into_iter()
            .enumerate()
            .map(|(index, el)| {
                self.scan(el, index).map_err(|reason| SkippedScan {
                    id: el.attr("id").map(str::to_string),
                    index,
                    reason,
                })
            })
            .collect()
    }

    pub fn scan(&self, el: &'d Element, index: usize) -> Result<ScanElement<'d>, ScanError> {
        let scope = self.scope(el);

        let ms_level = self
            .first_param(&scope, CvRole::MsLevel)
            .ok_or(ScanError::MissingMsLevel)?;
        let ms_level = MsLevel::from_value(ms_level.value().unwrap_or_default())?;

        let retention_time = self
            .first_param(&scope, CvRole::ScanStartTime)
            .and_then(Element::value)
            .unwrap_or_default()
            .to_string();

        let id = el.attr("id").map(str::to_string);
        let number = id.as_deref().and_then(scan_number).or_else(|| {
            self.first_param(&scope, CvRole::SpectrumTitle)
                .and_then(Element::value)
                .and_then(scan_number)
        });

        let precursor = scope.iter().copied().find(|e| self.table.is_precursor(e));
        let parent_scan = precursor
            .and_then(|p| p.attr("spectrumRef"))
            .and_then(scan_number);

        let parent_mass = if ms_level == MsLevel::Ms1 {
            None
        } else {
            let filtered = self
                .first_param(&scope, CvRole::FilterString)
                .and_then(Element::value)
                .and_then(|fs| parent_from_filter(fs, ms_level));
            filtered.or_else(|| {
                let search = match precursor {
                    Some(p) => self.scope(p),
                    None => scope.clone(),
                };
                self.first_param(&search, CvRole::SelectedIonMz)
                    .and_then(Element::value)
                    .map(str::to_string)
            })
        };

        let default_array_length = el
            .attr("defaultArrayLength")
            .and_then(|v| v.trim().parse::<usize>().ok());

        let mut mass_array = None;
        let mut intensity_array = None;
        for holder in scope.iter().skip(1).copied() {
            let Some(role) = self.array_role(holder) else {
                continue;
            };
            let slot = match role {
                ArrayRole::Mz => &mut mass_array,
                ArrayRole::Intensity => &mut intensity_array,
            };
            if slot.is_none() {
                *slot = Some(self.encoded_array(holder, role, default_array_length));
            }
        }

        debug!(
            "located {} scan #{index} id={:?} rt={retention_time:?}",
            ms_level, id
        );

        Ok(ScanElement {
            id,
            index,
            scan_number: number,
            ms_level,
            retention_time,
            parent_mass,
            parent_scan,
            default_array_length,
            mass_array,
            intensity_array,
        })
    }

    fn is_candidate(&self, el: &Element) -> bool {
        self.table.is_scan_container(el)
            || self
                .doc
                .params_of(el)
                .into_iter()
                .any(|p| self.table.role_of(p) == Some(CvRole::MsLevel))
    }

    /// `el` followed by its descendants, banned subtrees excluded.
    fn scope(&self, el: &'d Element) -> Vec<&'d Element> {
        let mut out = Vec::new();
        let mut stack = vec![el];
        while let Some(cur) = stack.pop() {
            if self.table.is_banned_element(cur) {
                continue;
            }
            out.push(cur);
            stack.extend(cur.children().iter().rev());
        }
        out
    }

    fn first_param(&self, scope: &[&'d Element], role: CvRole) -> Option<&'d Element> {
        scope.iter().find_map(|&owner| {
            self.doc
                .params_of(owner)
                .into_iter()
                .find(|p| self.table.role_of(p) == Some(role))
        })
    }

    fn array_role(&self, holder: &Element) -> Option<ArrayRole> {
        self.doc
            .params_of(holder)
            .into_iter()
            .find_map(|p| match self.table.role_of(p) {
                Some(CvRole::MzArray) => Some(ArrayRole::Mz),
                Some(CvRole::IntensityArray) => Some(ArrayRole::Intensity),
                _ => None,
            })
    }

    fn encoded_array(
        &self,
        holder: &'d Element,
        role: ArrayRole,
        default_length: Option<usize>,
    ) -> EncodedArray<'d> {
        let payload = holder
            .children()
            .iter()
            .find(|c| self.table.is_payload(c))
            .map(Element::text)
            .unwrap_or_default();
        let declared_length = holder
            .attr("arrayLength")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .or(default_length);
        EncodedArray {
            role,
            params: self.doc.params_of(holder),
            payload,
            declared_length,
        }
    }
}

pub fn locate_scans<'d>(
    doc: &'d Document,
    table: &'d CvTable,
) -> Vec<Result<ScanElement<'d>, SkippedScan>> {
    ScanLocator::new(doc, table).locate()
}

pub fn scan_number(text: &str) -> Option<u64> {
    SCAN_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parent mass of an MS3+ scan from a vendor filter string such as
/// `FTMS + p ESI d Full ms3 445.12@cid35.00 300.45@cid35.00 [80.00-1000.00]`.
pub fn parent_from_filter(filter: &str, level: MsLevel) -> Option<String> {
    if level.number() < 3 {
        return None;
    }
    filter
        .split('@')
        .nth(usize::from(level.number()) - 2)
        .and_then(|segment| segment.split_whitespace().last())
        .map(str::to_string)
}
