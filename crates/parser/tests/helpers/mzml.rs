use std::{fs, path::PathBuf, sync::OnceLock};

use mzripper::{
    Extraction, RipperConfig, rip_mzml,
    utilities::{
        decode::{ArrayEncoding, Compression, Precision},
        encode::encode_array,
    },
};

pub const F64: ArrayEncoding = ArrayEncoding {
    precision: Precision::F64,
    compression: Compression::None,
};

#[allow(dead_code)]
pub const F32_ZLIB: ArrayEncoding = ArrayEncoding {
    precision: Precision::F32,
    compression: Compression::Zlib,
};

/// One synthetic `<spectrum>` element.
#[derive(Debug, Clone)]
pub struct SpectrumXml {
    pub id: String,
    pub ms_level: Option<String>,
    pub retention_time: Option<String>,
    pub precursor_ref: Option<String>,
    pub selected_ion: Option<String>,
    pub filter: Option<String>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
    pub encoding: ArrayEncoding,
    pub default_length: Option<usize>,
    pub extra: String,
}

#[allow(dead_code)]
impl SpectrumXml {
    pub fn new(id: &str, ms_level: u8, rt: &str) -> Self {
        SpectrumXml {
            id: id.to_string(),
            ms_level: Some(ms_level.to_string()),
            retention_time: Some(rt.to_string()),
            precursor_ref: None,
            selected_ion: None,
            filter: None,
            mz: Vec::new(),
            intensity: Vec::new(),
            encoding: F64,
            default_length: None,
            extra: String::new(),
        }
    }

    pub fn peaks(mut self, mz: &[f64], intensity: &[f64]) -> Self {
        self.mz = mz.to_vec();
        self.intensity = intensity.to_vec();
        self
    }

    pub fn precursor(mut self, spectrum_ref: &str, selected_ion: Option<&str>) -> Self {
        self.precursor_ref = Some(spectrum_ref.to_string());
        self.selected_ion = selected_ion.map(str::to_string);
        self
    }

    pub fn filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn encoding(mut self, encoding: ArrayEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn without_level(mut self) -> Self {
        self.ms_level = None;
        self
    }

    pub fn default_length(mut self, n: usize) -> Self {
        self.default_length = Some(n);
        self
    }

    pub fn extra(mut self, xml: &str) -> Self {
        self.extra.push_str(xml);
        self
    }

    fn array_xml(&self, values: &[f64], role_accession: &str, role_name: &str) -> String {
        let (prec_acc, prec_name) = match self.encoding.precision {
            Precision::F32 => ("MS:1000521", "32-bit float"),
            Precision::F64 => ("MS:1000523", "64-bit float"),
        };
        let (comp_acc, comp_name) = match self.encoding.compression {
            Compression::None => ("MS:1000576", "no compression"),
            Compression::Zlib => ("MS:1000574", "zlib compression"),
        };
        let payload = encode_array(values, self.encoding);
        format!(
            r#"          <binaryDataArray encodedLength="{len}">
            <cvParam cvRef="MS" accession="{prec_acc}" name="{prec_name}" value=""/>
            <cvParam cvRef="MS" accession="{comp_acc}" name="{comp_name}" value=""/>
            <cvParam cvRef="MS" accession="{role_accession}" name="{role_name}" value=""/>
            <binary>{payload}</binary>
          </binaryDataArray>
"#,
            len = payload.len()
        )
    }

    pub fn to_xml(&self, index: usize) -> String {
        let default_length = self.default_length.unwrap_or(self.mz.len());
        let mut xml = format!(
            "      <spectrum index=\"{index}\" id=\"{}\" defaultArrayLength=\"{default_length}\">\n",
            self.id
        );
        if let Some(level) = &self.ms_level {
            xml.push_str(&format!(
                "        <cvParam cvRef=\"MS\" accession=\"MS:1000511\" name=\"ms level\" value=\"{level}\"/>\n"
            ));
        }
        xml.push_str(&self.extra);
        xml.push_str("        <scanList count=\"1\">\n          <scan>\n");
        if let Some(rt) = &self.retention_time {
            xml.push_str(&format!(
                "            <cvParam cvRef=\"MS\" accession=\"MS:1000016\" name=\"scan start time\" value=\"{rt}\" unitCvRef=\"UO\" unitAccession=\"UO:0000031\" unitName=\"minute\"/>\n"
            ));
        }
        if let Some(filter) = &self.filter {
            xml.push_str(&format!(
                "            <cvParam cvRef=\"MS\" accession=\"MS:1000512\" name=\"filter string\" value=\"{filter}\"/>\n"
            ));
        }
        xml.push_str("          </scan>\n        </scanList>\n");
        if let Some(spectrum_ref) = &self.precursor_ref {
            xml.push_str(&format!(
                "        <precursorList count=\"1\">\n          <precursor spectrumRef=\"{spectrum_ref}\">\n"
            ));
            if let Some(mz) = &self.selected_ion {
                xml.push_str(&format!(
                    "            <selectedIonList count=\"1\">\n              <selectedIon>\n                <cvParam cvRef=\"MS\" accession=\"MS:1000744\" name=\"selected ion m/z\" value=\"{mz}\" unitCvRef=\"MS\" unitAccession=\"MS:1000040\" unitName=\"m/z\"/>\n              </selectedIon>\n            </selectedIonList>\n"
                ));
            }
            xml.push_str("          </precursor>\n        </precursorList>\n");
        }
        xml.push_str("        <binaryDataArrayList count=\"2\">\n");
        xml.push_str(&self.array_xml(&self.mz, "MS:1000514", "m/z array"));
        xml.push_str(&self.array_xml(&self.intensity, "MS:1000515", "intensity array"));
        xml.push_str("        </binaryDataArrayList>\n      </spectrum>\n");
        xml
    }
}

/// Wraps spectra into a minimal mzML document with a vendor scan-settings block.
pub fn mzml(spectra: &[SpectrumXml]) -> String {
    let body: String = spectra
        .iter()
        .enumerate()
        .map(|(i, s)| s.to_xml(i))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1.0">
  <cvList count="1">
    <cv id="MS" fullName="Proteomics Standards Initiative Mass Spectrometry Ontology"/>
  </cvList>
  <scanSettingsList count="1">
    <scanSettings id="vendor">
      <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="1"/>
    </scanSettings>
  </scanSettingsList>
  <run id="synthetic">
    <spectrumList count="{count}">
{body}    </spectrumList>
  </run>
</mzML>
"#,
        count = spectra.len()
    )
}

#[allow(dead_code)]
pub fn rip(xml: &str, config: &RipperConfig) -> Extraction {
    rip_mzml(xml.as_bytes(), config).unwrap_or_else(|e| panic!("rip_mzml failed: {e}"))
}

#[allow(dead_code)]
pub fn fixture_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
}

#[allow(dead_code)]
pub fn load_fixture(cache: &'static OnceLock<Vec<u8>>, path: &str) -> &'static [u8] {
    cache.get_or_init(|| {
        let full = fixture_path(path);
        fs::read(&full).unwrap_or_else(|e| panic!("cannot read {:?}: {}", full, e))
    })
}
