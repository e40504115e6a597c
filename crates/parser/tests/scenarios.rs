mod helpers;

use helpers::mzml::{F32_ZLIB, SpectrumXml, mzml, rip};
use mzripper::{
    CvTable, EmptyLevels, Intensity, MsLevel, RipError, RipperConfig, RtUnits, ScanError, rip_mzml,
    rip_mzml_with_table,
};

fn scenario_scan() -> SpectrumXml {
    SpectrumXml::new("controllerType=0 controllerNumber=1 scan=1", 1, "0.2016")
        .peaks(&[100.1234, 200.5678], &[50.0, 200.0])
}

fn record_json(config: &RipperConfig) -> String {
    let extraction = rip(&mzml(&[scenario_scan()]), config);
    let ms1 = extraction.result.level(MsLevel::Ms1);
    assert_eq!(ms1.len(), 1);
    serde_json::to_string(&ms1[0]).expect("json")
}

#[test]
fn scenario_a_absolute_ms1() {
    assert_eq!(
        record_json(&RipperConfig::default()),
        r#"{"100.1234":50,"200.5678":200,"parent":"","retention_time":"0.2016","mass_list":[100.1234,200.5678]}"#
    );
}

#[test]
fn scenario_b_relative_ms1() {
    assert_eq!(
        record_json(&RipperConfig::relative()),
        r#"{"100.1234":25.0,"200.5678":100,"parent":"","base_peak":[200.5678,200],"retention_time":"0.2016","mass_list":[100.1234,200.5678]}"#
    );
}

#[test]
fn scenario_c_ms2_parent() {
    let xml = mzml(&[
        scenario_scan(),
        SpectrumXml::new("controllerType=0 controllerNumber=1 scan=2", 2, "0.2100")
            .precursor("controllerType=0 controllerNumber=1 scan=1", Some("235.6523"))
            .peaks(&[80.5, 120.25], &[10.0, 20.0]),
    ]);
    let extraction = rip(&xml, &RipperConfig::default());
    let ms2 = extraction.result.level(MsLevel::Ms2);
    assert_eq!(ms2.len(), 1);
    assert_eq!(ms2[0].parent, "235.6523");
}

#[test]
fn scenario_d_mismatched_scan_is_dropped() {
    let xml = mzml(&[
        SpectrumXml::new("s0", 1, "1.0").peaks(&[100.0, 200.0], &[1.0, 2.0]),
        SpectrumXml::new("s1", 1, "2.0").peaks(&[100.0, 150.0, 200.0], &[10.0, 20.0]),
        SpectrumXml::new("s2", 2, "2.5").peaks(&[50.0], &[5.0]),
        SpectrumXml::new("s3", 1, "3.0").peaks(&[300.0], &[3.0]),
    ]);
    let extraction = rip(&xml, &RipperConfig::default());

    let ms1: Vec<&str> = extraction
        .result
        .level(MsLevel::Ms1)
        .iter()
        .map(|r| r.retention_time.as_str())
        .collect();
    assert_eq!(ms1, ["1.0", "3.0"]);
    assert_eq!(extraction.result.level(MsLevel::Ms2).len(), 1);

    assert_eq!(extraction.skipped.len(), 1);
    let skipped = &extraction.skipped[0];
    assert_eq!(skipped.id.as_deref(), Some("s1"));
    assert_eq!(skipped.index, 1);
    assert_eq!(
        skipped.reason,
        ScanError::LengthMismatch {
            mz: 3,
            intensity: 2
        }
    );

    let json: serde_json::Value =
        serde_json::from_str(&extraction.result.to_json_pretty().expect("json")).expect("valid");
    assert_eq!(json["ms1"]["spectrum_2"]["retention_time"], "3.0");
    assert!(json["ms1"].get("spectrum_3").is_none());
}

#[test]
fn scenario_e_banned_container_is_not_a_scan() {
    let xml = mzml(&[scenario_scan()]).replace(
        "  <run id=\"synthetic\">",
        r#"  <acquisitionSettingsList count="1">
    <acquisitionSettings id="vendor-acq">
      <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="2"/>
      <binaryDataArrayList count="0"/>
    </acquisitionSettings>
  </acquisitionSettingsList>
  <run id="synthetic">"#,
    );
    let extraction = rip(&xml, &RipperConfig::default());
    assert_eq!(extraction.result.record_count(), 1);
    assert_eq!(extraction.result.level(MsLevel::Ms1).len(), 1);
    assert!(extraction.result.level(MsLevel::Ms2).is_empty());
    assert!(extraction.skipped.is_empty());
}

#[test]
fn peak_counts_line_up() {
    let mz: Vec<f64> = (0..25).map(|i| 100.0 + i as f64 * 1.37).collect();
    let intensity: Vec<f64> = (0..25).map(|i| (i * 7 % 11) as f64 + 0.5).collect();
    let xml = mzml(&[
        SpectrumXml::new("a", 1, "1").peaks(&mz, &intensity),
        SpectrumXml::new("b", 2, "2")
            .precursor("scan=1", Some("150.0"))
            .peaks(&mz[..10], &intensity[..10])
            .encoding(F32_ZLIB),
    ]);
    let extraction = rip(&xml, &RipperConfig::default());

    let a = &extraction.result.level(MsLevel::Ms1)[0];
    assert_eq!(a.peaks.len(), 25);
    assert_eq!(a.mass_list.len(), 25);
    assert_eq!(a.mass_list, mz);

    let b = &extraction.result.level(MsLevel::Ms2)[0];
    assert_eq!(b.peaks.len(), 10);
    assert_eq!(b.mass_list.len(), 10);
    for (got, want) in b.mass_list.iter().zip(&mz) {
        assert!(((got - want) / want).abs() < 1e-6);
    }
}

#[test]
fn relative_maximum_is_base_peak() {
    let xml = mzml(&[
        SpectrumXml::new("a", 1, "1").peaks(&[10.0, 20.0, 30.0, 40.0], &[7.0, 11.0, 3.0, 11.0]),
        SpectrumXml::new("b", 2, "2").peaks(&[55.5, 66.6], &[123.4, 0.1]),
        SpectrumXml::new("c", 3, "3").peaks(&[5.0], &[9.0]),
    ]);
    let extraction = rip(&xml, &RipperConfig::relative());

    for (_, records) in extraction.result.levels() {
        for record in records {
            let (base_mz, _) = record.base_peak.expect("base peak");
            let max = record
                .peaks
                .values()
                .map(|v| v.as_f64())
                .fold(f64::MIN, f64::max);
            assert_eq!(max, 100.0);
            let key = format!("{base_mz:.4}");
            assert_eq!(record.peaks[key.as_str()], Intensity::Integral(100));
        }
    }
}

#[test]
fn output_is_idempotent() {
    let xml = mzml(&[
        scenario_scan(),
        SpectrumXml::new("b", 2, "2")
            .precursor("scan=1", Some("200.5678"))
            .peaks(&[55.5, 66.6], &[123.4, 0.1]),
    ]);
    for config in [RipperConfig::default(), RipperConfig::relative()] {
        let first = rip(&xml, &config).result.to_json_pretty().expect("json");
        let second = rip(&xml, &config).result.to_json_pretty().expect("json");
        assert_eq!(first, second);
    }
}

#[test]
fn ms2_parent_linkage() {
    let xml = mzml(&[
        SpectrumXml::new("scan=1", 1, "1").peaks(&[1.0], &[1.0]),
        SpectrumXml::new("scan=2", 2, "2")
            .precursor("scan=1", Some("445.1200"))
            .peaks(&[1.0], &[1.0]),
        SpectrumXml::new("scan=3", 2, "3")
            .precursor("scan=1", None)
            .peaks(&[1.0], &[1.0]),
        SpectrumXml::new("scan=4", 2, "4").peaks(&[1.0], &[1.0]),
        SpectrumXml::new("scan=5", 3, "5")
            .filter("FTMS + p ESI d Full ms3 445.1200@cid35.00 300.4500@cid35.00 [80.00-1000.00]")
            .precursor("scan=2", Some("300.45"))
            .peaks(&[1.0], &[1.0]),
    ]);
    let extraction = rip(&xml, &RipperConfig::default());
    let parents: Vec<&str> = extraction
        .result
        .level(MsLevel::Ms2)
        .iter()
        .map(|r| r.parent.as_str())
        .collect();
    assert_eq!(parents, ["445.1200", "", ""]);
    assert_eq!(extraction.result.level(MsLevel::Ms3)[0].parent, "300.4500");
    assert_eq!(extraction.result.level(MsLevel::Ms1)[0].parent, "");
}

#[test]
fn empty_levels_policy() {
    let xml = mzml(&[scenario_scan()]);

    let emitted = rip(&xml, &RipperConfig::default()).result;
    let json: serde_json::Value =
        serde_json::from_str(&emitted.to_json_pretty().expect("json")).expect("valid");
    let keys: Vec<&String> = json.as_object().expect("object").keys().collect();
    assert_eq!(keys, ["ms1", "ms2", "ms3", "ms4"]);

    let config = RipperConfig {
        empty_levels: EmptyLevels::Omit,
        ..RipperConfig::default()
    };
    let omitted = rip(&xml, &config).result;
    assert!(omitted.has_level(MsLevel::Ms1));
    assert!(!omitted.has_level(MsLevel::Ms2));
    let text = omitted.to_json_pretty().expect("json");
    assert!(!text.contains("\"ms2\""));
}

#[test]
fn empty_spectrum_is_kept() {
    let xml = mzml(&[SpectrumXml::new("empty", 1, "9.9").peaks(&[], &[])]);
    let extraction = rip(&xml, &RipperConfig::relative());
    let record = &extraction.result.level(MsLevel::Ms1)[0];
    assert!(record.peaks.is_empty());
    assert!(record.mass_list.is_empty());
    assert_eq!(record.base_peak, None);
    assert_eq!(record.retention_time, "9.9");
}

#[test]
fn scan_level_failures_do_not_stop_the_file() {
    let xml = mzml(&[
        SpectrumXml::new("numpress", 1, "1").peaks(&[1.0], &[1.0]),
        SpectrumXml::new("unlabelled", 1, "2")
            .peaks(&[1.0], &[1.0])
            .without_level(),
        SpectrumXml::new("fine", 1, "3")
            .peaks(&[1.0], &[1.0])
            .encoding(F32_ZLIB),
    ])
    .replace("MS:1000576", "MS:1002312");
    let extraction = rip(&xml, &RipperConfig::default());

    assert_eq!(extraction.result.level(MsLevel::Ms1).len(), 1);
    assert_eq!(extraction.result.level(MsLevel::Ms1)[0].retention_time, "3");

    let reasons: Vec<(&str, &ScanError)> = extraction
        .skipped
        .iter()
        .map(|s| (s.id.as_deref().unwrap_or(""), &s.reason))
        .collect();
    assert_eq!(reasons.len(), 2);
    assert_eq!(reasons[0].0, "numpress");
    assert!(matches!(reasons[0].1, ScanError::UnsupportedEncoding(_)));
    assert_eq!(reasons[1], ("unlabelled", &ScanError::MissingMsLevel));
}

#[test]
fn malformed_document_is_fatal() {
    for bad in ["<mzML><run>", "not xml at all", "<mzML></run>"] {
        assert!(matches!(
            rip_mzml(bad.as_bytes(), &RipperConfig::default()),
            Err(RipError::MalformedDocument(_))
        ));
    }
}

#[test]
fn alternative_cv_table() {
    let table = CvTable::from_json(
        r#"{
            "roles": {
                "MS:1000511": "ms_level",
                "MS:1000016": "scan_start_time",
                "MS:1000514": "mz_array",
                "MS:1000515": "intensity_array",
                "MS:1000523": "float64",
                "MS:1000576": "no_compression"
            },
            "scan_containers": ["spectrum"],
            "payload_elements": ["binary"],
            "banned_phrases": ["ms level"]
        }"#,
    )
    .expect("table loads");
    let xml = mzml(&[scenario_scan()]);
    let extraction = rip_mzml_with_table(xml.as_bytes(), &RipperConfig::default(), &table)
        .expect("document parses");
    assert_eq!(extraction.result.record_count(), 0);
    assert_eq!(extraction.skipped.len(), 1);
    assert_eq!(extraction.skipped[0].reason, ScanError::MissingMsLevel);
}

#[test]
fn retention_time_in_seconds_becomes_minutes() {
    let xml = mzml(&[
        SpectrumXml::new("scan=1", 1, "30").peaks(&[100.0], &[10.0]),
        SpectrumXml::new("scan=2", 1, "").peaks(&[100.0], &[10.0]),
    ]);

    let verbatim = rip(&xml, &RipperConfig::default()).result;
    assert_eq!(verbatim.level(MsLevel::Ms1)[0].retention_time, "30");

    let config = RipperConfig {
        rt_units: RtUnits::Seconds,
        ..RipperConfig::default()
    };
    let minutes = rip(&xml, &config).result;
    assert_eq!(minutes.level(MsLevel::Ms1)[0].retention_time, "0.5");
    assert_eq!(minutes.level(MsLevel::Ms1)[1].retention_time, "");
}
