use crate::{RipError, mzml::document::Document};

use super::load;

#[test]
fn builds_tree_with_attributes_and_text() {
    let doc = load(
        r#"<?xml version="1.0" encoding="utf-8"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1.0">
  <run id="r1">
    <spectrum index="0" id="scan=7" defaultArrayLength="2">
      <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="1"/>
      <binary>
        AAAA
      </binary>
    </spectrum>
  </run>
</mzML>"#,
    );

    let root = doc.root();
    assert_eq!(root.name(), "mzML");
    assert_eq!(root.attr("version"), Some("1.1.0"));

    let run = &root.children()[0];
    assert_eq!(run.attr("id"), Some("r1"));

    let spectrum = run.children_named("spectrum").next().expect("spectrum");
    assert_eq!(spectrum.attr("defaultArrayLength"), Some("2"));
    assert_eq!(spectrum.attr("missing"), None);

    let param = spectrum.params().next().expect("cvParam");
    assert_eq!(param.accession(), Some("MS:1000511"));
    assert_eq!(param.value(), Some("1"));

    let binary = spectrum.children_named("binary").next().expect("binary");
    assert_eq!(binary.text(), "AAAA");
}

#[test]
fn strips_namespace_prefixes_and_unescapes() {
    let doc = load(
        r#"<ms:mzML xmlns:ms="urn:x"><ms:run name="a &amp; b">x &lt; y<![CDATA[ & z]]></ms:run></ms:mzML>"#,
    );
    let run = &doc.root().children()[0];
    assert_eq!(doc.root().name(), "mzML");
    assert_eq!(run.name(), "run");
    assert_eq!(run.attr("name"), Some("a & b"));
    assert_eq!(run.text(), "x < y & z");
}

#[test]
fn descendants_walk_in_document_order() {
    let doc = load("<a><b><c/><d/></b><e><f/></e></a>");
    let names: Vec<&str> = doc.root().descendants().map(|e| e.name()).collect();
    assert_eq!(names, ["b", "c", "d", "e", "f"]);
}

#[test]
fn params_of_follows_group_references() {
    let doc = load(
        r#"<mzML>
  <referenceableParamGroupList count="1">
    <referenceableParamGroup id="CommonMS1">
      <cvParam accession="MS:1000511" name="ms level" value="1"/>
    </referenceableParamGroup>
  </referenceableParamGroupList>
  <spectrum id="s0">
    <referenceableParamGroupRef ref="CommonMS1"/>
    <cvParam accession="MS:1000016" name="scan start time" value="1.5"/>
  </spectrum>
</mzML>"#,
    );
    assert!(doc.param_group("CommonMS1").is_some());
    assert!(doc.param_group("Other").is_none());

    let spectrum = doc.root().children_named("spectrum").next().expect("spectrum");
    let accessions: Vec<&str> = doc
        .params_of(spectrum)
        .into_iter()
        .filter_map(|p| p.accession())
        .collect();
    assert_eq!(accessions, ["MS:1000016", "MS:1000511"]);
}

#[test]
fn rejects_broken_documents() {
    for bad in [
        "",
        "just text",
        "<a><b></a>",
        "<a><b>",
        "<a/><b/>",
    ] {
        match Document::parse(bad.as_bytes()) {
            Err(RipError::MalformedDocument(_)) => {}
            other => panic!("{bad:?} should be malformed, got {other:?}"),
        }
    }
}
