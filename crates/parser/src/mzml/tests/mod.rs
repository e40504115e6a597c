mod document;

use crate::mzml::document::Document;

pub(crate) fn load(xml: &str) -> Document {
    Document::parse(xml.as_bytes()).unwrap_or_else(|e| panic!("document failed to load: {e}"))
}
