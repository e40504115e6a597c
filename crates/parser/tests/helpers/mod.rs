pub mod mzml;
