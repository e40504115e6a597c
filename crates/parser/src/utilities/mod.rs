pub mod assemble;
pub mod decode;
pub mod encode;
pub mod group;
pub mod parse_mzml;

#[cfg(test)]
mod tests;
