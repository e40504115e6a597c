pub mod cv_table;
pub mod document;
pub mod locate;
pub mod structs;

#[cfg(test)]
mod tests;
