pub mod artifacts;
pub mod records;
