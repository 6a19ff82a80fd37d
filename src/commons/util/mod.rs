//! General utility modules.

pub mod ext_serde;
pub mod file;
