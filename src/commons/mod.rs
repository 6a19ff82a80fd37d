//! Things shared across the crate.

pub mod error;
pub mod util;

#[cfg(test)]
pub mod test;
