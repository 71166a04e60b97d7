//! Target stores for the overwrite and versioned representations.

mod base;
pub mod memory;

pub use base::*;
