//! Small helpers shared by the condaview crates.

pub mod error;
pub mod hash;
pub mod path;
pub mod time;
