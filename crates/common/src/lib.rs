//! Utilities shared by the tally binaries.

pub mod logging;
