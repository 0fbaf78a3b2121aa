//! Output writers.
//!
//! - [`json`]: the flat JSON array of scraped news records

pub mod json;
