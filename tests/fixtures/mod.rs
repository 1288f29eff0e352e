//! Test fixtures for survey-planner.
//!
//! Provides survey data around Bengaluru:
//! - enumerator bases
//! - survey target sites
//! - builders for location sets

pub mod bengaluru_sites;

pub use bengaluru_sites::*;
