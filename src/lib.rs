//! survey-planner
//!
//! Assigns enumerators to survey targets at minimum travel cost under
//! workload and budget limits, then orders each enumerator's targets into
//! a visit sequence.

pub mod traits;
pub mod error;
pub mod location;
pub mod matrix;
pub mod haversine;
pub mod osrm;
pub mod google;
pub mod provider;
pub mod solver;
pub mod relax;
pub mod postprocess;
pub mod polyline;
pub mod route;
pub mod flow;
