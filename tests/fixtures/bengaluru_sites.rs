//! Bengaluru locations for survey fixtures.
//!
//! Approximate neighbourhood centres; routable with an OSRM extract of
//! southern India.

#![allow(dead_code)]

use survey_planner::location::{Location, LocationSet};

/// A named site with coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Site {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }
}

// ============================================================================
// Enumerator bases
// ============================================================================

pub const ENUMERATOR_BASES: &[Site] = &[
    Site::new("MG Road", 12.9756, 77.6066),
    Site::new("Jayanagar", 12.9299, 77.5826),
    Site::new("Hebbal", 13.0358, 77.5970),
    Site::new("Marathahalli", 12.9569, 77.7011),
];

// ============================================================================
// Survey targets
// ============================================================================

pub const TARGET_SITES: &[Site] = &[
    Site::new("Indiranagar", 12.9784, 77.6408),
    Site::new("Koramangala", 12.9352, 77.6245),
    Site::new("Malleshwaram", 13.0031, 77.5643),
    Site::new("Whitefield", 12.9698, 77.7500),
    Site::new("Yelahanka", 13.1007, 77.5963),
    Site::new("Banashankari", 12.9255, 77.5468),
    Site::new("BTM Layout", 12.9166, 77.6101),
    Site::new("HSR Layout", 12.9121, 77.6446),
    Site::new("Rajajinagar", 12.9915, 77.5520),
    Site::new("Basavanagudi", 12.9421, 77.5754),
    Site::new("Frazer Town", 12.9967, 77.6145),
    Site::new("Ulsoor", 12.9817, 77.6286),
    Site::new("Domlur", 12.9609, 77.6387),
    Site::new("JP Nagar", 12.9063, 77.5857),
    Site::new("Vijayanagar", 12.9719, 77.5350),
    Site::new("RT Nagar", 13.0214, 77.5946),
    Site::new("Banaswadi", 13.0104, 77.6482),
    Site::new("KR Puram", 13.0077, 77.6960),
    Site::new("Bellandur", 12.9304, 77.6784),
    Site::new("Yeshwanthpur", 13.0280, 77.5409),
];

// ============================================================================
// Builders
// ============================================================================

/// Ids are the site names, as owned strings.
pub fn location_set(sites: &[Site]) -> LocationSet<String> {
    LocationSet::new(
        sites
            .iter()
            .map(|site| Location::new(site.name.to_string(), site.lat, site.lng))
            .collect(),
    )
    .expect("fixture sites are valid")
}

pub fn enumerators(count: usize) -> LocationSet<String> {
    location_set(&ENUMERATOR_BASES[..count])
}

pub fn targets(count: usize) -> LocationSet<String> {
    location_set(&TARGET_SITES[..count])
}
