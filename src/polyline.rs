//! Route geometry.
//!
//! The trip service returns its overview geometry as an encoded polyline;
//! it is decoded once, at the boundary, into `(lat, lng)` points.

use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

/// Precision of OSRM's default `polyline` geometry.
pub const DEFAULT_PRECISION: u32 = 5;

/// Decoded route geometry as `(lat, lng)` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Decode an encoded polyline with `precision` decimal digits.
    pub fn decode(encoded: &str, precision: u32) -> Result<Self, RoutingError> {
        let factor = 10f64.powi(precision as i32);
        let mut bytes = encoded.bytes();
        let mut points = Vec::new();
        let (mut lat, mut lng) = (0i64, 0i64);

        while let Some(delta) = next_value(&mut bytes)? {
            lat += delta;
            let delta = next_value(&mut bytes)?.ok_or_else(|| RoutingError::Parse {
                message: "polyline ends between latitude and longitude".to_string(),
            })?;
            lng += delta;
            points.push((lat as f64 / factor, lng as f64 / factor));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Next zig-zag encoded value, or `None` at the end of input.
fn next_value(bytes: &mut impl Iterator<Item = u8>) -> Result<Option<i64>, RoutingError> {
    let mut result = 0i64;
    let mut shift = 0u32;
    let mut started = false;

    for byte in bytes {
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(RoutingError::Parse {
                message: format!("invalid polyline byte {byte:#x}"),
            });
        }
        started = true;
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            let value = if result & 1 == 1 { !(result >> 1) } else { result >> 1 };
            return Ok(Some(value));
        }
    }

    if started {
        return Err(RoutingError::Parse {
            message: "polyline ends mid-value".to_string(),
        });
    }
    Ok(None)
}
