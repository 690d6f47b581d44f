//! Acquisition footprints and antemeridian-aware overlap testing.
//!
//! Footprints are geographic boundary polygons with longitudes in
//! [-180, 180). A swath that straddles the ±180° line shows up as a
//! longitude span greater than 180°; before any geometric test such a
//! footprint is rebased into the [0, 360) frame so its ring is contiguous
//! again. For a pair of footprints sitting on opposite sides of the wrap
//! seam, one side is translated by ±360° towards the other, so adjacency
//! at the antemeridian is not mistaken for a 340°-wide gap. Translation
//! of a whole ring never tears it, which a pointwise wrap would do to a
//! ring straddling longitude 0.

use geo::{Area, BooleanOps, CoordsIter, Intersects, MapCoords, Polygon};
use wkt::TryFromWkt;

use crate::error::{ColocError, Result};

/// Geographic boundary polygon of an acquisition's coverage area.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint(Polygon<f64>);

impl Footprint {
    pub fn new(polygon: Polygon<f64>) -> Self {
        Self(polygon)
    }

    /// Parse a footprint from a WKT polygon string.
    pub fn from_wkt(s: &str) -> Result<Self> {
        Polygon::try_from_wkt_str(s)
            .map(Self)
            .map_err(|e| ColocError::WktParse(format!("{e}")))
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.0
    }

    fn lon_bounds(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for c in self.0.coords_iter() {
            min = min.min(c.x);
            max = max.max(c.x);
        }
        (min, max)
    }

    /// True when the longitude extent implies the ±180° line is crossed.
    pub fn crosses_antemeridian(&self) -> bool {
        let (min, max) = self.lon_bounds();
        max - min > 180.0
    }

    /// Rebase a dateline-crossing footprint so its boundary is contiguous.
    ///
    /// Longitudes move into [0, 360); a footprint that does not cross the
    /// antemeridian is returned unchanged.
    pub fn normalized(&self) -> Footprint {
        if self.crosses_antemeridian() {
            Footprint(wrap_360(&self.0))
        } else {
            self.clone()
        }
    }

    /// Overlap predicate, symmetric in its arguments.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        let (a, b) = common_frame(self, other);
        a.intersects(&b)
    }

    /// Merged footprint of two overlapping acquisitions.
    ///
    /// `None` when the footprints do not overlap or the intersection is
    /// degenerate (empty area). A merged product boundary is a single
    /// polygon, so when the overlap region splits into several disjoint
    /// pieces only the one with the largest area is kept. The result is
    /// expressed back in the [-180, 180) convention.
    pub fn intersection(&self, other: &Footprint) -> Option<Footprint> {
        let (a, b) = common_frame(self, other);
        let pieces = a.intersection(&b);
        pieces
            .into_iter()
            .max_by(|p, q| {
                p.unsigned_area()
                    .partial_cmp(&q.unsigned_area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .filter(|p| p.unsigned_area() > 0.0)
            .map(|p| Footprint(wrap_180(&p)))
    }
}

/// Shift longitudes into [0, 360).
fn wrap_360(p: &Polygon<f64>) -> Polygon<f64> {
    p.map_coords(|c| (c.x.rem_euclid(360.0), c.y).into())
}

/// Shift longitudes by +180° modulo 360°, then rebase by -180°, restoring
/// the [-180, 180) convention.
fn wrap_180(p: &Polygon<f64>) -> Polygon<f64> {
    p.map_coords(|c| ((c.x + 180.0).rem_euclid(360.0) - 180.0, c.y).into())
}

/// Translate every longitude of a ring by `shift` degrees. Unlike a
/// pointwise wrap this keeps the ring intact whatever longitude it
/// straddles.
fn translate_lon(p: &Polygon<f64>, shift: f64) -> Polygon<f64> {
    p.map_coords(|c| (c.x + shift, c.y).into())
}

/// Put two footprints into a frame where both rings are contiguous and
/// mutually comparable.
///
/// Each footprint is first made contiguous on its own. When the two then
/// sit more than 180° apart in longitude, their true angular separation
/// runs the short way around the globe through the wrap seam: the second
/// footprint is translated by ±360° towards the first, after which plain
/// planar predicates give the right answer for both near and far pairs.
fn common_frame(a: &Footprint, b: &Footprint) -> (Polygon<f64>, Polygon<f64>) {
    let a = a.normalized();
    let b = b.normalized();
    let (a_min, a_max) = a.lon_bounds();
    let (b_min, b_max) = b.lon_bounds();
    let separation = (a_min + a_max) / 2.0 - (b_min + b_max) / 2.0;
    let b = if separation > 180.0 {
        Footprint(translate_lon(&b.0, 360.0))
    } else if separation < -180.0 {
        Footprint(translate_lon(&b.0, -360.0))
    } else {
        b
    };
    (a.0, b.0)
}

/// Overlap predicate over two footprints (see [`Footprint::overlaps`]).
pub fn overlaps(a: &Footprint, b: &Footprint) -> bool {
    a.overlaps(b)
}

/// Normalized intersection geometry (see [`Footprint::intersection`]).
pub fn intersection(a: &Footprint, b: &Footprint) -> Option<Footprint> {
    a.intersection(b)
}
