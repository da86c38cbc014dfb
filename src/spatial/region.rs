use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spatial::SpatialPoint;


/// Axis-aligned rectangle, used both as the territory of a tree node and as a query shape.
///
/// The rectangle covers `[min_x, max_x) x [min_y, max_y)`: a point on the left or top edge
/// belongs to it, a point on the right or bottom edge belongs to the neighbour.
/// Edges are stored rather than recomputed from the center, so the quadrants produced by
/// [`Region::quarter`] share bit-identical edges with each other and with their parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    min_x: f64,     // min_x <= x
    min_y: f64,     // min_y <= y
    max_x: f64,     // max_x > x
    max_y: f64,     // max_y > y
}

/*
    quadrants, y grows downwards
 nw 1 | 0  ne
    -----
 sw 3 | 2  se
 */
pub const NE: usize = 0;
pub const NW: usize = 1;
pub const SE: usize = 2;
pub const SW: usize = 3;


impl Region {
    /// Rectangle centered at `(center_x, center_y)` spanning `width` x `height`.
    pub fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0)
            || !(center_x.is_finite() && center_y.is_finite()) {
            return Err(Error::InvalidRegion { width, height })
        }

        Self::from_bounds(
            center_x - width / 2.0,
            center_y - height / 2.0,
            center_x + width / 2.0,
            center_y + height / 2.0,
        )
    }

    pub fn from_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let (width, height) = (max_x - min_x, max_y - min_y);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(Error::InvalidRegion { width, height })
        }

        Ok(Region { min_x, min_y, max_x, max_y })
    }

    /// Translates a visible map viewport (longitude/latitude edges) into a region.
    pub fn from_viewport(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        Self::new(
            (east + west) / 2.0,
            (north + south) / 2.0,
            east - west,
            north - south,
        )
    }

    /// Bounding box of `points`, scaled around its center by `1 + margin`.
    ///
    /// A degenerate axis (all points share a coordinate) gets a unit extent. With a positive
    /// `margin` every point, including those on the maximum edges, ends up inside.
    pub fn covering<'a, P, I>(points: I, margin: f64) -> Result<Self>
    where
        P: SpatialPoint + 'a,
        I: IntoIterator<Item = &'a P>,
    {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for point in points {
            min_x = min_x.min(point.x());
            min_y = min_y.min(point.y());
            max_x = max_x.max(point.x());
            max_y = max_y.max(point.y());
        }

        if min_x > max_x || min_y > max_y {
            return Err(Error::EmptyBounds)
        }

        let width = match max_x - min_x { w if w > 0.0 => w * (1.0 + margin), _ => 1.0 };
        let height = match max_y - min_y { h if h > 0.0 => h * (1.0 + margin), _ => 1.0 };

        Self::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0, width, height)
    }

    #[inline]
    pub fn min_x(&self) -> f64 { self.min_x }

    #[inline]
    pub fn min_y(&self) -> f64 { self.min_y }

    #[inline]
    pub fn max_x(&self) -> f64 { self.max_x }

    #[inline]
    pub fn max_y(&self) -> f64 { self.max_y }

    #[inline]
    pub fn width(&self) -> f64 { self.max_x - self.min_x }

    #[inline]
    pub fn height(&self) -> f64 { self.max_y - self.min_y }

    #[inline]
    pub fn center_x(&self) -> f64 { self.min_x + self.width() / 2.0 }

    #[inline]
    pub fn center_y(&self) -> f64 { self.min_y + self.height() / 2.0 }

    /// Half-open containment test.
    #[inline]
    pub fn contains<P: SpatialPoint + ?Sized>(&self, point: &P) -> bool {
        self.contains_xy(point.x(), point.y())
    }

    #[inline]
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Closed overlap test: rectangles that only touch along an edge intersect.
    ///
    /// Used to decide whether a subtree can hold matches, so it must never be stricter
    /// than [`Region::contains`].
    #[inline]
    pub fn intersects(&self, other: &Region) -> bool {
        !(other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    /// Index of the quadrant that owns `(x, y)`, for a point this region contains.
    #[inline]
    pub fn quadrant(&self, x: f64, y: f64) -> usize {
        let mid_x = self.center_x();
        let mid_y = self.center_y();
        if x < mid_x {
            if y < mid_y { NW } else { SW }
        } else if y < mid_y {
            NE
        } else {
            SE
        }
    }

    /// Splits into `[NE, NW, SE, SW]`, or `None` when floating point can't produce four
    /// non-empty quadrants any more.
    pub fn quarter(&self) -> Option<[Region; 4]> {
        let mid_x = self.center_x();
        let mid_y = self.center_y();

        if !(self.min_x < mid_x && mid_x < self.max_x && self.min_y < mid_y && mid_y < self.max_y) {
            return None
        }

        let Region { min_x, min_y, max_x, max_y } = *self;
        Some([
            Region { min_x: mid_x, min_y, max_x, max_y: mid_y },            // ne
            Region { min_x, min_y, max_x: mid_x, max_y: mid_y },            // nw
            Region { min_x: mid_x, min_y: mid_y, max_x, max_y },            // se
            Region { min_x, min_y: mid_y, max_x: mid_x, max_y },            // sw
        ])
    }
}
