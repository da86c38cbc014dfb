pub mod region;
pub mod quadtree;

pub use region::Region;
pub use quadtree::{QuadTree, TreeStats};


/// Anything that has a position on the flat `x`/`y` plane of the index.
pub trait SpatialPoint {
    fn x(&self) -> f64;
    fn y(&self) -> f64;
}

impl SpatialPoint for (f64, f64) {
    #[inline]
    fn x(&self) -> f64 { self.0 }

    #[inline]
    fn y(&self) -> f64 { self.1 }
}

impl<P: SpatialPoint + ?Sized> SpatialPoint for &P {
    #[inline]
    fn x(&self) -> f64 { (**self).x() }

    #[inline]
    fn y(&self) -> f64 { (**self).y() }
}
