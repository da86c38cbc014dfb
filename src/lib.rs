//! Region quadtree spatial index, and a small catalog service of map projects built on it.
//!
//! [`spatial`] holds the index: [`Region`] rectangles and the [`QuadTree`] over any
//! [`SpatialPoint`]. [`catalog`] keeps projects behind a lock and answers viewport,
//! attribute and name queries; [`http`] exposes the catalog as a JSON API.

pub mod error;
pub mod config;
pub mod spatial;
pub mod catalog;
pub mod http;

pub use error::{Error, Result};
pub use config::{IndexConfig, ServiceConfig};
pub use spatial::{QuadTree, Region, SpatialPoint, TreeStats};
pub use catalog::{CatalogModel, Project, ProjectFilter};
