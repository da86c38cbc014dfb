use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spatial::Region;


pub const DEFAULT_CAPACITY: usize = 4;
pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_PORT: u16 = 3000;

/// margin added around the projects when the indexed area is derived from them
pub const COVERING_MARGIN: f64 = 0.1;


/// Shape of the quadtree behind a catalog.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    // None: derived from the loaded projects, or the whole lng/lat plane when there are none
    #[serde(default)]
    pub bounds: Option<Region>,
}

fn default_capacity() -> usize { DEFAULT_CAPACITY }

fn default_max_depth() -> usize { DEFAULT_MAX_DEPTH }

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            capacity: DEFAULT_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            bounds: None,
        }
    }
}


#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub catalog: Option<PathBuf>,
    pub index: IndexConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            addr: ([127, 0, 0, 1], DEFAULT_PORT).into(),
            catalog: None,
            index: IndexConfig::default(),
        }
    }
}


/// Parses `min_x,min_y,max_x,max_y`.
pub fn parse_bounds(text: &str) -> Result<Region> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|_| Error::InvalidBounds(text.to_string()))?;

    match values.as_slice() {
        &[min_x, min_y, max_x, max_y] => Region::from_bounds(min_x, min_y, max_x, max_y),
        _ => Err(Error::InvalidBounds(text.to_string())),
    }
}
