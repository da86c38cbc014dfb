use thiserror::Error;


#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid region extents {width}x{height}, both must be finite and positive")]
    InvalidRegion { width: f64, height: f64 },

    #[error("node capacity must be at least 1")]
    ZeroCapacity,

    #[error("cannot derive bounds from an empty point set")]
    EmptyBounds,

    #[error("project {id} at ({lng}, {lat}) lies outside the indexed area")]
    OutOfBounds { id: u64, lng: f64, lat: f64 },

    #[error("every project id is taken")]
    IdsExhausted,

    #[error("invalid bounds \"{0}\", expected min_x,min_y,max_x,max_y")]
    InvalidBounds(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
