pub mod server;

pub use server::{spawn_service, ApiHandler, ApiRequest, ApiResponse, ServerControl};
