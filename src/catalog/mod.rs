pub mod project;
pub mod catalog_model;

pub use project::{Project, ProjectFilter, ProjectSite};

pub use catalog_model::CatalogModel;
