use serde::{Deserialize, Serialize};

use crate::spatial::SpatialPoint;


/// A real estate project placed on the map.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Project {
    // 0 asks the catalog to assign one
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub district: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub description: String,
}

// longitude goes to x, latitude to y
impl SpatialPoint for Project {
    #[inline]
    fn x(&self) -> f64 { self.lng }

    #[inline]
    fn y(&self) -> f64 { self.lat }
}


/// What the quadtree stores for a project: the id and the position it was indexed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectSite {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

impl ProjectSite {
    #[inline]
    pub fn same_project(a: &ProjectSite, b: &ProjectSite) -> bool {
        a.id == b.id
    }
}

impl From<&Project> for ProjectSite {
    fn from(project: &Project) -> Self {
        ProjectSite { id: project.id, x: project.x(), y: project.y() }
    }
}

impl SpatialPoint for ProjectSite {
    #[inline]
    fn x(&self) -> f64 { self.x }

    #[inline]
    fn y(&self) -> f64 { self.y }
}


/// Attribute filter, every criterion that is set must match exactly.
/// Missing and empty criteria match anything.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        fn criterion(wanted: &Option<String>, value: &str) -> bool {
            match wanted.as_deref() {
                None | Some("") => true,
                Some(wanted) => wanted == value,
            }
        }

        criterion(&self.district, &project.district)
            && criterion(&self.kind, &project.kind)
            && criterion(&self.status, &project.status)
    }
}


/// Case-insensitive substring match on the project name.
pub fn name_matches(project: &Project, needle_lowercase: &str) -> bool {
    project.name.to_lowercase().contains(needle_lowercase)
}
