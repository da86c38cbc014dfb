use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use log::{debug, info, warn};

use crate::catalog::project::{name_matches, Project, ProjectFilter, ProjectSite};
use crate::config::{IndexConfig, COVERING_MARGIN};
use crate::error::{Error, Result};
use crate::spatial::{QuadTree, Region, TreeStats};


/// Projects and the quadtree over their positions.
///
/// The tree itself is not synchronized; the whole index sits behind one `RwLock`, so a
/// query never sees a half finished insert or subdivision.
pub struct CatalogModel {
    index: RwLock<CatalogIndex>,
}

struct CatalogIndex {
    tree: QuadTree<ProjectSite>,
    projects: HashMap<u64, Project>,
    next_id: u64,
}

type ReadIndex<'a> = RwLockReadGuard<'a, CatalogIndex>;
type WriteIndex<'a> = RwLockWriteGuard<'a, CatalogIndex>;


impl CatalogIndex {
    fn new(region: Region, config: &IndexConfig) -> Result<Self> {
        Ok(CatalogIndex {
            tree: QuadTree::new(region, config.capacity, config.max_depth)?,
            projects: HashMap::new(),
            next_id: 1,
        })
    }

    fn check_position(&self, project: &Project) -> Result<()> {
        if self.tree.region().contains(project) {
            Ok(())
        } else {
            Err(Error::OutOfBounds { id: project.id, lng: project.lng, lat: project.lat })
        }
    }

    // an assigned id never names a stored project; once the counter is used up (0) the lowest
    // free id is taken
    fn assign_id(&mut self) -> Result<u64> {
        let id = if self.next_id != 0 && !self.projects.contains_key(&self.next_id) {
            Some(self.next_id)
        } else {
            (1..=u64::MAX).find(|id| !self.projects.contains_key(id))
        };

        let id = id.ok_or(Error::IdsExhausted)?;
        self.next_id = id.checked_add(1).unwrap_or(0);
        Ok(id)
    }

    // position already checked
    fn insert(&mut self, mut project: Project) -> Result<u64> {
        if project.id == 0 {
            project.id = self.assign_id()?;
        } else if let Some(next) = project.id.checked_add(1) {
            self.next_id = self.next_id.max(next);
        }
        let id = project.id;

        // a known id moves: drop the old site before indexing the new one
        if let Some(old) = self.projects.remove(&id) {
            self.tree.remove_by(&ProjectSite::from(&old), ProjectSite::same_project);
        }

        self.tree.insert(ProjectSite::from(&project));
        self.projects.insert(id, project);
        Ok(id)
    }

    fn delete(&mut self, id: u64) -> bool {
        match self.projects.remove(&id) {
            Some(project) => self.tree.remove_by(&ProjectSite::from(&project), ProjectSite::same_project),
            None => false,
        }
    }

    fn resolve<'a, I>(&self, sites: I) -> Vec<Project>
    where
        I: IntoIterator<Item = &'a ProjectSite>,
    {
        let mut projects: Vec<Project> = sites
            .into_iter()
            .filter_map(|site| self.projects.get(&site.id).cloned())
            .collect();
        projects.sort_by_key(|project| project.id);
        projects
    }
}


impl CatalogModel {
    /// Empty catalog. Without configured bounds it covers the whole lng/lat plane, the
    /// 180th meridian and the north pole included.
    pub fn new(config: IndexConfig) -> Result<Self> {
        Self::from_projects(Vec::new(), config)
    }

    /// Catalog over `projects`. Without configured bounds the indexed area is the bounding box
    /// of the projects plus a margin.
    pub fn from_projects(projects: Vec<Project>, config: IndexConfig) -> Result<Self> {
        let region = match config.bounds {
            // revalidate, bounds may come straight from a deserialized config
            Some(bounds) => Region::from_bounds(bounds.min_x(), bounds.min_y(), bounds.max_x(), bounds.max_y())?,
            None if projects.is_empty() => Region::from_bounds(-180.0, -90.0, just_above(180.0), just_above(90.0))?,
            None => Region::covering(projects.iter(), COVERING_MARGIN)?,
        };

        let mut index = CatalogIndex::new(region, &config)?;
        for project in &projects {
            index.check_position(project)?;
        }
        for project in projects {
            index.insert(project)?;
        }

        info!("catalog indexes {} projects over ({}, {}) - ({}, {})", index.projects.len(),
            region.min_x(), region.min_y(), region.max_x(), region.max_y());

        Ok(CatalogModel {
            index: RwLock::new(index),
        })
    }

    pub fn from_json(json: &str, config: IndexConfig) -> Result<Self> {
        let projects: Vec<Project> = serde_json::from_str(json)?;
        Self::from_projects(projects, config)
    }

    /// Reads a JSON array of projects.
    pub fn load<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        let start = Instant::now();
        let json = fs::read_to_string(path.as_ref())?;
        let model = Self::from_json(&json, config)?;
        info!("loaded {} in {:?}", path.as_ref().display(), start.elapsed());
        Ok(model)
    }

    // a panic while holding the lock leaves the index consistent, each mutation is a few
    // infallible steps, so a poisoned lock is still usable
    fn read_index(&self) -> ReadIndex {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> WriteIndex {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn region(&self) -> Region {
        *self.read_index().tree.region()
    }

    /// Adds a project, or replaces the one with the same id. Returns the id, assigned when the
    /// project came with id 0.
    pub fn insert_project(&self, project: Project) -> Result<u64> {
        let mut index = self.write_index();
        index.check_position(&project)?;
        let id = index.insert(project)?;
        debug!("project {id} indexed");
        Ok(id)
    }

    /// Adds all projects or, when any of them is outside the indexed area, none. Running out of
    /// ids stops the batch part way.
    pub fn insert_projects(&self, projects: Vec<Project>) -> Result<Vec<u64>> {
        let mut index = self.write_index();
        for project in &projects {
            index.check_position(project)?;
        }

        projects.into_iter().map(|project| index.insert(project)).collect()
    }

    pub fn delete_project(&self, id: u64) -> bool {
        self.write_index().delete(id)
    }

    /// Deletes a batch and then releases the quadrants it emptied.
    pub fn delete_projects(&self, ids: &[u64]) -> usize {
        let mut index = self.write_index();
        let deleted = ids.iter().filter(|&&id| index.delete(id)).count();
        let released = index.tree.prune();
        if deleted < ids.len() {
            warn!("{} of {} projects to delete were not found", ids.len() - deleted, ids.len());
        }
        debug!("deleted {deleted} projects, released {released} nodes");
        deleted
    }

    pub fn get(&self, id: u64) -> Option<Project> {
        self.read_index().projects.get(&id).cloned()
    }

    /// Projects inside `range`, sorted by id.
    pub fn query(&self, range: &Region) -> Vec<Project> {
        let start = Instant::now();
        let index = self.read_index();
        let projects = index.resolve(index.tree.query(range));
        debug!("({}, {})-({}, {}) found {} projects at {:?}", range.min_x(), range.min_y(),
            range.max_x(), range.max_y(), projects.len(), start.elapsed());
        projects
    }

    pub fn query_viewport(&self, west: f64, south: f64, east: f64, north: f64) -> Result<Vec<Project>> {
        Ok(self.query(&Region::from_viewport(west, south, east, north)?))
    }

    pub fn filter(&self, filter: &ProjectFilter) -> Vec<Project> {
        let index = self.read_index();
        let sites = index.tree.filter(|site| {
            index.projects.get(&site.id).map_or(false, |project| filter.matches(project))
        });
        index.resolve(sites)
    }

    /// Projects whose name contains `text`, ignoring case. Blank text returns everything.
    pub fn search(&self, text: &str) -> Vec<Project> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.all()
        }

        let index = self.read_index();
        let sites = index.tree.filter(|site| {
            index.projects.get(&site.id).map_or(false, |project| name_matches(project, &needle))
        });
        index.resolve(sites)
    }

    pub fn all(&self) -> Vec<Project> {
        let index = self.read_index();
        index.resolve(index.tree.all_points())
    }

    pub fn clear(&self) {
        let mut index = self.write_index();
        index.tree.clear();
        index.projects.clear();
        index.next_id = 1;
    }

    pub fn len(&self) -> usize {
        self.read_index().projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree shape. `points` is the project count, both read under the same lock.
    pub fn stats(&self) -> TreeStats {
        self.read_index().tree.stats()
    }
}


// smallest f64 above a positive finite `value`, so the half-open region keeps `value` itself
fn just_above(value: f64) -> f64 {
    debug_assert!(value.is_finite() && value > 0.0);
    f64::from_bits(value.to_bits() + 1)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: u64, name: &str, lng: f64, lat: f64) -> Project {
        Project {
            id,
            name: name.to_string(),
            district: "miraflores".to_string(),
            kind: "residencial".to_string(),
            status: "planos".to_string(),
            lat,
            lng,
            description: String::new(),
        }
    }

    fn model() -> CatalogModel {
        let config = IndexConfig {
            bounds: Some(Region::from_bounds(-78.0, -13.0, -76.0, -11.0).unwrap()),
            ..IndexConfig::default()
        };
        CatalogModel::new(config).unwrap()
    }

    #[test]
    fn test_assigns_ids() {
        let model = model();
        assert_eq!(model.insert_project(project(0, "a", -77.0, -12.0)).unwrap(), 1);
        assert_eq!(model.insert_project(project(10, "b", -77.0, -12.0)).unwrap(), 10);
        assert_eq!(model.insert_project(project(0, "c", -77.0, -12.0)).unwrap(), 11);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_assigned_ids_never_replace_a_project() {
        let model = model();
        assert_eq!(model.insert_project(project(u64::MAX, "last", -77.0, -12.0)).unwrap(), u64::MAX);

        let second = model.insert_project(project(0, "second", -77.1, -12.1)).unwrap();
        let third = model.insert_project(project(0, "third", -77.2, -12.2)).unwrap();
        assert_eq!((second, third), (1, 2));

        assert_eq!(model.len(), 3);
        assert_eq!(model.get(u64::MAX).unwrap().name, "last");
        assert_eq!(model.stats().points, 3);
    }

    #[test]
    fn test_counter_running_out_reuses_free_ids() {
        let model = model();
        model.insert_project(project(u64::MAX - 1, "a", -77.0, -12.0)).unwrap();

        assert_eq!(model.insert_project(project(0, "b", -77.0, -12.0)).unwrap(), u64::MAX);
        assert_eq!(model.insert_project(project(0, "c", -77.0, -12.0)).unwrap(), 1);
        assert_eq!(model.insert_project(project(0, "d", -77.0, -12.0)).unwrap(), 2);
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn test_reinsert_moves_project() {
        let model = model();
        model.insert_project(project(1, "a", -77.5, -12.5)).unwrap();
        model.insert_project(project(1, "a", -76.5, -11.5)).unwrap();

        assert_eq!(model.len(), 1);
        assert_eq!(model.stats().points, 1);
        assert!(model.query_viewport(-78.0, -13.0, -77.0, -12.0).unwrap().is_empty());
        assert_eq!(model.query_viewport(-77.0, -12.0, -76.0, -11.0).unwrap().len(), 1);
    }

    #[test]
    fn test_out_of_bounds_batch_is_rejected_whole() {
        let model = model();
        let batch = vec![project(1, "in", -77.0, -12.0), project(2, "out", -70.0, -12.0)];

        assert!(matches!(model.insert_projects(batch), Err(Error::OutOfBounds { id: 2, .. })));
        assert!(model.is_empty());
    }

    #[test]
    fn test_delete_and_prune() {
        let model = model();
        let batch = (1..=20).map(|i| project(i, "p", -77.5 + i as f64 * 0.01, -12.5)).collect();
        model.insert_projects(batch).unwrap();
        assert!(model.stats().nodes > 1);

        assert!(model.delete_project(1));
        assert!(!model.delete_project(1));

        let ids: Vec<u64> = (2..=20).chain([99]).collect();
        assert_eq!(model.delete_projects(&ids), 19);
        assert!(model.is_empty());
        assert_eq!(model.stats().nodes, 1);
    }

    #[test]
    fn test_empty_catalog_covers_the_globe() {
        let model = CatalogModel::new(IndexConfig::default()).unwrap();
        assert!(model.insert_project(project(0, "somewhere", 151.2, -33.9)).is_ok());
        assert!(model.insert_project(project(0, "nowhere", 181.0, 0.0)).is_err());
    }

    #[test]
    fn test_empty_catalog_keeps_the_globe_edges() {
        let model = CatalogModel::new(IndexConfig::default()).unwrap();
        for (lng, lat) in [(180.0, 0.0), (0.0, 90.0), (180.0, 90.0), (-180.0, -90.0)] {
            assert!(model.insert_project(project(0, "edge", lng, lat)).is_ok(), "({lng}, {lat})");
        }
        assert_eq!(model.query(&model.region()).len(), 4);
        assert!(model.insert_project(project(0, "past the pole", 0.0, 90.0001)).is_err());
    }

    #[test]
    fn test_clear_resets_ids() {
        let model = model();
        model.insert_project(project(5, "a", -77.0, -12.0)).unwrap();
        model.clear();

        assert!(model.is_empty());
        assert!(model.all().is_empty());
        assert_eq!(model.insert_project(project(0, "b", -77.0, -12.0)).unwrap(), 1);
    }
}
