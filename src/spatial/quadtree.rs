use serde::Serialize;

use crate::error::{Error, Result};
use crate::spatial::{Region, SpatialPoint};


/// Region quadtree over points of type `P`.
///
/// Every node covers a [`Region`]. A leaf keeps up to `capacity` points; when one more
/// arrives and the node is shallower than `max_depth` it splits into four quadrants
/// (NE, NW, SE, SW) and hands its points down. Leaves at `max_depth` never split and
/// grow without bound.
///
/// The tree only grows: removing points never merges quadrants back, so a long lived
/// tree under heavy churn accumulates empty nodes. Call [`QuadTree::prune`] to release them.
///
/// Not synchronized. Concurrent users must guard the whole tree with one lock.
#[derive(Debug, Clone)]
pub struct QuadTree<P> {
    region: Region,
    capacity: usize,
    max_depth: usize,
    depth: usize,
    content: TreeData<P>,   // points or quads
}

#[derive(Debug, Clone)]
enum TreeData<P> {
    Points(Vec<P>),
    Quads(Box<[QuadTree<P>; 4]>),   // ne, nw, se, sw
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub points: usize,
    pub depth: usize,   // deepest node
}


impl<P: SpatialPoint> QuadTree<P> {
    pub fn new(region: Region, capacity: usize, max_depth: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity)
        }

        Ok(Self::node(region, capacity, max_depth, 0))
    }

    fn node(region: Region, capacity: usize, max_depth: usize, depth: usize) -> Self {
        QuadTree {
            region,
            capacity,
            max_depth,
            depth,
            content: TreeData::Points(Vec::new()),
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_divided(&self) -> bool {
        matches!(self.content, TreeData::Quads(_))
    }

    /// Stores `point`. Returns `false`, leaving the tree untouched, when the point lies
    /// outside the region of this node.
    pub fn insert(&mut self, point: P) -> bool {
        if !self.region.contains(&point) {
            return false
        }

        self.insert_contained(point);
        true
    }

    // the caller has checked that the point is inside `self.region`
    fn insert_contained(&mut self, point: P) {
        let must_split = match &self.content {
            TreeData::Points(points) => points.len() >= self.capacity && self.depth < self.max_depth,
            TreeData::Quads(_) => false,
        };

        // a region too small to quarter keeps growing like a leaf at max depth
        if must_split {
            self.subdivide();
        }

        match &mut self.content {
            TreeData::Points(points) => points.push(point),

            TreeData::Quads(quads) => {
                // quadrants share their edges, so exactly one of them owns the point
                let index = self.region.quadrant(point.x(), point.y());
                debug_assert!(quads[index].region.contains(&point));
                quads[index].insert_contained(point);
            }
        }
    }

    // leaves the node as it is when the region cannot be quartered
    fn subdivide(&mut self) {
        let regions = match self.region.quarter() {
            Some(regions) => regions,
            None => return,
        };

        let (capacity, max_depth, depth) = (self.capacity, self.max_depth, self.depth + 1);
        let quads = Box::new(regions.map(|region| Self::node(region, capacity, max_depth, depth)));

        let content = std::mem::replace(&mut self.content, TreeData::Quads(quads));
        if let TreeData::Points(points) = content {
            for point in points {
                self.insert_contained(point);
            }
        }
    }

    /// Every stored point that `range` contains (half-open).
    ///
    /// Subtrees are skipped only when their region does not intersect `range`. The order
    /// of the result is an artifact of the tree shape and carries no meaning.
    pub fn query(&self, range: &Region) -> Vec<&P> {
        let mut result = Vec::new();
        self.query_into(range, &mut result);
        result
    }

    pub fn query_into<'a>(&'a self, range: &Region, result: &mut Vec<&'a P>) {
        if !self.region.intersects(range) {
            return
        }

        match &self.content {
            TreeData::Points(points) => {
                result.extend(points.iter().filter(|point| range.contains(*point)));
            }

            TreeData::Quads(quads) => {
                for node in quads.iter() {
                    node.query_into(range, result);
                }
            }
        }
    }

    /// Removes one stored point for which `equals(stored, point)` holds.
    ///
    /// Only the subtree whose region contains `point` is searched, so the probe must carry
    /// the coordinates the stored point was inserted with. Emptied quadrants stay in place.
    pub fn remove_by<F>(&mut self, point: &P, equals: F) -> bool
    where
        F: Fn(&P, &P) -> bool,
    {
        self.remove_with(point, &equals)
    }

    pub fn remove_eq(&mut self, point: &P) -> bool
    where
        P: PartialEq,
    {
        self.remove_with(point, &|stored: &P, point: &P| stored == point)
    }

    fn remove_with<F>(&mut self, point: &P, equals: &F) -> bool
    where
        F: Fn(&P, &P) -> bool,
    {
        if !self.region.contains(point) {
            return false
        }

        match &mut self.content {
            TreeData::Points(points) => {
                match points.iter().position(|stored| equals(stored, point)) {
                    Some(pos) => {
                        points.remove(pos);
                        true
                    }
                    None => false,
                }
            }

            TreeData::Quads(quads) => quads.iter_mut().any(|node| node.remove_with(point, equals)),
        }
    }

    /// Every stored point accepted by `predicate`, regardless of position.
    pub fn filter<F>(&self, predicate: F) -> Vec<&P>
    where
        F: Fn(&P) -> bool,
    {
        let mut result = Vec::new();
        self.visit(&mut |point| {
            if predicate(point) {
                result.push(point);
            }
        });
        result
    }

    pub fn all_points(&self) -> Vec<&P> {
        let mut result = Vec::with_capacity(self.len());
        self.visit(&mut |point| result.push(point));
        result
    }

    // depth first, local points before ne, nw, se, sw
    fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a P),
    {
        match &self.content {
            TreeData::Points(points) => points.iter().for_each(|point| f(point)),

            TreeData::Quads(quads) => {
                for node in quads.iter() {
                    node.visit(f);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.content {
            TreeData::Points(points) => points.len(),
            TreeData::Quads(quads) => quads.iter().map(|node| node.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TreeStats {
        match &self.content {
            TreeData::Points(points) => TreeStats {
                nodes: 1,
                leaves: 1,
                points: points.len(),
                depth: self.depth,
            },

            TreeData::Quads(quads) => {
                quads.iter().map(|node| node.stats()).fold(
                    TreeStats { nodes: 1, depth: self.depth, ..TreeStats::default() },
                    |acc, child| TreeStats {
                        nodes: acc.nodes + child.nodes,
                        leaves: acc.leaves + child.leaves,
                        points: acc.points + child.points,
                        depth: acc.depth.max(child.depth),
                    },
                )
            }
        }
    }

    /// Collapses every subdivided node whose subtree holds no points back into an empty
    /// leaf. Returns the number of released nodes. Query results are unaffected.
    pub fn prune(&mut self) -> usize {
        let quads = match &mut self.content {
            TreeData::Points(_) => return 0,
            TreeData::Quads(quads) => quads,
        };

        let mut released: usize = quads.iter_mut().map(|node| node.prune()).sum();

        let empty = quads.iter().all(|node| {
            matches!(&node.content, TreeData::Points(points) if points.is_empty())
        });
        if empty {
            self.content = TreeData::Points(Vec::new());
            released += 4;
        }

        released
    }

    /// Drops all points and quadrants, keeping region, capacity and max depth.
    pub fn clear(&mut self) {
        self.content = TreeData::Points(Vec::new());
    }
}
