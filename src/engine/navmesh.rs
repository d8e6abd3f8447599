// Navigation mesh of rectangular free-space nodes.
//
// The nodes always partition `bounds` minus the walls: no gaps, no overlaps.
// Two nodes are neighbours when they share a true edge segment (touching
// corners do not count); the shared segment is stored on both sides.
//
// Nodes live in an arena addressed by `NavNodeId`. Removed slots are reused,
// so an id is only meaningful until the next wall change.
//
// Carving (add_wall): the wall's sides are first snapped onto node edges
// closer than OVERLAP_EPSILON, giving the area it occupies. Every node that
// area overlaps is replaced by up to four slivers around the overlap, wired
// to the old node's neighbours that still touch them.
// Restoring (remove_wall): the occupied area becomes new nodes, which are then
// greedily merged with neighbours whenever the union is a rectangle.

use std::collections::HashMap;

use glam::Vec2;
use log::{debug, warn};
use rand::Rng;

use super::error::NavError;
use super::geometry::{
    Line, OVERLAP_EPSILON, Rect, closest_point_in_rect, move_rect, point_rect_distance,
    segment_enters_rect, vec_intersect_region, vec_overlap,
};
use super::pathfinding::PathSmoothing;
use super::quadtree::{DEFAULT_MAX_DEPTH, DEFAULT_NODE_CAPACITY, QuadTree, QuadTreeConfig, Spatial};

/// How far a wall is shrunk before testing a segment against it, so paths may
/// run along wall edges and through wall corners.
const GRAZE_TOLERANCE: f32 = 0.05;

// ============================================================================
// IDS / NODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NavNodeId(usize);

impl NavNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallId(u64);

/// One free-space rectangle and the borders it shares with its neighbours.
#[derive(Debug, Clone)]
pub struct NavNode {
    rect: Rect,
    neighbors: HashMap<NavNodeId, Line>,
}

impl NavNode {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn neighbors(&self) -> impl Iterator<Item = (NavNodeId, &Line)> {
        self.neighbors.iter().map(|(id, line)| (*id, line))
    }

    /// Neighbours ordered by id.
    pub fn sorted_neighbors(&self) -> Vec<(NavNodeId, Line)> {
        let mut out: Vec<_> = self.neighbors.iter().map(|(id, line)| (*id, *line)).collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_next_to(&self, other: NavNodeId) -> bool {
        self.neighbors.contains_key(&other)
    }

    pub fn border_with(&self, other: NavNodeId) -> Option<Line> {
        self.neighbors.get(&other).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct NodeEntry {
    id: NavNodeId,
    rect: Rect,
}

impl Spatial for NodeEntry {
    fn bounding_rect(&self) -> Rect {
        self.rect
    }

    fn is_same(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// `rect` is the wall as added (its identity for `remove_wall`), `area` the
/// snapped region actually taken out of the free space.
#[derive(Debug, Clone, Copy)]
struct WallEntry {
    id: WallId,
    rect: Rect,
    area: Rect,
}

impl Spatial for WallEntry {
    fn bounding_rect(&self) -> Rect {
        self.area
    }

    fn is_same(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// ============================================================================
// RECT HELPERS
// ============================================================================

/// The edge segment two rectangles share, if they touch along a positive length.
pub fn shared_border(a: &Rect, b: &Rect) -> Option<Line> {
    let a = a.abs();
    let b = b.abs();

    let x = if (a.right() - b.x).abs() <= OVERLAP_EPSILON {
        Some(b.x)
    } else if (b.right() - a.x).abs() <= OVERLAP_EPSILON {
        Some(a.x)
    } else {
        None
    };
    if let Some(x) = x {
        let y0 = a.y.max(b.y);
        let y1 = a.bottom().min(b.bottom());
        if y1 - y0 > OVERLAP_EPSILON {
            return Some(Line::new(Vec2::new(x, y0), Vec2::new(x, y1)));
        }
    }

    let y = if (a.bottom() - b.y).abs() <= OVERLAP_EPSILON {
        Some(b.y)
    } else if (b.bottom() - a.y).abs() <= OVERLAP_EPSILON {
        Some(a.y)
    } else {
        None
    };
    if let Some(y) = y {
        let x0 = a.x.max(b.x);
        let x1 = a.right().min(b.right());
        if x1 - x0 > OVERLAP_EPSILON {
            return Some(Line::new(Vec2::new(x0, y), Vec2::new(x1, y)));
        }
    }
    None
}

/// `rect` minus `cut` (which must lie inside it) as up to four rectangles:
/// full-height left and right slivers, then top and bottom between them.
pub fn carve(rect: &Rect, cut: &Rect) -> Vec<Rect> {
    let left = Rect::from_corners(rect.pos(), Vec2::new(cut.x, rect.bottom()));
    let right = Rect::from_corners(Vec2::new(cut.right(), rect.y), rect.max());
    let top = Rect::from_corners(Vec2::new(cut.x, rect.y), Vec2::new(cut.right(), cut.y));
    let bottom = Rect::from_corners(Vec2::new(cut.x, cut.bottom()), Vec2::new(cut.right(), rect.bottom()));
    [left, top, right, bottom]
        .into_iter()
        .filter(|p| p.width > OVERLAP_EPSILON && p.height > OVERLAP_EPSILON)
        .collect()
}

/// Union of two rectangles if it is itself a rectangle (equal span on one
/// axis, touching on the other).
fn mergeable(a: &Rect, b: &Rect) -> Option<Rect> {
    let close = |p: f32, q: f32| (p - q).abs() <= OVERLAP_EPSILON;
    let same_rows = close(a.y, b.y) && close(a.bottom(), b.bottom());
    let side_by_side = close(a.right(), b.x) || close(b.right(), a.x);
    let same_cols = close(a.x, b.x) && close(a.right(), b.right());
    let stacked = close(a.bottom(), b.y) || close(b.bottom(), a.y);
    if (same_rows && side_by_side) || (same_cols && stacked) {
        Some(Rect::from_corners(a.pos().min(b.pos()), a.max().max(b.max())))
    } else {
        None
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavMeshConfig {
    /// Leaf capacity of the node quadtree.
    pub node_capacity: usize,
    /// Leaf capacity of the wall quadtree.
    pub wall_capacity: usize,
    pub max_depth: usize,
    pub smoothing: PathSmoothing,
}

impl Default for NavMeshConfig {
    fn default() -> Self {
        Self {
            node_capacity: DEFAULT_NODE_CAPACITY,
            wall_capacity: DEFAULT_NODE_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            smoothing: PathSmoothing::default(),
        }
    }
}

// ============================================================================
// NAV MESH
// ============================================================================

pub struct NavMesh {
    bounds: Rect,
    nodes: Vec<Option<NavNode>>,
    free: Vec<usize>,
    node_count: usize,
    node_tree: QuadTree<NodeEntry>,
    wall_tree: QuadTree<WallEntry>,
    next_wall: u64,
    config: NavMeshConfig,
}

impl NavMesh {
    /// A mesh with a single free node covering `bounds`.
    pub fn new(bounds: Rect) -> Result<Self, NavError> {
        Self::with_config(bounds, NavMeshConfig::default())
    }

    pub fn with_config(bounds: Rect, config: NavMeshConfig) -> Result<Self, NavError> {
        let bounds = bounds.abs();
        if bounds.is_degenerate() {
            return Err(NavError::DegenerateBounds(bounds));
        }
        let node_cfg = QuadTreeConfig {
            capacity: config.node_capacity,
            max_depth: config.max_depth,
        };
        let wall_cfg = QuadTreeConfig {
            capacity: config.wall_capacity,
            max_depth: config.max_depth,
        };
        let mut mesh = Self {
            bounds,
            nodes: Vec::new(),
            free: Vec::new(),
            node_count: 0,
            node_tree: QuadTree::with_config(bounds, node_cfg),
            wall_tree: QuadTree::with_config(bounds, wall_cfg),
            next_wall: 0,
            config,
        };
        mesh.insert_node(bounds);
        Ok(mesh)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn config(&self) -> &NavMeshConfig {
        &self.config
    }

    pub fn set_smoothing(&mut self, smoothing: PathSmoothing) {
        self.config.smoothing = smoothing;
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn wall_count(&self) -> usize {
        self.wall_tree.len()
    }

    pub fn node(&self, id: NavNodeId) -> Option<&NavNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NavNodeId, &NavNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NavNodeId(i), n)))
    }

    /// Area each wall occupies in the mesh.
    pub fn walls(&self) -> impl Iterator<Item = Rect> + '_ {
        self.wall_tree.iter().map(|w| w.area)
    }

    pub fn is_next_to(&self, a: NavNodeId, b: NavNodeId) -> bool {
        self.node(a).is_some_and(|n| n.is_next_to(b))
    }

    pub(crate) fn rect_of(&self, id: NavNodeId) -> Option<Rect> {
        self.node(id).map(|n| n.rect)
    }

    /// Walls stored in quadtree nodes that intersect `rect` (a superset of the
    /// walls touching it).
    pub(crate) fn walls_near(&self, rect: &Rect) -> Vec<Rect> {
        let mut out = Vec::new();
        self.wall_tree.get_nearest_rect(rect, &mut out);
        out.into_iter().map(|w| w.area).collect()
    }

    // ------------------------------------------------------------------------
    // arena bookkeeping
    // ------------------------------------------------------------------------

    fn node_mut(&mut self, id: NavNodeId) -> Option<&mut NavNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn insert_node(&mut self, rect: Rect) -> NavNodeId {
        let node = NavNode {
            rect,
            neighbors: HashMap::new(),
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NavNodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NavNodeId(self.nodes.len() - 1)
            }
        };
        self.node_tree.add(NodeEntry { id, rect });
        self.node_count += 1;
        id
    }

    /// Take a node out of the mesh, deregistering it from all neighbours.
    fn remove_node(&mut self, id: NavNodeId) -> Option<NavNode> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        for other in node.neighbors.keys() {
            if let Some(n) = self.node_mut(*other) {
                n.neighbors.remove(&id);
            }
        }
        self.node_tree.remove(&NodeEntry { id, rect: node.rect });
        self.free.push(id.0);
        self.node_count -= 1;
        Some(node)
    }

    /// Register `a` and `b` as neighbours if they share an edge.
    fn link(&mut self, a: NavNodeId, b: NavNodeId) -> bool {
        if a == b {
            return false;
        }
        let (Some(ra), Some(rb)) = (self.rect_of(a), self.rect_of(b)) else {
            return false;
        };
        let Some(line) = shared_border(&ra, &rb) else {
            return false;
        };
        if let Some(n) = self.node_mut(a) {
            n.neighbors.insert(b, line);
        }
        if let Some(n) = self.node_mut(b) {
            n.neighbors.insert(a, line);
        }
        true
    }

    fn unlink(&mut self, a: NavNodeId, b: NavNodeId) {
        if let Some(n) = self.node_mut(a) {
            n.neighbors.remove(&b);
        }
        if let Some(n) = self.node_mut(b) {
            n.neighbors.remove(&a);
        }
    }

    fn nodes_in(&self, rect: &Rect) -> Vec<NavNodeId> {
        let mut out = Vec::new();
        self.node_tree.get_nearest_rect(rect, &mut out);
        let mut ids: Vec<NavNodeId> = out.into_iter().map(|e| e.id).collect();
        ids.sort();
        ids
    }

    // ------------------------------------------------------------------------
    // walls
    // ------------------------------------------------------------------------

    /// Carve a wall out of the free space.
    pub fn add_wall(&mut self, rect: Rect) -> WallId {
        let rect = rect.abs();
        let id = WallId(self.next_wall);
        self.next_wall += 1;
        let area = self.snap_to_nodes(rect);
        self.wall_tree.add(WallEntry { id, rect, area });

        let hit: Vec<NavNodeId> = self
            .nodes_in(&area)
            .into_iter()
            .filter(|n| self.rect_of(*n).is_some_and(|r| vec_overlap(&r, &area)))
            .collect();
        for node in &hit {
            self.split_node(*node, &area);
        }
        debug!(
            "wall {:?} added at {:?}: split {} nodes, {} nodes now",
            id,
            rect,
            hit.len(),
            self.node_count
        );
        id
    }

    /// `wall` with each side moved onto a node edge closer than
    /// `OVERLAP_EPSILON`, so carving never leaves a sliver too thin to keep.
    fn snap_to_nodes(&self, wall: Rect) -> Rect {
        let near: Vec<Rect> = self
            .nodes_in(&wall.expand(OVERLAP_EPSILON * 2.0))
            .into_iter()
            .filter_map(|id| self.rect_of(id))
            .collect();
        let xs: Vec<f32> = near.iter().flat_map(|r| [r.x, r.right()]).collect();
        let ys: Vec<f32> = near.iter().flat_map(|r| [r.y, r.bottom()]).collect();
        let snap = |v: f32, edges: &[f32]| {
            edges
                .iter()
                .copied()
                .find(|e| (v - e).abs() <= OVERLAP_EPSILON)
                .unwrap_or(v)
        };
        Rect::from_corners(
            Vec2::new(snap(wall.x, &xs), snap(wall.y, &ys)),
            Vec2::new(snap(wall.right(), &xs), snap(wall.bottom(), &ys)),
        )
    }

    /// Replace `id` by the parts of it the wall does not cover.
    fn split_node(&mut self, id: NavNodeId, wall: &Rect) {
        let Some(rect) = self.rect_of(id) else {
            return;
        };
        let cut = vec_intersect_region(&rect, wall);
        let pieces = carve(&rect, &cut);
        let Some(old) = self.remove_node(id) else {
            return;
        };
        let former: Vec<NavNodeId> = old.neighbors.keys().copied().collect();
        let created: Vec<NavNodeId> = pieces.into_iter().map(|r| self.insert_node(r)).collect();
        for (i, &a) in created.iter().enumerate() {
            for &b in &created[i + 1..] {
                self.link(a, b);
            }
            for &n in &former {
                self.link(a, n);
            }
        }
    }

    /// Give a wall's area back to the free space. Returns `false` if no wall
    /// with exactly this rectangle exists.
    pub fn remove_wall(&mut self, rect: &Rect) -> bool {
        let rect = rect.abs();
        let entry = {
            let mut out = Vec::new();
            self.wall_tree
                .get_nearest_rect(&rect.expand(OVERLAP_EPSILON * 2.0), &mut out);
            out.into_iter().find(|w| w.rect == rect).copied()
        };
        let Some(entry) = entry else {
            return false;
        };
        self.wall_tree.remove(&entry);

        let region = vec_intersect_region(&entry.area, &self.bounds);
        let mut freed = if region.is_degenerate() { Vec::new() } else { vec![region] };
        for other in self.walls_near(&region) {
            freed = freed
                .into_iter()
                .flat_map(|piece| {
                    if vec_overlap(&piece, &other) {
                        carve(&piece, &vec_intersect_region(&piece, &other))
                    } else {
                        vec![piece]
                    }
                })
                .collect();
        }

        let created: Vec<NavNodeId> = freed.into_iter().map(|r| self.insert_node(r)).collect();
        for &id in &created {
            self.link_surroundings(id);
        }
        self.merge_from(created);
        debug!(
            "wall {:?} removed from {:?}: {} nodes now",
            entry.id, rect, self.node_count
        );
        true
    }

    fn link_surroundings(&mut self, id: NavNodeId) {
        let Some(rect) = self.rect_of(id) else {
            return;
        };
        for other in self.nodes_in(&rect.expand(OVERLAP_EPSILON * 2.0)) {
            self.link(id, other);
        }
    }

    /// Grow nodes from the worklist by absorbing neighbours until no
    /// neighbour forms a rectangle with them.
    fn merge_from(&mut self, mut work: Vec<NavNodeId>) {
        while let Some(id) = work.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            let rect = node.rect;
            let partner = node
                .sorted_neighbors()
                .into_iter()
                .find_map(|(other, _)| {
                    let other_rect = self.rect_of(other)?;
                    mergeable(&rect, &other_rect).map(|union| (other, union))
                });
            if let Some((other, union)) = partner {
                self.merge_nodes(id, other, union);
                work.push(id);
            }
        }
    }

    /// Grow `keep` to `union`, absorbing `absorb` and its adjacency.
    fn merge_nodes(&mut self, keep: NavNodeId, absorb: NavNodeId, union: Rect) {
        let Some(absorbed) = self.remove_node(absorb) else {
            return;
        };
        let Some(old_rect) = self.rect_of(keep) else {
            return;
        };
        let kept: Vec<NavNodeId> = self
            .node(keep)
            .map(|n| n.neighbors.keys().copied().collect())
            .unwrap_or_default();
        for &n in &kept {
            self.unlink(keep, n);
        }

        self.node_tree.remove(&NodeEntry { id: keep, rect: old_rect });
        if let Some(n) = self.node_mut(keep) {
            n.rect = union;
        }
        self.node_tree.add(NodeEntry { id: keep, rect: union });

        let mut around: Vec<NavNodeId> = absorbed.neighbors.keys().copied().chain(kept).collect();
        around.sort();
        around.dedup();
        for n in around {
            self.link(keep, n);
        }
    }

    // ------------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------------

    /// Free node containing `p` (borders inclusive; lowest id on a shared border).
    pub fn node_at(&self, p: Vec2) -> Option<NavNodeId> {
        self.nodes_in(&Rect::new(p.x, p.y, 0.0, 0.0))
            .into_iter()
            .find(|id| self.rect_of(*id).is_some_and(|r| r.contains_point(p)))
    }

    /// Free node closest to `p`; the containing node when there is one.
    pub fn nearest_node(&self, p: Vec2) -> Option<NavNodeId> {
        if self.node_count == 0 || !p.is_finite() {
            return None;
        }
        if let Some(id) = self.node_at(p) {
            return Some(id);
        }
        let reach = point_rect_distance(&self.bounds, p) + self.bounds.width + self.bounds.height;
        let mut radius = (self.bounds.width.min(self.bounds.height) / 64.0).max(1.0);
        loop {
            let query = Rect::from_center(p, Vec2::splat(radius * 2.0));
            let exhaustive = radius >= reach;
            let best = self
                .nodes_in(&query)
                .into_iter()
                .filter_map(|id| Some((id, point_rect_distance(&self.rect_of(id)?, p))))
                .filter(|(_, d)| exhaustive || *d <= radius)
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            if let Some((id, _)) = best {
                return Some(id);
            }
            if exhaustive {
                return None;
            }
            radius *= 2.0;
        }
    }

    /// Closest free point to `p`.
    pub fn closest_point(&self, p: Vec2) -> Result<Vec2, NavError> {
        let Some(rect) = self.nearest_node(p).and_then(|id| self.rect_of(id)) else {
            warn!("closest_point({p:?}) on a mesh without free nodes");
            return Err(NavError::EmptyMesh);
        };
        Ok(closest_point_in_rect(&rect, p))
    }

    /// True if the segment stays inside the bounds and passes through no wall
    /// interior. Running along a wall edge is allowed.
    pub fn straight_line(&self, a: Vec2, b: Vec2) -> bool {
        let bounds = self.bounds.expand(OVERLAP_EPSILON);
        if !bounds.contains_point(a) || !bounds.contains_point(b) {
            return false;
        }
        self.walls_near(&Rect::from_corners(a, b))
            .iter()
            .all(|wall| !segment_enters_rect(a, b, &wall.expand(-GRAZE_TOLERANCE)))
    }

    /// Clamp `displacement` so `rect` slides along walls and stays in bounds.
    pub fn valid_move(&self, rect: &Rect, displacement: Vec2) -> Vec2 {
        let rect = rect.abs();
        let moved = rect.translate(displacement);
        let swept = Rect::from_corners(rect.pos().min(moved.pos()), rect.max().max(moved.max()));

        let mut walls = self.walls_near(&swept);
        let center = rect.center();
        walls.sort_by(|a, b| {
            point_rect_distance(a, center).total_cmp(&point_rect_distance(b, center))
        });
        let mut mv = displacement;
        for wall in &walls {
            mv = move_rect(&rect, wall, mv, 0.0, 0.0);
        }

        let (lo_x, hi_x) = (self.bounds.x - rect.x, self.bounds.right() - rect.right());
        if lo_x <= hi_x {
            mv.x = mv.x.clamp(lo_x, hi_x);
        }
        let (lo_y, hi_y) = (self.bounds.y - rect.y, self.bounds.bottom() - rect.bottom());
        if lo_y <= hi_y {
            mv.y = mv.y.clamp(lo_y, hi_y);
        }
        mv
    }

    /// Rect of the node under a random point between `min_dist` and
    /// `max_dist` from `origin` (clamped into the bounds). Larger nodes are
    /// picked more often.
    pub fn random_area<R: Rng + ?Sized>(
        &self,
        origin: Vec2,
        min_dist: f32,
        max_dist: f32,
        rng: &mut R,
    ) -> Result<Rect, NavError> {
        if self.node_count == 0 {
            warn!("random_area around {origin:?} on a mesh without free nodes");
            return Err(NavError::EmptyMesh);
        }
        let (lo, hi) = if min_dist <= max_dist { (min_dist, max_dist) } else { (max_dist, min_dist) };
        let dist = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
        let angle = rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        let p = closest_point_in_rect(&self.bounds, origin + Vec2::from_angle(angle) * dist);
        self.nearest_node(p)
            .and_then(|id| self.rect_of(id))
            .ok_or(NavError::EmptyMesh)
    }

    // ------------------------------------------------------------------------
    // debug traversal
    // ------------------------------------------------------------------------

    pub fn for_each_node<F: FnMut(NavNodeId, &NavNode)>(&self, mut f: F) {
        for (id, node) in self.nodes() {
            f(id, node);
        }
    }

    pub fn for_each_wall<F: FnMut(&Rect)>(&self, mut f: F) {
        for wall in self.wall_tree.iter() {
            f(&wall.area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mesh() -> NavMesh {
        NavMesh::new(Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap()
    }

    fn assert_partition(mesh: &NavMesh) {
        let bounds = mesh.bounds();
        let node_area: f32 = mesh.nodes().map(|(_, n)| n.rect().area()).sum();
        let wall_area: f32 = mesh.walls().map(|w| vec_intersect_region(&w, &bounds).area()).sum();
        assert!(
            (node_area + wall_area - bounds.area()).abs() < 1.0,
            "nodes {node_area} + walls {wall_area} != {}",
            bounds.area()
        );
        let nodes: Vec<_> = mesh.nodes().collect();
        for (i, (a, na)) in nodes.iter().enumerate() {
            for wall in mesh.walls() {
                assert!(!vec_overlap(&na.rect(), &wall), "{a:?} overlaps wall {wall:?}");
            }
            for (b, nb) in &nodes[i + 1..] {
                assert!(!vec_overlap(&na.rect(), &nb.rect()), "{a:?} overlaps {b:?}");
                let touching = shared_border(&na.rect(), &nb.rect()).is_some();
                assert_eq!(touching, na.is_next_to(*b), "{a:?} / {b:?}");
                assert_eq!(na.is_next_to(*b), nb.is_next_to(*a));
                assert_eq!(na.border_with(*b), nb.border_with(*a));
            }
        }
    }

    #[test]
    fn test_new_mesh_has_one_node() {
        let m = mesh();
        assert_eq!(m.node_count(), 1);
        assert_eq!(m.wall_count(), 0);
        assert!(NavMesh::new(Rect::new(0.0, 0.0, 0.0, 10.0)).is_err());
    }

    #[test]
    fn test_interior_wall_splits_into_four() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 400.0, 200.0, 200.0));
        assert_eq!(m.node_count(), 4);
        assert_eq!(m.wall_count(), 1);
        assert_partition(&m);
        for (_, node) in m.nodes() {
            assert_eq!(node.neighbor_count(), 2);
        }
    }

    #[test]
    fn test_edge_wall_leaves_fewer_slivers() {
        let mut m = mesh();
        m.add_wall(Rect::new(0.0, 0.0, 100.0, 1000.0));
        assert_eq!(m.node_count(), 1);
        m.add_wall(Rect::new(500.0, 0.0, 50.0, 300.0));
        assert_eq!(m.node_count(), 3);
        assert_partition(&m);
    }

    #[test]
    fn test_wall_covering_node_removes_it() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 0.0, 200.0, 1000.0));
        assert_eq!(m.node_count(), 2);
        let (a, b) = {
            let ids: Vec<_> = m.nodes().map(|(id, _)| id).collect();
            (ids[0], ids[1])
        };
        assert!(!m.is_next_to(a, b));
        m.add_wall(Rect::new(-10.0, -10.0, 410.0, 1020.0));
        assert_eq!(m.node_count(), 1);
        assert_partition(&m);
    }

    #[test]
    fn test_corner_contact_is_not_adjacency() {
        assert!(shared_border(&Rect::new(0.0, 0.0, 10.0, 10.0), &Rect::new(10.0, 10.0, 5.0, 5.0)).is_none());
        let line = shared_border(&Rect::new(0.0, 0.0, 10.0, 10.0), &Rect::new(10.0, 5.0, 5.0, 20.0)).unwrap();
        assert_eq!(line, Line::new(vec2(10.0, 10.0), vec2(10.0, 5.0)));
        assert_eq!(line.a, vec2(10.0, 5.0));
    }

    #[test]
    fn test_remove_wall_restores_single_node() {
        let mut m = mesh();
        let wall = Rect::new(400.0, 400.0, 200.0, 200.0);
        m.add_wall(wall);
        assert!(m.remove_wall(&wall));
        assert_eq!(m.wall_count(), 0);
        assert_eq!(m.node_count(), 1);
        assert_eq!(m.nodes().next().unwrap().1.rect(), m.bounds());
        assert!(!m.remove_wall(&wall));
    }

    #[test]
    fn test_remove_wall_keeps_overlapping_wall_carved() {
        let mut m = mesh();
        let a = Rect::new(100.0, 100.0, 300.0, 300.0);
        let b = Rect::new(300.0, 300.0, 300.0, 300.0);
        m.add_wall(a);
        m.add_wall(b);
        assert!(m.remove_wall(&a));
        for (_, node) in m.nodes() {
            assert!(!vec_overlap(&node.rect(), &b));
        }
        let free: f32 = m.nodes().map(|(_, n)| n.rect().area()).sum();
        assert!((free + b.area() - m.bounds().area()).abs() < 1.0);
        assert_partition(&m);
    }

    #[test]
    fn test_partition_survives_random_edits() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut m = mesh();
        let mut walls: Vec<Rect> = Vec::new();
        for step in 0..60 {
            if walls.len() > 3 && rng.gen_bool(0.35) {
                let idx = rng.gen_range(0..walls.len());
                let wall = walls.swap_remove(idx);
                assert!(m.remove_wall(&wall));
            } else {
                // Cells on a 50-unit grid never overlap each other.
                let cell = rng.gen_range(0..400u32);
                let candidate = Rect::new((cell % 20) as f32 * 50.0, (cell / 20) as f32 * 50.0, 50.0, 50.0);
                if walls.contains(&candidate) {
                    continue;
                }
                m.add_wall(candidate);
                walls.push(candidate);
            }
            if step % 10 == 0 {
                assert_partition(&m);
            }
        }
        assert_partition(&m);
        assert_eq!(m.wall_count(), walls.len());
        for wall in walls.clone() {
            assert!(m.remove_wall(&wall));
        }
        assert_partition(&m);
        assert_eq!(m.wall_count(), 0);
    }

    #[test]
    fn test_nearest_and_closest_point() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 400.0, 200.0, 200.0));
        assert!(m.node_at(vec2(500.0, 500.0)).is_none());
        let near = m.nearest_node(vec2(500.0, 420.0)).unwrap();
        assert!(m.rect_of(near).unwrap().contains_point(vec2(500.0, 400.0)));
        let p = m.closest_point(vec2(500.0, 420.0)).unwrap();
        assert!((p - vec2(500.0, 400.0)).length() < 1e-3);
        let outside = m.closest_point(vec2(-50.0, 200.0)).unwrap();
        assert_eq!(outside, vec2(0.0, 200.0));
    }

    #[test]
    fn test_empty_mesh_errors() {
        let mut m = mesh();
        m.add_wall(Rect::new(-1.0, -1.0, 1002.0, 1002.0));
        assert_eq!(m.node_count(), 0);
        assert_eq!(m.closest_point(vec2(5.0, 5.0)), Err(NavError::EmptyMesh));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(m.random_area(vec2(5.0, 5.0), 1.0, 10.0, &mut rng), Err(NavError::EmptyMesh));
    }

    #[test]
    fn test_straight_line() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 400.0, 200.0, 200.0));
        assert!(!m.straight_line(vec2(0.0, 0.0), vec2(999.0, 999.0)));
        assert!(m.straight_line(vec2(0.0, 0.0), vec2(400.0, 400.0)));
        assert!(m.straight_line(vec2(400.0, 400.0), vec2(600.0, 400.0)));
        assert!(!m.straight_line(vec2(0.0, 0.0), vec2(1200.0, 0.0)));
    }

    #[test]
    fn test_straight_line_along_wall_edge_at_any_angle() {
        let mut m = mesh();
        m.add_wall(Rect::new(470.0, 350.0, 20.0, 30.0));
        // Both segments end on the wall's top edge from inside the free node above it.
        assert!(m.straight_line(vec2(475.819, 350.0), vec2(470.0, 330.0)));
        assert!(m.straight_line(vec2(475.0, 350.0), vec2(400.0, 340.0)));
        assert!(m.straight_line(vec2(480.0, 350.0), vec2(480.5, 0.0)));
        assert!(!m.straight_line(vec2(475.819, 351.0), vec2(470.0, 330.0)));
        assert!(!m.straight_line(vec2(480.0, 300.0), vec2(480.0, 400.0)));
    }

    #[test]
    fn test_nearest_node_rejects_non_finite() {
        let m = mesh();
        assert_eq!(m.nearest_node(vec2(f32::NAN, 10.0)), None);
        assert_eq!(m.nearest_node(vec2(10.0, f32::INFINITY)), None);
        assert_eq!(m.closest_point(vec2(f32::NAN, f32::NAN)), Err(NavError::EmptyMesh));
    }

    #[test]
    fn test_wall_near_node_edge_leaves_no_gap() {
        let mut m = mesh();
        let wall = Rect::new(0.0005, 100.0, 100.0, 100.0);
        m.add_wall(wall);
        assert_partition(&m);
        // The strip between the mesh edge and the wall is not lost.
        assert!(m.node_at(vec2(0.0002, 500.0)).is_some());
        assert!(m.node_at(vec2(0.0002, 150.0)).is_none());

        assert!(m.remove_wall(&wall));
        assert_eq!(m.node_count(), 1);
        let rect = m.nodes().next().unwrap().1.rect();
        assert_eq!(rect.x, 0.0);
        assert!(m.node_at(vec2(0.0002, 150.0)).is_some());
    }

    #[test]
    fn test_valid_move_stops_fast_mover() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 0.0, 20.0, 1000.0));
        let body = Rect::new(380.0, 100.0, 10.0, 10.0);
        let mv = m.valid_move(&body, vec2(100.0, 0.0));
        assert!((mv.x - 10.0).abs() < 1e-3, "{mv:?}");
        let mv = m.valid_move(&body, vec2(500.0, 40.0));
        assert!((mv.x - 10.0).abs() < 1e-3, "{mv:?}");
        assert!((mv.y - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_valid_move_slides_along_wall() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 0.0, 20.0, 1000.0));
        let body = Rect::new(380.0, 100.0, 10.0, 10.0);
        let mv = m.valid_move(&body, vec2(30.0, 15.0));
        assert!((mv.x - 10.0).abs() < 1e-3, "{mv:?}");
        assert!((mv.y - 15.0).abs() < 1e-3);
        let edge = m.valid_move(&Rect::new(995.0, 500.0, 4.0, 4.0), vec2(10.0, 0.0));
        assert!((edge.x - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_random_area_returns_node_rect() {
        let mut m = mesh();
        m.add_wall(Rect::new(400.0, 400.0, 200.0, 200.0));
        let rects: Vec<Rect> = m.nodes().map(|(_, n)| n.rect()).collect();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let area = m.random_area(vec2(500.0, 500.0), 50.0, 400.0, &mut rng).unwrap();
            assert!(rects.contains(&area));
        }
    }

    #[test]
    fn test_map_hooks_visit_everything() {
        let mut m = mesh();
        m.add_wall(Rect::new(100.0, 100.0, 50.0, 50.0));
        m.add_wall(Rect::new(700.0, 300.0, 50.0, 200.0));
        let mut nodes = 0;
        m.for_each_node(|_, _| nodes += 1);
        let mut walls = 0;
        m.for_each_wall(|_| walls += 1);
        assert_eq!(nodes, m.node_count());
        assert_eq!(walls, 2);
    }
}
