// Region quadtree over anything with a bounding shape.
//
// Nodes live in an arena and are addressed by `NodeId`. A node's four
// children are always created together. Items that straddle a split line
// stay in the parent. Nodes are never merged back: a long session only ever
// deepens the tree, until `clear()`.
//
// Who owns the payload is decided by the item type:
//   - `Positional` or any keyed value: the tree owns it;
//   - `Rc<RefCell<T>>`: shared with the caller, identity is the pointer;
//   - `&T`: borrowed, the caller keeps the value alive for the tree's lifetime.

use std::cell::RefCell;
use std::rc::Rc;

use log::{trace, warn};

use super::error::SpatialError;
use super::geometry::{Rect, vec_intersect};
use super::positional::Positional;

// ============================================================================
// CONFIG
// ============================================================================

/// Items a leaf holds before it splits.
pub const DEFAULT_NODE_CAPACITY: usize = 100;
/// Deepest level a split may create. Stops endless splitting when many items
/// share one spot.
pub const DEFAULT_MAX_DEPTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadTreeConfig {
    pub capacity: usize,
    pub max_depth: usize,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_NODE_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ============================================================================
// SPATIAL ITEMS
// ============================================================================

/// What the tree needs from a stored item.
pub trait Spatial {
    fn bounding_rect(&self) -> Rect;

    /// Shape-accurate test against a node region or query rectangle.
    fn collides(&self, rect: &Rect) -> bool {
        vec_intersect(&self.bounding_rect(), rect)
    }

    /// Identity used by `remove` and `update`.
    fn is_same(&self, other: &Self) -> bool;
}

impl Spatial for Positional {
    fn bounding_rect(&self) -> Rect {
        Positional::bounding_rect(self)
    }

    fn collides(&self, rect: &Rect) -> bool {
        Positional::collides(self, rect)
    }

    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: Spatial> Spatial for Rc<RefCell<T>> {
    fn bounding_rect(&self) -> Rect {
        self.borrow().bounding_rect()
    }

    fn collides(&self, rect: &Rect) -> bool {
        self.borrow().collides(rect)
    }

    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: Spatial> Spatial for &T {
    fn bounding_rect(&self) -> Rect {
        (**self).bounding_rect()
    }

    fn collides(&self, rect: &Rect) -> bool {
        (**self).collides(rect)
    }

    fn is_same(&self, other: &Self) -> bool {
        std::ptr::eq(*self, *other)
    }
}

// ============================================================================
// TREE
// ============================================================================

/// Handle to a quadtree node. Valid until the next `clear()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

struct QuadNode<T> {
    region: Rect,
    depth: usize,
    children: Option<[NodeId; 4]>,
    items: Vec<T>,
}

impl<T> QuadNode<T> {
    fn new(region: Rect, depth: usize) -> Self {
        Self {
            region,
            depth,
            children: None,
            items: Vec::new(),
        }
    }
}

pub struct QuadTree<T> {
    nodes: Vec<QuadNode<T>>,
    config: QuadTreeConfig,
    len: usize,
}

impl<T: Spatial> QuadTree<T> {
    pub fn new(bounds: Rect) -> Self {
        Self::with_config(bounds, QuadTreeConfig::default())
    }

    pub fn with_config(bounds: Rect, config: QuadTreeConfig) -> Self {
        Self {
            nodes: vec![QuadNode::new(bounds.abs(), 0)],
            config,
            len: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn bounds(&self) -> Rect {
        self.nodes[ROOT.0].region
    }

    pub fn config(&self) -> QuadTreeConfig {
        self.config
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest level currently present (root = 0).
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn region(&self, id: NodeId) -> Option<Rect> {
        self.nodes.get(id.0).map(|n| n.region)
    }

    /// Items stored directly in `id` (not its children).
    pub fn items(&self, id: NodeId) -> Option<&[T]> {
        self.nodes.get(id.0).map(|n| n.items.as_slice())
    }

    pub fn children(&self, id: NodeId) -> Option<[NodeId; 4]> {
        self.nodes.get(id.0).and_then(|n| n.children)
    }

    pub fn contains(&self, id: NodeId, item: &T) -> bool {
        self.items(id)
            .is_some_and(|items| items.iter().any(|x| x.is_same(item)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().flat_map(|n| n.items.iter())
    }

    /// Drop every item and every node below the root.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        let root = &mut self.nodes[ROOT.0];
        root.children = None;
        root.items.clear();
        self.len = 0;
    }

    /// Deepest node that holds `shape` without it straddling a split line.
    ///
    /// `None` if the shape misses the root region entirely.
    pub fn find<S: Spatial + ?Sized>(&self, shape: &S) -> Option<NodeId> {
        if !shape.collides(&self.nodes[ROOT.0].region) {
            return None;
        }
        Some(self.descend(ROOT, shape))
    }

    fn descend<S: Spatial + ?Sized>(&self, from: NodeId, shape: &S) -> NodeId {
        let mut current = from;
        while let Some(children) = self.nodes[current.0].children {
            let mut hits = children
                .iter()
                .copied()
                .filter(|c| shape.collides(&self.nodes[c.0].region));
            match (hits.next(), hits.next()) {
                (Some(only), None) => current = only,
                _ => break,
            }
        }
        current
    }

    /// Insert an item and return the node it ended up in.
    ///
    /// Items outside the root region are kept at the root.
    pub fn add(&mut self, item: T) -> NodeId {
        let mut id = self.find(&item).unwrap_or(ROOT);
        loop {
            let node = &self.nodes[id.0];
            let full = node.items.len() >= self.config.capacity;
            if node.children.is_none() && full && node.depth < self.config.max_depth {
                self.split(id);
                id = self.descend(id, &item);
            } else {
                break;
            }
        }
        self.nodes[id.0].items.push(item);
        self.len += 1;
        id
    }

    /// Create all four quadrants of a leaf and re-home its items, last first.
    fn split(&mut self, id: NodeId) {
        let (region, depth) = {
            let node = &self.nodes[id.0];
            (node.region, node.depth)
        };
        let half_w = region.width * 0.5;
        let half_h = region.height * 0.5;
        let base = self.nodes.len();
        for (qx, qy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            let quadrant = Rect::new(region.x + half_w * qx, region.y + half_h * qy, half_w, half_h);
            self.nodes.push(QuadNode::new(quadrant, depth + 1));
        }
        self.nodes[id.0].children = Some([
            NodeId(base),
            NodeId(base + 1),
            NodeId(base + 2),
            NodeId(base + 3),
        ]);

        let items = std::mem::take(&mut self.nodes[id.0].items);
        let mut kept = Vec::new();
        for item in items.into_iter().rev() {
            let home = self.descend(id, &item);
            if home == id {
                kept.push(item);
            } else {
                self.nodes[home.0].items.push(item);
            }
        }
        kept.reverse();
        trace!(
            "quadtree split {:?} at depth {}: {} straddlers stay",
            region,
            depth,
            kept.len()
        );
        self.nodes[id.0].items = kept;
    }

    fn take_from(&mut self, id: NodeId, item: &T) -> Option<T> {
        let node = self.nodes.get_mut(id.0)?;
        let idx = node.items.iter().position(|x| x.is_same(item))?;
        self.len -= 1;
        Some(node.items.remove(idx))
    }

    /// Detach an item. Looks where `find` would put it first, then searches
    /// the whole tree depth-first. Under-full nodes are not merged.
    pub fn remove(&mut self, item: &T) -> Option<T> {
        if let Some(home) = self.find(item) {
            if let Some(found) = self.take_from(home, item) {
                return Some(found);
            }
        }
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            if let Some(found) = self.take_from(id, item) {
                return Some(found);
            }
            if let Some(children) = self.nodes[id.0].children {
                stack.extend(children.iter().rev());
            }
        }
        None
    }

    /// Re-home an item after it moved.
    ///
    /// `item` is the item's current value (for shared items, another handle
    /// to the same object). If its home differs from `expected`, the old entry
    /// is detached from `expected` (or from wherever it is) and the item is
    /// added again. Returns the node `find` reports for it afterwards.
    pub fn update(&mut self, item: T, expected: NodeId) -> Result<NodeId, SpatialError> {
        if expected.0 >= self.nodes.len() {
            return Err(SpatialError::UnknownNode(expected));
        }
        let Some(home) = self.find(&item) else {
            let shape = item.bounding_rect();
            warn!("quadtree update: {:?} left the tree bounds {:?}", shape, self.bounds());
            return Err(SpatialError::OutOfBounds {
                shape,
                bounds: self.bounds(),
            });
        };

        if home == expected {
            if let Some(slot) = self.nodes[expected.0].items.iter_mut().find(|x| x.is_same(&item)) {
                *slot = item;
                return Ok(expected);
            }
        }
        if self.take_from(expected, &item).is_none() {
            self.remove(&item);
        }
        Ok(self.add(item))
    }

    /// Items of `shape`'s home node and everything below it. No geometric
    /// filtering beyond choosing the subtree.
    pub fn get_nearest<'a, S: Spatial + ?Sized>(&'a self, shape: &S, out: &mut Vec<&'a T>) {
        if let Some(home) = self.find(shape) {
            self.collect_subtree(home, out);
        }
    }

    /// Items of every node whose region intersects `rect`.
    pub fn get_nearest_rect<'a>(&'a self, rect: &Rect, out: &mut Vec<&'a T>) {
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            // Root items may lie outside the root region, so the root is always read.
            if id != ROOT && !vec_intersect(&node.region, rect) {
                continue;
            }
            out.extend(node.items.iter());
            if let Some(children) = node.children {
                stack.extend(children.iter().rev());
            }
        }
    }

    /// Items whose own shape collides with `rect`.
    pub fn query_collisions(&self, rect: &Rect) -> Vec<&T> {
        let mut candidates = Vec::new();
        self.get_nearest_rect(rect, &mut candidates);
        candidates.retain(|item| item.collides(rect));
        candidates
    }

    fn collect_subtree<'a>(&'a self, from: NodeId, out: &mut Vec<&'a T>) {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            out.extend(node.items.iter());
            if let Some(children) = node.children {
                stack.extend(children.iter().rev());
            }
        }
    }

    /// Visit every node region with the items stored directly in it.
    /// Debug/render hook; does not touch the tree.
    pub fn map<F: FnMut(&Rect, &[T])>(&self, mut f: F) {
        for node in &self.nodes {
            f(&node.region, &node.items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, vec2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bounds() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }

    fn small_tree<T: Spatial>() -> QuadTree<T> {
        QuadTree::with_config(bounds(), QuadTreeConfig { capacity: 4, max_depth: 6 })
    }

    #[test]
    fn test_split_on_capacity() {
        let mut tree = small_tree();
        for i in 0..4 {
            tree.add(Positional::point(vec2(10.0 + i as f32, 10.0)));
        }
        assert_eq!(tree.node_count(), 1);
        tree.add(Positional::point(vec2(80.0, 80.0)));
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.len(), 5);
        assert!(tree.items(tree.root()).unwrap().is_empty());
    }

    #[test]
    fn test_straddler_stays_in_parent() {
        let mut tree = small_tree();
        for i in 0..5 {
            tree.add(Positional::point(vec2(10.0 + i as f32, 10.0)));
        }
        let straddler = Positional::rect(Rect::new(40.0, 40.0, 20.0, 20.0));
        let home = tree.add(straddler);
        assert_eq!(home, tree.root());
        assert_eq!(tree.find(&straddler), Some(tree.root()));
        assert!(tree.contains(tree.root(), &straddler));
    }

    #[test]
    fn test_find_outside_is_none() {
        let tree: QuadTree<Positional> = small_tree();
        assert_eq!(tree.find(&Positional::point(vec2(150.0, 5.0))), None);
        assert_eq!(tree.find(&Positional::point(vec2(50.0, 50.0))), Some(tree.root()));
    }

    #[test]
    fn test_full_query_returns_every_item_once() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tree = small_tree();
        let n = 300;
        for i in 0..n {
            let p = vec2(rng.gen_range(0.0..95.0), rng.gen_range(0.0..95.0));
            tree.add(Positional::rect(Rect::new(p.x, p.y, 1.0 + (i % 5) as f32, 2.0)));
        }
        let mut out = Vec::new();
        tree.get_nearest_rect(&bounds(), &mut out);
        assert_eq!(out.len(), n);
        for (i, a) in out.iter().enumerate() {
            assert!(
                out[i + 1..].iter().all(|b| !std::ptr::eq(*a, *b)),
                "item returned twice"
            );
        }
        assert!(tree.depth() > 0);
    }

    #[test]
    fn test_nearest_by_shape_reads_home_subtree() {
        let mut tree = small_tree();
        for i in 0..8 {
            tree.add(Positional::point(vec2(5.0 + i as f32, 5.0)));
        }
        tree.add(Positional::point(vec2(90.0, 90.0)));
        let mut out = Vec::new();
        // Spans a split line inside the cluster, so its home holds all of it.
        tree.get_nearest(&Positional::rect(Rect::new(4.0, 4.0, 9.0, 2.0)), &mut out);
        assert!(out.iter().all(|p| p.center().x < 50.0));
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_query_collisions_filters_shapes() {
        let mut tree = small_tree();
        tree.add(Positional::circle(vec2(20.0, 20.0), 5.0));
        tree.add(Positional::circle(vec2(70.0, 70.0), 5.0));
        let hits = tree.query_collisions(&Rect::new(22.0, 22.0, 3.0, 3.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].center(), vec2(20.0, 20.0));
    }

    #[test]
    fn test_remove() {
        let mut tree = small_tree();
        let items: Vec<_> = (0..10)
            .map(|i| Positional::point(vec2(10.0 * i as f32 + 1.0, 7.0)))
            .collect();
        for item in &items {
            tree.add(*item);
        }
        assert_eq!(tree.remove(&items[3]), Some(items[3]));
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.remove(&items[3]), None);
        assert!(tree.iter().all(|p| *p != items[3]));
    }

    #[test]
    fn test_update_rehomes_shared_item() {
        let mut tree: QuadTree<Rc<RefCell<Positional>>> = small_tree();
        let mover = Rc::new(RefCell::new(Positional::rect(Rect::new(10.0, 10.0, 2.0, 2.0))));
        for i in 0..6 {
            tree.add(Rc::new(RefCell::new(Positional::point(vec2(5.0 + i as f32, 60.0 + i as f32)))));
        }
        tree.add(Rc::clone(&mover));
        let old = tree.find(&mover).unwrap();
        assert!(tree.contains(old, &mover));

        mover.borrow_mut().set_pos(vec2(80.0, 20.0));
        let new = tree.update(Rc::clone(&mover), old).unwrap();
        assert_ne!(new, old);
        assert_eq!(tree.find(&mover), Some(new));
        assert!(!tree.contains(old, &mover));
        assert!(tree.contains(new, &mover));
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_update_outside_bounds_is_an_error() {
        let mut tree: QuadTree<Rc<RefCell<Positional>>> = small_tree();
        let mover = Rc::new(RefCell::new(Positional::point(vec2(10.0, 10.0))));
        let home = tree.add(Rc::clone(&mover));
        mover.borrow_mut().set_pos(vec2(500.0, 500.0));
        let err = tree.update(Rc::clone(&mover), home).unwrap_err();
        assert!(matches!(err, SpatialError::OutOfBounds { .. }));
    }

    #[test]
    fn test_update_owned_value() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Tagged(u32, Positional);

        impl Spatial for Tagged {
            fn bounding_rect(&self) -> Rect {
                self.1.bounding_rect()
            }
            fn is_same(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        let mut tree = small_tree();
        for i in 0..9 {
            tree.add(Tagged(i, Positional::point(vec2(3.0 + i as f32, 3.0))));
        }
        let home = tree.find(&Tagged(2, Positional::point(vec2(5.0, 3.0)))).unwrap();
        let moved = Tagged(2, Positional::point(vec2(97.0, 97.0)));
        let new = tree.update(moved, home).unwrap();
        assert_eq!(tree.find(&moved), Some(new));
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.iter().filter(|t| t.0 == 2).count(), 1);
    }

    #[test]
    fn test_borrowed_items() {
        let shapes: Vec<Positional> = (0..20)
            .map(|i| Positional::circle(Vec2::splat(4.0 * i as f32 + 2.0), 1.0))
            .collect();
        let mut tree: QuadTree<&Positional> = small_tree();
        for s in &shapes {
            tree.add(s);
        }
        assert_eq!(tree.len(), 20);
        assert!(tree.remove(&&shapes[7]).is_some());
        assert_eq!(tree.len(), 19);
    }

    #[test]
    fn test_depth_guard() {
        let mut tree = QuadTree::with_config(bounds(), QuadTreeConfig { capacity: 2, max_depth: 3 });
        for _ in 0..50 {
            tree.add(Positional::point(vec2(10.0, 10.0)));
        }
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.len(), 50);
    }

    #[test]
    fn test_map_and_clear() {
        let mut tree = small_tree();
        for i in 0..12 {
            tree.add(Positional::point(vec2(8.0 * i as f32, 8.0 * i as f32)));
        }
        let mut visited = 0;
        let mut seen = 0;
        tree.map(|_, items| {
            visited += 1;
            seen += items.len();
        });
        assert_eq!(visited, tree.node_count());
        assert_eq!(seen, 12);
        tree.clear();
        assert_eq!(tree.node_count(), 1);
        assert!(tree.is_empty());
    }
}
