// Path search over the navigation mesh.
//
// A* runs over (crossing point, node) states. Entering a neighbour means
// crossing the shared border, shortened by the agent width at both ends; the
// crossing point is where the straight line to the goal meets that portal, or
// the portal end closest to both the current point and the goal. Borders too
// short for the agent are impassable.
//
// The raw crossing sequence is then smoothed:
// - `PathSmoothing::Funnel` string-pulls through the portals (simple stupid
//   funnel algorithm), keeping only the corners the path has to bend around.
// - `PathSmoothing::PerTransition` keeps one waypoint per border crossed.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use glam::Vec2;
use log::{debug, trace};

use super::geometry::{
    EPSILON, Line, Rect, closest_point_in_rect, line_line_intersect, point_rect_distance,
};
use super::navmesh::{NavMesh, NavNodeId};

/// How the raw border crossings are turned into waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathSmoothing {
    #[default]
    Funnel,
    PerTransition,
}

// ============================================================================
// PATH
// ============================================================================

/// A point to walk to. `border` is the portal the point lies on, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub point: Vec2,
    pub border: Option<Line>,
}

impl Waypoint {
    pub fn new(point: Vec2) -> Self {
        Self { point, border: None }
    }
}

/// Ordered waypoints from start to end. Empty when no path exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    waypoints: VecDeque<Waypoint>,
}

impl Path {
    pub fn from_waypoints<I: IntoIterator<Item = Waypoint>>(waypoints: I) -> Self {
        Self {
            waypoints: waypoints.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn front(&self) -> Option<&Waypoint> {
        self.waypoints.front()
    }

    pub fn back(&self) -> Option<&Waypoint> {
        self.waypoints.back()
    }

    pub fn pop_front(&mut self) -> Option<Waypoint> {
        self.waypoints.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter()
    }

    pub fn points(&self) -> Vec<Vec2> {
        self.waypoints.iter().map(|w| w.point).collect()
    }

    /// Total polyline length.
    pub fn length(&self) -> f32 {
        self.waypoints
            .iter()
            .zip(self.waypoints.iter().skip(1))
            .map(|(a, b)| a.point.distance(b.point))
            .sum()
    }
}

// ============================================================================
// SEARCH STATE
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct SearchState {
    point: Vec2,
    node: NavNodeId,
    portal: Option<Line>,
    g: f32,
    prev: Option<usize>,
}

/// Open-list entry. Ordered so `BinaryHeap` pops the lowest `f` first, and
/// the earliest pushed among equal `f`.
#[derive(Debug, Clone, Copy)]
struct Open {
    f: f32,
    seq: u64,
    state: usize,
}

impl PartialEq for Open {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Open {}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Open {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

type StateKey = (u32, u32, NavNodeId);

fn state_key(p: Vec2, node: NavNodeId) -> StateKey {
    (p.x.to_bits(), p.y.to_bits(), node)
}

// ============================================================================
// CROSSING POINTS
// ============================================================================

/// Where a walker at `from` heading for `goal` should cross `portal`.
fn crossing_point(from: Vec2, goal: Vec2, portal: &Line) -> Vec2 {
    if let Some(hit) = line_line_intersect(from, goal, portal.a, portal.b) {
        return hit;
    }
    let cost = |p: Vec2| from.distance(p) + p.distance(goal);
    if cost(portal.a) <= cost(portal.b) { portal.a } else { portal.b }
}

impl NavMesh {
    /// Push `p` along `portal` until it is at least `width` from every wall
    /// near it, staying on the portal.
    fn displace_point(&self, p: Vec2, portal: &Line, width: f32) -> Vec2 {
        if width <= 0.0 {
            return p;
        }
        let dir = portal.direction();
        let mut q = p;
        for wall in self.walls_near(&Rect::from_center(p, Vec2::splat(width * 2.0))) {
            let d = point_rect_distance(&wall, q);
            if d >= width {
                continue;
            }
            let away = q - closest_point_in_rect(&wall, q);
            let toward = if away.length_squared() > EPSILON { away } else { portal.midpoint() - q };
            let sign = if toward.dot(dir) >= 0.0 { 1.0 } else { -1.0 };
            q += dir * sign * (width - d);
        }
        let t = (q - portal.a).dot(dir).clamp(0.0, portal.length());
        portal.a + dir * t
    }

    // ------------------------------------------------------------------------
    // search
    // ------------------------------------------------------------------------

    /// Route from `start` to `end` for an agent of half-width `width`.
    ///
    /// Both points are first moved onto their nearest free node. The result
    /// starts at the adjusted start and ends at the adjusted end, or is empty
    /// when the end cannot be reached.
    pub fn get_path(&self, start: Vec2, end: Vec2, width: f32) -> Path {
        self.get_path_with(start, end, width, self.config().smoothing)
    }

    pub fn get_path_with(&self, start: Vec2, end: Vec2, width: f32, smoothing: PathSmoothing) -> Path {
        let width = width.max(0.0);
        let resolved = self.nearest_node(start).zip(self.nearest_node(end));
        let Some((start_node, end_node)) = resolved else {
            debug!("get_path({start:?} -> {end:?}): mesh has no free nodes");
            return Path::default();
        };
        let (Some(start_rect), Some(end_rect)) = (self.rect_of(start_node), self.rect_of(end_node))
        else {
            return Path::default();
        };
        let start = closest_point_in_rect(&start_rect, start);
        let end = closest_point_in_rect(&end_rect, end);

        if start_node == end_node {
            return Path::from_waypoints([Waypoint::new(start), Waypoint::new(end)]);
        }

        let Some(chain) = self.search(start, start_node, end, end_node, width) else {
            debug!("get_path({start:?} -> {end:?}): unreachable");
            return Path::default();
        };

        let waypoints = match smoothing {
            PathSmoothing::PerTransition => chain
                .iter()
                .map(|s| Waypoint { point: s.point, border: s.portal })
                .collect(),
            PathSmoothing::Funnel => {
                let portals = self.oriented_portals(&chain);
                string_pull(start, end, &portals)
            }
        };
        let path = Path::from_waypoints(waypoints);
        trace!("path {:?} -> {:?}: {} waypoints", start, end, path.len());
        path
    }

    /// A* over crossing points. Returns the state chain start..=end.
    fn search(
        &self,
        start: Vec2,
        start_node: NavNodeId,
        end: Vec2,
        end_node: NavNodeId,
        width: f32,
    ) -> Option<Vec<SearchState>> {
        let mut states = vec![SearchState {
            point: start,
            node: start_node,
            portal: None,
            g: 0.0,
            prev: None,
        }];
        let mut index: HashMap<StateKey, usize> = HashMap::new();
        index.insert(state_key(start, start_node), 0);
        let mut expanded: HashSet<NavNodeId> = HashSet::new();
        let mut goal: Option<usize> = None;

        let mut open = BinaryHeap::new();
        let mut seq = 0u64;
        open.push(Open { f: start.distance(end), seq, state: 0 });

        let mut reached = false;
        while let Some(entry) = open.pop() {
            if Some(entry.state) == goal {
                reached = true;
                break;
            }
            let current = states[entry.state];
            // Superseded by a cheaper route to the same state.
            if entry.f > current.g + current.point.distance(end) + EPSILON {
                continue;
            }

            if current.node == end_node {
                let g = current.g + current.point.distance(end);
                let improved = match goal {
                    None => {
                        states.push(SearchState {
                            point: end,
                            node: end_node,
                            portal: None,
                            g,
                            prev: Some(entry.state),
                        });
                        goal = Some(states.len() - 1);
                        true
                    }
                    Some(i) if g < states[i].g => {
                        states[i].g = g;
                        states[i].prev = Some(entry.state);
                        true
                    }
                    Some(_) => false,
                };
                if let (true, Some(i)) = (improved, goal) {
                    seq += 1;
                    open.push(Open { f: g, seq, state: i });
                }
                continue;
            }

            if !expanded.insert(current.node) {
                continue;
            }
            let Some(node) = self.node(current.node) else {
                continue;
            };
            for (next, border) in node.sorted_neighbors() {
                if expanded.contains(&next) {
                    continue;
                }
                let Some(portal) = border.inset(width) else {
                    continue;
                };
                let crossing = self.displace_point(crossing_point(current.point, end, &portal), &portal, width);
                let g = current.g + current.point.distance(crossing);
                let f = g + crossing.distance(end);
                let key = state_key(crossing, next);
                let slot = match index.get(&key) {
                    Some(&i) if g < states[i].g => {
                        states[i].g = g;
                        states[i].prev = Some(entry.state);
                        states[i].portal = Some(portal);
                        i
                    }
                    Some(_) => continue,
                    None => {
                        states.push(SearchState {
                            point: crossing,
                            node: next,
                            portal: Some(portal),
                            g,
                            prev: Some(entry.state),
                        });
                        index.insert(key, states.len() - 1);
                        states.len() - 1
                    }
                };
                seq += 1;
                open.push(Open { f, seq, state: slot });
            }
        }

        if !reached {
            return None;
        }
        let mut chain = Vec::new();
        let mut cursor = goal;
        while let Some(i) = cursor {
            chain.push(states[i]);
            cursor = states[i].prev;
        }
        chain.reverse();
        Some(chain)
    }

    /// Portals along the chain, each split into the endpoint on the walker's
    /// left and the one on its right when stepping through it.
    fn oriented_portals(&self, chain: &[SearchState]) -> Vec<Portal> {
        chain
            .windows(2)
            .filter_map(|pair| {
                let line = pair[1].portal?;
                let from = self.rect_of(pair[0].node)?.center();
                let to = self.rect_of(pair[1].node)?.center();
                // Portal normal, pointing into the node being entered.
                let normal = line.direction().perp();
                let heading = if normal.dot(to - from) >= 0.0 { normal } else { -normal };
                let (left, right) = if heading.perp_dot(line.a - line.midpoint()) > 0.0 {
                    (line.a, line.b)
                } else {
                    (line.b, line.a)
                };
                Some(Portal { left, right, border: Some(line) })
            })
            .collect()
    }
}

// ============================================================================
// FUNNEL
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Portal {
    left: Vec2,
    right: Vec2,
    border: Option<Line>,
}

/// Twice the signed area of the triangle (a, b, c).
fn triarea2(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    let ab = b - a;
    let ac = c - a;
    ac.x * ab.y - ab.x * ac.y
}

fn same_point(a: Vec2, b: Vec2) -> bool {
    a.distance_squared(b) < EPSILON * EPSILON
}

/// Simple stupid funnel algorithm over `portals`, from `start` to `end`.
fn string_pull(start: Vec2, end: Vec2, portals: &[Portal]) -> Vec<Waypoint> {
    let mut list = Vec::with_capacity(portals.len() + 2);
    list.push(Portal { left: start, right: start, border: None });
    list.extend_from_slice(portals);
    list.push(Portal { left: end, right: end, border: None });

    let mut out = vec![Waypoint::new(start)];
    let (mut apex, mut left, mut right) = (start, start, start);
    let (mut apex_i, mut left_i, mut right_i) = (0usize, 0usize, 0usize);

    let mut i = 1;
    while i < list.len() {
        let portal = list[i];

        if triarea2(apex, right, portal.right) <= 0.0 {
            if same_point(apex, right) || triarea2(apex, left, portal.right) > 0.0 {
                right = portal.right;
                right_i = i;
            } else {
                // Right side crossed over the left: the left point is a corner.
                apex = left;
                apex_i = left_i;
                if !out.last().is_some_and(|w| same_point(w.point, apex)) {
                    out.push(Waypoint { point: apex, border: list[apex_i].border });
                }
                left = apex;
                right = apex;
                left_i = apex_i;
                right_i = apex_i;
                i = apex_i + 1;
                continue;
            }
        }

        if triarea2(apex, left, portal.left) >= 0.0 {
            if same_point(apex, left) || triarea2(apex, right, portal.left) < 0.0 {
                left = portal.left;
                left_i = i;
            } else {
                apex = right;
                apex_i = right_i;
                if !out.last().is_some_and(|w| same_point(w.point, apex)) {
                    out.push(Waypoint { point: apex, border: list[apex_i].border });
                }
                left = apex;
                right = apex;
                left_i = apex_i;
                right_i = apex_i;
                i = apex_i + 1;
                continue;
            }
        }
        i += 1;
    }

    if !out.last().is_some_and(|w| same_point(w.point, end)) {
        out.push(Waypoint::new(end));
    }
    out
}
