// ECS components and resources for the movement layer
// Entities carry a Positional body; the nav mesh and entity index are resources

use bevy_ecs::prelude::*;
use glam::Vec2;

use super::geometry::Rect;
use super::navmesh::NavMesh;
use super::pathfinding::Path;
use super::positional::Positional;
use super::quadtree::{NodeId, QuadTree, Spatial};

// ============================================================================
// COMPONENTS
// ============================================================================

/// Shape and position of an entity in the world
#[derive(Component, Debug, Clone, Copy)]
pub struct Body {
    pub shape: Positional,
}

impl Body {
    pub fn new(shape: Positional) -> Self {
        Self { shape }
    }
}

/// Velocity of an entity (units per second)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec2,
}

impl Velocity {
    pub fn new(linear: Vec2) -> Self {
        Self { linear }
    }
}

/// Acceleration applied for a single tick, then cleared
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Force {
    pub linear: Vec2,
}

/// Exponential velocity decay: `v *= exp(-decay * dt)` each tick.
#[derive(Component, Debug, Clone, Copy)]
pub struct Friction {
    pub decay: f32,
}

/// Walks a nav-mesh path toward `target`.
///
/// `planned_for` is the target the current `path` was computed for; the
/// retarget system replans whenever the two differ. `unreachable` is set when
/// that plan found no route, so an empty path is not mistaken for arrival.
#[derive(Component, Debug, Clone, Default)]
pub struct PathFollower {
    pub path: Path,
    pub target: Option<Vec2>,
    pub planned_for: Option<Vec2>,
    pub unreachable: bool,
    pub speed: f32,
    /// Half-width used when squeezing through borders.
    pub width: f32,
}

impl PathFollower {
    pub fn new(speed: f32, width: f32) -> Self {
        Self {
            speed,
            width,
            ..Default::default()
        }
    }

    pub fn arrived(&self) -> bool {
        self.target.is_some()
            && self.target == self.planned_for
            && !self.unreachable
            && self.path.is_empty()
    }
}

/// Entity-index node currently holding this entity
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialHome(pub NodeId);

// ============================================================================
// RESOURCES
// ============================================================================

/// Length of the current tick in seconds
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    pub dt: f32,
}

#[derive(Resource)]
pub struct Navigation(pub NavMesh);

/// What the entity index stores: an entity and a snapshot of its shape.
#[derive(Debug, Clone, Copy)]
pub struct EntityProxy {
    pub entity: Entity,
    pub shape: Positional,
}

impl Spatial for EntityProxy {
    fn bounding_rect(&self) -> Rect {
        self.shape.bounding_rect()
    }

    fn collides(&self, rect: &Rect) -> bool {
        self.shape.collides(rect)
    }

    fn is_same(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

#[derive(Resource)]
pub struct EntityIndex(pub QuadTree<EntityProxy>);

/// Movement tuning
#[derive(Resource, Debug, Clone, Copy)]
pub struct MovementConfig {
    /// A waypoint closer than this is considered reached.
    pub arrival_radius: f32,
    /// Default half-width for new path followers.
    pub path_width: f32,
    /// Default decay for bodies spawned with friction.
    pub default_decay: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            arrival_radius: 1.0,
            path_width: 0.0,
            default_decay: 4.0,
        }
    }
}
