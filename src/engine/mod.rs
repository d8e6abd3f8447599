// Engine module - spatial simulation core
// Geometry and shapes at the bottom, spatial indexes and navigation above,
// the ECS movement layer on top

pub mod components;
pub mod error;
pub mod geometry;
pub mod navmesh;
pub mod pathfinding;
pub mod positional;
pub mod quadtree;
pub mod simulation;
pub mod systems;

// Re-export commonly used items
pub use components::*;
pub use error::{NavError, SpatialError};
pub use geometry::{Line, Rect};
pub use navmesh::{NavMesh, NavMeshConfig, NavNode, NavNodeId, WallId};
pub use pathfinding::{Path, PathSmoothing, Waypoint};
pub use positional::{Positional, Shape};
pub use quadtree::{NodeId, QuadTree, QuadTreeConfig, Spatial};
pub use simulation::Simulation;
