// Error types for caller-contract violations.
//
// Expected absence (no node near a point, no path, item not stored) is not an
// error: those cases return Option / empty Path / bool.

use thiserror::Error;

use super::geometry::Rect;
use super::quadtree::NodeId;

/// Errors raised by the quadtree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    /// The shape moved entirely outside the root region.
    #[error("shape {shape:?} lies outside the tree bounds {bounds:?}")]
    OutOfBounds { shape: Rect, bounds: Rect },

    #[error("node handle {0:?} does not belong to this tree")]
    UnknownNode(NodeId),
}

/// Errors raised by the navigation mesh.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    #[error("navigation mesh has no free nodes")]
    EmptyMesh,

    #[error("navigation bounds {0:?} have zero area")]
    DegenerateBounds(Rect),
}
