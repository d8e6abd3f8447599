// Flume Nav - 2D spatial simulation core
// Quadtree spatial index, rectangular navigation mesh and path search,
// driven by a bevy_ecs movement layer

pub mod engine;

pub use engine::*;
