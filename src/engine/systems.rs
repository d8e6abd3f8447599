// ECS systems for the movement layer
// Run in order each tick: retarget, follow, force, friction, movement, spatial sync

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::{debug, trace};

use super::components::*;
use super::pathfinding::Path;

/// Replan for followers whose target changed since the last plan
pub fn retarget_system(nav: Res<Navigation>, mut query: Query<(&Body, &mut PathFollower)>) {
    for (body, mut follower) in query.iter_mut() {
        if follower.target == follower.planned_for {
            continue;
        }
        let (path, unreachable) = match follower.target {
            Some(target) => {
                let mut path = nav.0.get_path(body.shape.center(), target, follower.width);
                let unreachable = path.is_empty();
                // First waypoint is where we already stand.
                path.pop_front();
                (path, unreachable)
            }
            None => (Path::default(), false),
        };
        trace!("replanned {:?}: {} waypoints", follower.target, path.len());
        follower.path = path;
        follower.planned_for = follower.target;
        follower.unreachable = unreachable;
    }
}

/// Steer toward the front waypoint, dropping waypoints already reached
pub fn path_follow_system(
    clock: Res<SimClock>,
    config: Res<MovementConfig>,
    mut query: Query<(&Body, &mut PathFollower, &mut Velocity)>,
) {
    for (body, mut follower, mut velocity) in query.iter_mut() {
        let pos = body.shape.center();
        while let Some(next) = follower.path.front().map(|w| w.point) {
            if next.distance(pos) > config.arrival_radius {
                break;
            }
            follower.path.pop_front();
        }

        velocity.linear = match follower.path.front() {
            Some(w) => {
                let offset = w.point - pos;
                // Do not overshoot the waypoint within one tick.
                let speed = if clock.dt > 0.0 {
                    follower.speed.min(offset.length() / clock.dt)
                } else {
                    follower.speed
                };
                offset.normalize_or_zero() * speed
            }
            None => Vec2::ZERO,
        };
    }
}

/// Apply one tick of acceleration, then clear it
pub fn force_system(clock: Res<SimClock>, mut query: Query<(&mut Force, &mut Velocity)>) {
    for (mut force, mut velocity) in query.iter_mut() {
        velocity.linear += force.linear * clock.dt;
        force.linear = Vec2::ZERO;
    }
}

pub fn friction_system(clock: Res<SimClock>, mut query: Query<(&Friction, &mut Velocity)>) {
    for (friction, mut velocity) in query.iter_mut() {
        velocity.linear *= (-friction.decay * clock.dt).exp();
    }
}

/// Apply velocity * dt, clamped against walls and the mesh bounds
pub fn movement_system(
    clock: Res<SimClock>,
    nav: Res<Navigation>,
    mut query: Query<(&mut Body, &Velocity)>,
) {
    for (mut body, velocity) in query.iter_mut() {
        let delta = velocity.linear * clock.dt;
        if delta == Vec2::ZERO {
            continue;
        }
        let allowed = nav.0.valid_move(&body.shape.bounding_rect(), delta);
        if allowed != Vec2::ZERO {
            body.shape.translate(allowed);
        }
    }
}

/// Re-home moved bodies in the entity index
pub fn spatial_sync_system(
    mut index: ResMut<EntityIndex>,
    mut query: Query<(Entity, &Body, &mut SpatialHome), Changed<Body>>,
) {
    for (entity, body, mut home) in query.iter_mut() {
        let proxy = EntityProxy {
            entity,
            shape: body.shape,
        };
        match index.0.update(proxy, home.0) {
            Ok(node) => {
                if node != home.0 {
                    home.0 = node;
                }
            }
            Err(err) => debug!("entity {entity:?} left the index: {err}"),
        }
    }
}
