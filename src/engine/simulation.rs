// Simulation: the world, its resources and the per-tick schedule

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::debug;

use super::components::*;
use super::navmesh::NavMesh;
use super::positional::Positional;
use super::quadtree::QuadTree;
use super::systems::*;

pub struct Simulation {
    world: World,
    schedule: Schedule,
}

impl Simulation {
    pub fn new(mesh: NavMesh, config: MovementConfig) -> Self {
        let bounds = mesh.bounds();
        let mut world = World::new();
        world.insert_resource(SimClock::default());
        world.insert_resource(EntityIndex(QuadTree::new(bounds)));
        world.insert_resource(Navigation(mesh));
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                retarget_system,
                path_follow_system,
                force_system,
                friction_system,
                movement_system,
                spatial_sync_system,
            )
                .chain(),
        );
        Self { world, schedule }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn navigation(&self) -> &NavMesh {
        &self.world.resource::<Navigation>().0
    }

    pub fn navigation_mut(&mut self) -> &mut NavMesh {
        &mut self.world.resource_mut::<Navigation>().into_inner().0
    }

    pub fn config(&self) -> MovementConfig {
        *self.world.resource::<MovementConfig>()
    }

    pub fn entity_index(&self) -> &QuadTree<EntityProxy> {
        &self.world.resource::<EntityIndex>().0
    }

    fn register(&mut self, entity: Entity, shape: Positional) -> Entity {
        let home = self
            .world
            .resource_mut::<EntityIndex>()
            .0
            .add(EntityProxy { entity, shape });
        self.world.entity_mut(entity).insert(SpatialHome(home));
        entity
    }

    /// Spawn a path-following agent using the configured path width.
    pub fn spawn_agent(&mut self, shape: Positional, speed: f32) -> Entity {
        let width = self.config().path_width;
        let entity = self
            .world
            .spawn((
                Body::new(shape),
                Velocity::default(),
                PathFollower::new(speed, width),
            ))
            .id();
        self.register(entity, shape)
    }

    /// Spawn a free body that coasts with the configured friction.
    pub fn spawn_body(&mut self, shape: Positional, velocity: Vec2) -> Entity {
        let decay = self.config().default_decay;
        let entity = self
            .world
            .spawn((
                Body::new(shape),
                Velocity::new(velocity),
                Force::default(),
                Friction { decay },
            ))
            .id();
        self.register(entity, shape)
    }

    /// Point an agent at `target` (or stop it with `None`). A target is
    /// replanned on the next tick even if it did not change, so agents can
    /// retry after the walls changed. Returns `false` for entities without a
    /// `PathFollower`.
    pub fn set_target(&mut self, entity: Entity, target: Option<Vec2>) -> bool {
        match self.world.get_mut::<PathFollower>(entity) {
            Some(mut follower) => {
                follower.target = target;
                if target.is_some() {
                    follower.planned_for = None;
                }
                true
            }
            None => false,
        }
    }

    /// Queue an acceleration for the next tick.
    pub fn push(&mut self, entity: Entity, force: Vec2) -> bool {
        match self.world.get_mut::<Force>(entity) {
            Some(mut f) => {
                f.linear += force;
                true
            }
            None => false,
        }
    }

    pub fn position(&self, entity: Entity) -> Option<Vec2> {
        self.world.get::<Body>(entity).map(|b| b.shape.center())
    }

    pub fn has_arrived(&self, entity: Entity) -> bool {
        self.world
            .get::<PathFollower>(entity)
            .is_some_and(PathFollower::arrived)
    }

    /// True if the agent's last plan found no route to its target.
    pub fn is_unreachable(&self, entity: Entity) -> bool {
        self.world
            .get::<PathFollower>(entity)
            .is_some_and(|f| f.unreachable)
    }

    /// Other entities whose shapes touch `entity`'s shape.
    pub fn colliding_with(&self, entity: Entity) -> Vec<Entity> {
        let Some(body) = self.world.get::<Body>(entity) else {
            return Vec::new();
        };
        self.entity_index()
            .query_collisions(&body.shape.bounding_rect())
            .into_iter()
            .filter(|p| p.entity != entity && p.shape.collides_positional(&body.shape))
            .map(|p| p.entity)
            .collect()
    }

    /// Advance the world by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.world.resource_mut::<SimClock>().dt = dt;
        self.schedule.run(&mut self.world);
        debug!("tick {dt}s: {} entities indexed", self.entity_index().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geometry::Rect;
    use glam::vec2;

    fn sim() -> Simulation {
        let mut mesh = NavMesh::new(Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap();
        mesh.add_wall(Rect::new(400.0, 400.0, 200.0, 200.0));
        let config = MovementConfig {
            path_width: 6.0,
            ..Default::default()
        };
        Simulation::new(mesh, config)
    }

    #[test]
    fn test_agent_walks_around_wall() {
        let mut sim = sim();
        let agent = sim.spawn_agent(Positional::circle(vec2(50.0, 50.0), 4.0), 200.0);
        assert!(sim.set_target(agent, Some(vec2(950.0, 950.0))));
        for _ in 0..2000 {
            sim.tick(1.0 / 60.0);
            if sim.has_arrived(agent) {
                break;
            }
        }
        assert!(sim.has_arrived(agent));
        let pos = sim.position(agent).unwrap();
        assert!(pos.distance(vec2(950.0, 950.0)) < 2.0, "{pos:?}");
    }

    #[test]
    fn test_friction_slows_body() {
        let mut sim = sim();
        let body = sim.spawn_body(Positional::rect(Rect::new(100.0, 100.0, 10.0, 10.0)), vec2(100.0, 0.0));
        sim.tick(0.1);
        let v = sim.world().get::<Velocity>(body).unwrap().linear;
        assert!((v.x - 100.0 * (-0.4f32).exp()).abs() < 1e-3);
        assert!(sim.position(body).unwrap().x > 105.0);
    }

    #[test]
    fn test_body_stops_at_wall() {
        let mut sim = sim();
        let body = sim.spawn_body(Positional::rect(Rect::new(380.0, 450.0, 10.0, 10.0)), vec2(0.0, 0.0));
        assert!(sim.push(body, vec2(5000.0, 0.0)));
        for _ in 0..30 {
            sim.tick(1.0 / 30.0);
        }
        let rect = sim.world().get::<Body>(body).unwrap().shape.bounding_rect();
        assert!(rect.right() <= 400.0 + 1e-3, "{rect:?}");
    }

    #[test]
    fn test_index_follows_movement() {
        let mut sim = sim();
        let a = sim.spawn_body(Positional::circle(vec2(100.0, 100.0), 5.0), vec2(300.0, 0.0));
        let b = sim.spawn_body(Positional::circle(vec2(160.0, 100.0), 5.0), Vec2::ZERO);
        assert!(sim.colliding_with(a).is_empty());
        for _ in 0..120 {
            sim.tick(1.0 / 60.0);
            if !sim.colliding_with(a).is_empty() {
                break;
            }
        }
        assert_eq!(sim.colliding_with(a), vec![b]);
        assert_eq!(sim.entity_index().len(), 2);
    }

    #[test]
    fn test_sealed_target_is_not_arrival() {
        let mut mesh = NavMesh::new(Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap();
        let door = Rect::new(700.0, 790.0, 100.0, 10.0);
        mesh.add_wall(Rect::new(700.0, 700.0, 100.0, 10.0));
        mesh.add_wall(Rect::new(700.0, 700.0, 10.0, 100.0));
        mesh.add_wall(Rect::new(790.0, 700.0, 10.0, 100.0));
        mesh.add_wall(door);
        let mut sim = Simulation::new(mesh, MovementConfig::default());
        let agent = sim.spawn_agent(Positional::circle(vec2(100.0, 100.0), 4.0), 200.0);
        sim.set_target(agent, Some(vec2(750.0, 750.0)));
        for _ in 0..10 {
            sim.tick(1.0 / 60.0);
        }
        assert!(!sim.has_arrived(agent));
        assert!(sim.is_unreachable(agent));
        assert_eq!(sim.position(agent), Some(vec2(100.0, 100.0)));

        // Opening the room and asking again plans a real route.
        assert!(sim.navigation_mut().remove_wall(&door));
        sim.set_target(agent, Some(vec2(750.0, 750.0)));
        sim.tick(1.0 / 60.0);
        assert!(!sim.is_unreachable(agent));
        assert!(!sim.has_arrived(agent));
        assert!(sim.position(agent).unwrap().distance(vec2(100.0, 100.0)) > 1.0);
    }

    #[test]
    fn test_set_target_needs_follower() {
        let mut sim = sim();
        let body = sim.spawn_body(Positional::point(vec2(1.0, 1.0)), Vec2::ZERO);
        assert!(!sim.set_target(body, Some(vec2(5.0, 5.0))));
    }
}
