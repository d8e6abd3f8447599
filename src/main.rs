// Headless demo: a walled arena with agents walking to random targets
// RUST_LOG=info (or debug / trace) shows what the mesh and agents are doing

use flume_nav::engine::{MovementConfig, NavMesh, Positional, Rect, Simulation};
use glam::Vec2;
use log::{error, info};
use rand::Rng;

// ============================================================================
// CONFIG
// ============================================================================

const ARENA_SIZE: f32 = 1000.0;
const AGENT_COUNT: usize = 64;
const AGENT_RADIUS: f32 = 4.0;
const AGENT_SPEED: f32 = 120.0;
const TICKS: usize = 1800;
const DT: f32 = 1.0 / 60.0;

// ============================================================================
// ARENA
// ============================================================================

fn build_arena(mesh: &mut NavMesh) {
    // Two long barriers with doorways, plus scattered pillars
    mesh.add_wall(Rect::new(300.0, 0.0, 20.0, 420.0));
    mesh.add_wall(Rect::new(300.0, 480.0, 20.0, 520.0));
    mesh.add_wall(Rect::new(650.0, 0.0, 20.0, 700.0));
    mesh.add_wall(Rect::new(650.0, 760.0, 20.0, 240.0));

    for i in 0..4 {
        let x = 80.0 + i as f32 * 50.0;
        mesh.add_wall(Rect::new(x, 200.0 + i as f32 * 120.0, 30.0, 30.0));
        mesh.add_wall(Rect::new(400.0 + i as f32 * 60.0, 150.0 + i as f32 * 160.0, 40.0, 40.0));
    }
    info!(
        "arena ready: {} walls, {} free nodes",
        mesh.wall_count(),
        mesh.node_count()
    );
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    let mut mesh = match NavMesh::new(Rect::new(0.0, 0.0, ARENA_SIZE, ARENA_SIZE)) {
        Ok(mesh) => mesh,
        Err(e) => {
            error!("cannot build nav mesh: {e}");
            return;
        }
    };
    build_arena(&mut mesh);

    let config = MovementConfig {
        path_width: AGENT_RADIUS * 1.5,
        ..Default::default()
    };
    let mut sim = Simulation::new(mesh, config);
    let mut rng = rand::thread_rng();

    let mut agents = Vec::with_capacity(AGENT_COUNT);
    for _ in 0..AGENT_COUNT {
        let origin = Vec2::new(rng.gen_range(0.0..ARENA_SIZE), rng.gen_range(0.0..ARENA_SIZE));
        let spawn = match sim.navigation().random_area(origin, 0.0, 50.0, &mut rng) {
            Ok(area) => area.center(),
            Err(e) => {
                error!("no room to spawn: {e}");
                return;
            }
        };
        let target = match sim.navigation().random_area(spawn, 200.0, 800.0, &mut rng) {
            Ok(area) => area.center(),
            Err(e) => {
                error!("no target area: {e}");
                return;
            }
        };
        let agent = sim.spawn_agent(Positional::circle(spawn, AGENT_RADIUS), AGENT_SPEED);
        sim.set_target(agent, Some(target));
        agents.push(agent);
    }
    println!("Spawned {} agents", agents.len());

    let mut arrived = 0;
    for tick in 1..=TICKS {
        sim.tick(DT);
        if tick % 300 == 0 {
            arrived = agents.iter().filter(|a| sim.has_arrived(**a)).count();
            info!("t={:.1}s: {}/{} agents arrived", tick as f32 * DT, arrived, agents.len());
        }
    }

    let touching = agents
        .iter()
        .filter(|a| !sim.colliding_with(**a).is_empty())
        .count();
    let stranded = agents.iter().filter(|a| sim.is_unreachable(**a)).count();
    println!(
        "Done: {}/{} arrived, {} with no route, {} touching another agent, {} indexed",
        arrived,
        agents.len(),
        stranded,
        touching,
        sim.entity_index().len()
    );
}
