use std::time::Duration;

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::log::{LogPlugin, info};
use bevy::prelude::*;
use bevy_sph_pour::backend::{BackendKind, ComputeCapability};
use bevy_sph_pour::plugin::{FluidPlugin, FluidSet};
use bevy_sph_pour::simulation::FluidSimulation;

const FRAMES: u32 = 600;
const REPORT_EVERY: u32 = 60;

fn main() {
    // `cargo run --example headless_pour -- parallel`
    let parallel = std::env::args().any(|a| a == "parallel");

    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))),
        )
        .add_plugins(LogPlugin::default())
        .insert_resource(ComputeCapability { parallel_compute: parallel })
        .add_plugins(FluidPlugin {
            backend: if parallel { BackendKind::Parallel } else { BackendKind::Sequential },
            particle_count: 3_000,
            ..default()
        })
        .add_systems(Update, report.after(FluidSet::Simulate))
        .run();
}

fn report(sim: Option<Res<FluidSimulation>>, mut exit: EventWriter<AppExit>, mut frame: Local<u32>) {
    let Some(sim) = sim else { return };
    *frame += 1;

    if *frame % REPORT_EVERY == 0 {
        let particles = sim.particles();
        let n = particles.active().max(1) as f32;
        let mean_height = particles.positions().iter().map(|p| p.y).sum::<f32>() / n;
        let max_speed = particles.velocities().iter().map(|v| v.length()).fold(0.0, f32::max);
        let max_density = sim
            .solver()
            .particle_states()
            .iter()
            .take(particles.active())
            .map(|s| s.density)
            .fold(0.0, f32::max);
        info!(
            "frame {}: {}/{} particles, mean y {:.3}, max |v| {:.3}, max rho {:.1}",
            *frame,
            particles.active(),
            sim.generator().target_count(),
            mean_height,
            max_speed,
            max_density
        );
    }

    if *frame >= FRAMES {
        info!("Done. Exiting.");
        exit.write(AppExit::Success);
    }
}
