//! # Trajectory Control Benchmark
//!
//! Measures the cost of one receding-horizon solve on a straight reference, both from a cold
//! start and when warm started from the previous solution.

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::eqpt::vehicle::{Odometry, VelocityReading};
use nalgebra::Vector2;
use nav_lib::{
    path::Path,
    traj_ctrl::{Params, TrajCtrl},
};

fn mpc_benchmark(c: &mut Criterion) {
    // ---- Build the controller and reference ----

    let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 0.25);

    let odom = Odometry {
        position_m: [0.0, -0.3],
        heading_rad: 0.1,
        ..Default::default()
    };
    let vel = VelocityReading {
        linear_ms: 0.5,
        angular_rads: 0.0,
    };

    let mut ctrl = TrajCtrl::new(Params::default());

    // ---- Cold start ----

    c.bench_function("traj_ctrl_cold", |b| {
        b.iter(|| {
            ctrl.reset();
            ctrl.observe(&vel, &odom);
            ctrl.on_path_received(path.clone());
            ctrl.control()
        })
    });

    // ---- Warm start ----

    ctrl.reset();
    ctrl.observe(&vel, &odom);
    ctrl.on_path_received(path.clone());
    ctrl.control();

    c.bench_function("traj_ctrl_warm", |b| {
        b.iter(|| {
            ctrl.observe(&vel, &odom);
            ctrl.control()
        })
    });
}

criterion_group!(benches, mpc_benchmark);
criterion_main!(benches);
