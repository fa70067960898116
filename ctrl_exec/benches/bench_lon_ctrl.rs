//! # Longitudinal Control Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::ctrl::ControlCommand;
use ctrl_lib::{
    lon_ctrl::{CalibrationTable, LonCtrl, Params},
    sim::{PointMassSim, SimParams, TrapezoidSpec},
    task::{ControlTask, CtrlInput},
};
use util::logger::{logger_init_stdout, LevelFilter};

const LON_CTRL_PARAMS: &str = include_str!("../../params/lon_ctrl.toml");
const CALIBRATION_TABLE: &str = include_str!("../../params/calibration_table.toml");

fn lon_ctrl_benchmark(c: &mut Criterion) {
    // Only warnings, so the controller's cycle logging doesn't skew timings
    logger_init_stdout(LevelFilter::Warn).unwrap();

    // ---- Build the controller and a mid-trajectory input ----

    let params: Params = util::params::from_str(LON_CTRL_PARAMS).unwrap();
    let table: CalibrationTable = util::params::from_str(CALIBRATION_TABLE).unwrap();

    let mut lon_ctrl = LonCtrl::new(params, table);
    lon_ctrl.init().unwrap();

    let trajectory = TrapezoidSpec {
        length_m: 100.0,
        cruise_speed_ms: 8.0,
        accel_ms2: 1.0,
        point_period_s: 0.1,
    }
    .build(0.0, 1);

    let mut sim = PointMassSim::new(SimParams {
        throttle_gain: 0.05,
        throttle_deadzone: 5.0,
        brake_gain: 0.08,
        brake_deadzone: 10.0,
        rolling_resistance: 0.05,
        grade_rad: 0.02,
    });

    // Drive up to speed so the cycle takes the nominal path
    let mut cmd = ControlCommand::default();
    for i in 0..500 {
        let vs = sim.vehicle_state();
        let chassis = sim.chassis();
        lon_ctrl
            .compute_command(
                &CtrlInput {
                    vehicle_state: &vs,
                    chassis: &chassis,
                    trajectory: &trajectory,
                    timestamp_s: i as f64 * 0.01,
                },
                &mut cmd,
            )
            .unwrap();
        sim.step(&cmd, 0.01);
    }

    let vs = sim.vehicle_state();
    let chassis = sim.chassis();
    let input = CtrlInput {
        vehicle_state: &vs,
        chassis: &chassis,
        trajectory: &trajectory,
        timestamp_s: 5.0,
    };

    c.bench_function("LonCtrl::compute_command", |b| {
        b.iter(|| lon_ctrl.compute_command(&input, &mut cmd).unwrap())
    });
}

criterion_group!(benches, lon_ctrl_benchmark);
criterion_main!(benches);
