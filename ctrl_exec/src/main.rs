//! Main control executable entry point.
//!
//! # Architecture
//!
//! The executable runs the control pipeline in closed loop against the point mass simulation:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the reference trajectory and the control pipeline
//!     - Main loop:
//!         - Acquire the vehicle state and chassis feedback from the simulation
//!         - Run the control pipeline
//!         - Step the simulation with the resulting command, or let it coast
//!           without one if the cycle failed
//!     - Stop the pipeline and save the controller state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use ctrl_lib::{
    lon_ctrl::{CalibrationTable, CsvSpeedLog, LonCtrl, Params, ThreadedSpeedLog},
    params::CtrlExecParams,
    sim::PointMassSim,
    task::{ControlPipeline, CtrlInput},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("ctrl_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Info, &session).wrap_err("Failed to initialise logging")?;

    info!("Longitudinal Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: CtrlExecParams =
        util::params::load("ctrl_exec.toml").wrap_err("Could not load exec params")?;
    let lon_params: Params =
        util::params::load("lon_ctrl.toml").wrap_err("Could not load LonCtrl params")?;
    let calibration_table: CalibrationTable = util::params::load("calibration_table.toml")
        .wrap_err("Could not load the calibration table")?;

    info!("Parameters loaded");

    if exec_params.cycle_period_s <= 0.0 {
        return Err(eyre!(
            "Cycle period must be positive, found {} s",
            exec_params.cycle_period_s
        ));
    }
    if (exec_params.cycle_period_s - lon_params.ts).abs() > 1e-9 {
        warn!(
            "LonCtrl period ({} s) differs from the cycle period ({} s)",
            lon_params.ts, exec_params.cycle_period_s
        );
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut lon_ctrl = LonCtrl::new(lon_params.clone(), calibration_table);
    if lon_params.enable_csv_debug {
        let arch = Archiver::from_path(&session, "speed_log.csv")
            .wrap_err("Could not create the speed log")?;
        lon_ctrl =
            lon_ctrl.with_speed_log(Box::new(ThreadedSpeedLog::new(Box::new(CsvSpeedLog::new(arch)))));
        info!("Speed log enabled");
    }

    let mut pipeline = ControlPipeline::new();
    pipeline.push(Box::new(lon_ctrl));
    pipeline.init().wrap_err("Failed to initialise the control pipeline")?;

    let trajectory = exec_params.trajectory.build(0.0, 1);
    info!(
        "Reference trajectory of {} points lasting {:.02} s",
        trajectory.points.len(),
        exec_params.trajectory.duration_s()
    );

    let mut sim = PointMassSim::new(exec_params.sim);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let num_cycles = (exec_params.duration_s / exec_params.cycle_period_s).ceil() as u64;
    let cycles_per_second = (1.0 / exec_params.cycle_period_s).round().max(1.0) as u64;
    let mut num_failed_cycles = 0u64;

    info!("Begining main loop\n");

    for cycle in 0..num_cycles {
        // Get cycle start time
        let cycle_start_instant = Instant::now();
        let time_s = cycle as f64 * exec_params.cycle_period_s;

        let vehicle_state = sim.vehicle_state();
        let chassis = sim.chassis();

        let input = CtrlInput {
            vehicle_state: &vehicle_state,
            chassis: &chassis,
            trajectory: &trajectory,
            timestamp_s: time_s,
        };

        // No command is applied on a failed cycle
        match pipeline.compute(&input) {
            Ok(cmd) => sim.step(&cmd, exec_params.cycle_period_s),
            Err(e) => {
                warn!("Error during control processing: {}", e);
                num_failed_cycles += 1;
                sim.coast(exec_params.cycle_period_s);
            }
        }

        if cycle % cycles_per_second == 0 {
            let (throttle, brake) = sim.actuators();
            info!(
                "t = {:6.2} s, s = {:7.3} m, v = {:6.3} m/s, throttle = {:5.1} %, brake = {:5.1} %",
                time_s,
                sim.position_m(),
                sim.speed_ms(),
                throttle,
                brake
            );
        }

        // ---- CYCLE MANAGEMENT ----

        if exec_params.real_time {
            let cycle_dur = Instant::now() - cycle_start_instant;

            match Duration::from_secs_f64(exec_params.cycle_period_s).checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - exec_params.cycle_period_s
                ),
            }
        }
    }

    // ---- SHUTDOWN ----

    pipeline.stop();

    info!(
        "Run complete: final position {:.3} m of {:.3} m, final speed {:.3} m/s, {} failed cycles",
        sim.position_m(),
        exec_params.trajectory.length_m,
        sim.speed_ms(),
        num_failed_cycles
    );

    for i in 0..pipeline.len() {
        if let Some(task) = pipeline.task(i) {
            if let Some(state) = task.state_json() {
                session
                    .save_json(format!("task_{}_state.json", i), &state)
                    .wrap_err("Could not save the controller state")?;
            }
        }
    }

    info!("End of execution");

    Ok(())
}
