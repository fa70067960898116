//! Longitudinal control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

// Internal
use super::{
    stop, CalibrationTable, LonCtrlError, Params, PedestrianStopTimer, SpeedLogRecord,
    SpeedLogSink,
};
use crate::{
    ctrl_common::{
        DigitalFilter, Interpolation2D, LeadLagController, PidController, TrajAnalyzer,
        TrajAnalyzerError,
    },
    task::{ControlTask, CtrlInput, TaskError},
};
use comms_if::{
    ctrl::{ControlCommand, LonDebug},
    eqpt::chassis::GearPosition,
    planning::TrajectoryType,
};
use util::maths::{clamp, normalize_angle};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the longitudinal control task
const NAME: &str = "PID-based Longitudinal Controller";

/// Gravitational acceleration used for the slope compensation.
///
/// Units: meters/second^2
const GRA_ACC: f64 = 9.8;

/// Largest command that can be sent to the throttle or brake.
///
/// Units: percent
const MAX_ACTUATOR_CMD: f64 = 100.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The longitudinal controller.
pub struct LonCtrl {
    params: Params,

    calibration_table: CalibrationTable,

    /// Interpolator built from the calibration table during `init`
    interpolator: Option<Interpolation2D>,

    station_pid: PidController,
    speed_pid: PidController,

    station_leadlag: LeadLagController,
    speed_leadlag: LeadLagController,

    /// Low-pass filter on the slope compensation, built during `init`
    pitch_filter: Option<DigitalFilter>,

    /// Analyzer of the current trajectory, rebuilt when the trajectory's
    /// sequence number changes.
    traj_analyzer: Option<TrajAnalyzer>,

    state: LonCtrlState,

    /// Optional destination for the per-cycle speed log
    speed_log: Option<Box<dyn SpeedLogSink>>,
}

/// Values carried between control cycles.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LonCtrlState {
    /// Current acceleration in the previous cycle.
    ///
    /// Units: meters/second^2
    pub prev_acceleration: f64,

    /// Reference acceleration in the previous cycle.
    ///
    /// Units: meters/second^2
    pub prev_acceleration_reference: f64,

    pub pedestrian_timer: PedestrianStopTimer,
}

/// Snapshot of all of the controller's dynamic state, used to save and
/// restore the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LonCtrlSnapshot {
    pub state: LonCtrlState,
    pub station_pid: PidController,
    pub speed_pid: PidController,
    pub station_leadlag: LeadLagController,
    pub speed_leadlag: LeadLagController,
    pub pitch_filter: Option<DigitalFilter>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LonCtrl {
    /// Create a new controller from its parameters and calibration table.
    ///
    /// The controller must be initialised with [`ControlTask::init`] before
    /// use.
    pub fn new(params: Params, calibration_table: CalibrationTable) -> Self {
        let station_pid = PidController::new(&params.station_pid);
        let speed_pid = PidController::new(&params.low_speed_pid);
        let station_leadlag = LeadLagController::new(&params.station_leadlag, params.ts);
        let speed_leadlag = LeadLagController::new(&params.speed_leadlag, params.ts);

        Self {
            params,
            calibration_table,
            interpolator: None,
            station_pid,
            speed_pid,
            station_leadlag,
            speed_leadlag,
            pitch_filter: None,
            traj_analyzer: None,
            state: LonCtrlState::default(),
            speed_log: None,
        }
    }

    /// Attach a sink to which a speed log record is written every cycle.
    pub fn with_speed_log(mut self, sink: Box<dyn SpeedLogSink>) -> Self {
        self.speed_log = Some(sink);
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Values carried between cycles.
    pub fn state(&self) -> &LonCtrlState {
        &self.state
    }

    pub fn station_pid(&self) -> &PidController {
        &self.station_pid
    }

    pub fn speed_pid(&self) -> &PidController {
        &self.speed_pid
    }

    /// Take a snapshot of the controller's dynamic state.
    pub fn snapshot(&self) -> LonCtrlSnapshot {
        LonCtrlSnapshot {
            state: self.state,
            station_pid: self.station_pid.clone(),
            speed_pid: self.speed_pid.clone(),
            station_leadlag: self.station_leadlag.clone(),
            speed_leadlag: self.speed_leadlag.clone(),
            pitch_filter: self.pitch_filter.clone(),
        }
    }

    /// Restore the controller's dynamic state from a snapshot.
    pub fn restore(&mut self, snapshot: LonCtrlSnapshot) {
        self.state = snapshot.state;
        self.station_pid = snapshot.station_pid;
        self.speed_pid = snapshot.speed_pid;
        self.station_leadlag = snapshot.station_leadlag;
        self.speed_leadlag = snapshot.speed_leadlag;
        if snapshot.pitch_filter.is_some() {
            self.pitch_filter = snapshot.pitch_filter;
        }
    }

    /// Validate the parameters and build the calibration interpolator and
    /// pitch filter.
    fn init_ctrl(&mut self) -> Result<(), LonCtrlError> {
        if !(self.params.ts > 0.0) || !self.params.ts.is_finite() {
            return Err(LonCtrlError::InvalidParams(format!(
                "control period must be positive, got {}",
                self.params.ts
            )));
        }
        if self.params.station_error_limit < 0.0 || self.params.speed_controller_input_limit < 0.0 {
            return Err(LonCtrlError::InvalidParams(
                "error limits must not be negative".into(),
            ));
        }

        let interpolator = Interpolation2D::new(self.calibration_table.samples())?;
        info!(
            "Calibration table loaded with {} rows over {} speeds",
            self.calibration_table.calibration.len(),
            interpolator.num_speeds()
        );

        let pitch_filter =
            DigitalFilter::low_pass(self.params.ts, self.params.pitch_filter_cutoff_freq)?;

        self.interpolator = Some(interpolator);
        self.pitch_filter = Some(pitch_filter);

        self.station_pid = PidController::new(&self.params.station_pid);
        self.speed_pid = PidController::new(&self.params.low_speed_pid);
        self.station_leadlag = LeadLagController::new(&self.params.station_leadlag, self.params.ts);
        self.speed_leadlag = LeadLagController::new(&self.params.speed_leadlag, self.params.ts);
        self.state = LonCtrlState::default();

        info!("{} initialised", NAME);

        Ok(())
    }

    /// Run one control cycle.
    ///
    /// The command is only modified if the cycle succeeds.
    fn compute(&mut self, input: &CtrlInput, cmd: &mut ControlCommand) -> Result<(), LonCtrlError> {
        if self.interpolator.is_none() {
            return Err(LonCtrlError::NoInterpolator);
        }
        if input.trajectory.points.is_empty() {
            return Err(LonCtrlError::TrajAnalyzer(TrajAnalyzerError::EmptyTrajectory));
        }

        let preview_time = self.params.preview_time();
        if preview_time < 0.0 {
            return Err(LonCtrlError::NegativePreviewTime(preview_time));
        }

        // Rebuild the analyzer only when a new trajectory arrives
        let seq_num = input.trajectory.sequence_num;
        if self.traj_analyzer.as_ref().map(|t| t.seq_num()) != Some(seq_num) {
            debug!("New trajectory {}, rebuilding the analyzer", seq_num);
            self.traj_analyzer = Some(TrajAnalyzer::new(input.trajectory));
        }

        let mut dbg = LonDebug::default();
        self.compute_longitudinal_errors(input, preview_time, &mut dbg)?;

        let p = &self.params;
        let ts = p.ts;
        let vs = input.vehicle_state;
        let chassis = input.chassis;
        let traj = input.trajectory;

        // ---- GAIN SELECTION ----

        if traj.gear == GearPosition::Reverse {
            self.station_pid.set_pid(&p.reverse_station_pid);
            self.speed_pid.set_pid(&p.reverse_speed_pid);
            if p.enable_leadlag_compensation {
                if self.station_leadlag.params() != &p.reverse_station_leadlag {
                    self.station_leadlag.set_lead_lag(&p.reverse_station_leadlag);
                }
                if self.speed_leadlag.params() != &p.reverse_speed_leadlag {
                    self.speed_leadlag.set_lead_lag(&p.reverse_speed_leadlag);
                }
            }
        } else {
            self.station_pid.set_pid(&p.station_pid);
            if vs.linear_velocity <= p.switch_speed {
                self.speed_pid.set_pid(&p.low_speed_pid);
            } else {
                self.speed_pid.set_pid(&p.high_speed_pid);
            }
            if p.enable_leadlag_compensation {
                if self.station_leadlag.params() != &p.station_leadlag {
                    self.station_leadlag.set_lead_lag(&p.station_leadlag);
                }
                if self.speed_leadlag.params() != &p.speed_leadlag {
                    self.speed_leadlag.set_lead_lag(&p.speed_leadlag);
                }
            }
        }

        // ---- STATION CONTROL ----

        let station_error = if p.enable_speed_station_preview {
            dbg.preview_station_error
        } else {
            dbg.station_error
        };
        let station_error_limited =
            clamp(station_error, -p.station_error_limit, p.station_error_limit);

        let mut speed_offset = self.station_pid.control(station_error_limited, ts);
        if p.enable_leadlag_compensation {
            speed_offset = self.station_leadlag.control(speed_offset, ts);
        }

        // ---- SPEED CONTROL ----

        let speed_error = if p.enable_speed_station_preview {
            dbg.preview_speed_error
        } else {
            dbg.speed_error
        };
        let speed_controller_input_limited = clamp(
            speed_offset + speed_error,
            -p.speed_controller_input_limit,
            p.speed_controller_input_limit,
        );

        let mut acceleration_cmd_closeloop =
            self.speed_pid.control(speed_controller_input_limited, ts);
        dbg.pid_saturation_status = self.speed_pid.integrator_saturation_status();
        if p.enable_leadlag_compensation {
            acceleration_cmd_closeloop =
                self.speed_leadlag.control(acceleration_cmd_closeloop, ts);
            dbg.leadlag_saturation_status = self.speed_leadlag.innerstate_saturation_status();
        }

        if chassis.gear_location == GearPosition::Neutral {
            self.speed_pid.reset_integral();
            self.station_pid.reset_integral();
        }

        // ---- SLOPE COMPENSATION ----

        let mut slope_offset_compensation = 0.0;
        if let Some(filter) = self.pitch_filter.as_mut() {
            slope_offset_compensation = filter.filter(GRA_ACC * vs.pitch.sin());
            if !slope_offset_compensation.is_finite() {
                filter.reset_values();
                slope_offset_compensation = 0.0;
            }
        }
        dbg.slope_offset_compensation = slope_offset_compensation;
        dbg.vehicle_pitch = vs.pitch;

        let mut acceleration_cmd = acceleration_cmd_closeloop
            + dbg.preview_acceleration_reference
            + p.enable_slope_offset * slope_offset_compensation;

        // ---- STEERING CHECK ----

        // Hold the vehicle while the steering catches up with its target
        let current_steer_interval = cmd.steering_target - chassis.steering_percentage;
        if p.use_steering_check
            && traj.trajectory_type == TrajectoryType::Unknown
            && current_steer_interval.abs() > p.steer_cmd_interval
        {
            debug!(
                "Steering interval {:.2} exceeds {:.2}, waiting for steering",
                current_steer_interval, p.steer_cmd_interval
            );
            self.speed_pid.reset_integral();
            self.station_pid.reset_integral();
            acceleration_cmd = 0.0;
            dbg.is_wait_steer = true;
        }
        dbg.current_steer_interval = current_steer_interval;

        // ---- STOP LOGIC ----

        dbg.path_remain = stop::path_remain(traj, dbg.current_station);
        dbg.is_stop_reason_by_destination = stop::is_stop_by_destination(&traj.decision);
        dbg.is_stop_reason_by_pedestrian = self.state.pedestrian_timer.update(
            traj.decision.stop_reason(),
            input.timestamp_s,
            p.pedestrian_stop_time,
        );

        let stop_for_reason = dbg.is_stop_reason_by_destination || dbg.is_stop_reason_by_pedestrian;
        let is_open_space = traj.trajectory_type == TrajectoryType::OpenSpace;

        if p.use_preview_reference_check
            && dbg.preview_acceleration_reference.abs() <= p.max_acceleration_when_stopped
            && dbg.preview_speed_reference.abs() <= p.vehicle.max_abs_speed_when_stopped
            && !is_open_space
        {
            if stop_for_reason {
                dbg.is_full_stop = true;
                debug!("Full stop, preview reference is stopped");
            } else {
                dbg.is_full_stop_soft = true;
                debug!("Soft stop, preview reference is stopped");
            }
        }

        if dbg.path_remain.abs() < p.max_path_remain_when_stopped {
            if stop_for_reason || is_open_space {
                dbg.is_full_stop = true;
                debug!(
                    "Full stop, path remain {:.3} m within {:.3} m (destination: {}, pedestrian: {})",
                    dbg.path_remain,
                    p.max_path_remain_when_stopped,
                    dbg.is_stop_reason_by_destination,
                    dbg.is_stop_reason_by_pedestrian
                );
            } else {
                dbg.is_full_stop_soft = true;
                debug!(
                    "Soft stop, path remain {:.3} m within {:.3} m",
                    dbg.path_remain, p.max_path_remain_when_stopped
                );
            }
        }

        if chassis.speed_mps < p.vehicle.max_abs_speed_when_stopped
            && dbg.is_stop_reason_by_pedestrian
        {
            debug!("Full stop, long term pedestrian stop");
            dbg.is_full_stop = true;
        }

        if dbg.is_full_stop {
            acceleration_cmd = if chassis.gear_location == GearPosition::Reverse {
                acceleration_cmd.max(-p.standstill_acceleration)
            } else {
                acceleration_cmd.min(p.standstill_acceleration)
            };
            self.speed_pid.reset_integral();
            self.station_pid.reset_integral();
        }

        if dbg.is_full_stop_soft {
            acceleration_cmd = if acceleration_cmd >= 0.0 {
                acceleration_cmd.min(p.standstill_normal_acceleration)
            } else {
                p.standstill_normal_acceleration
            };
            self.speed_pid.reset_integral();
            self.station_pid.reset_integral();
        }

        // ---- CALIBRATION LOOKUP ----

        let throttle_lower_bound = p.throttle_lower_bound();
        let brake_lower_bound = p.brake_lower_bound();

        let acceleration_lookup = if chassis.gear_location == GearPosition::Reverse {
            -acceleration_cmd
        } else {
            acceleration_cmd
        };

        let acceleration_lookup_limit = if p.use_acceleration_lookup_limit {
            acceleration_lookup.min(
                p.vehicle.max_acceleration + p.enable_slope_offset * slope_offset_compensation,
            )
        } else {
            0.0
        };

        let speed_lookup = if p.use_preview_speed_for_table {
            dbg.preview_speed_reference
        } else {
            chassis.speed_mps
        };

        let table_acceleration = if p.use_acceleration_lookup_limit {
            acceleration_lookup_limit
        } else {
            acceleration_lookup
        };

        let calibration_value = match self.interpolator.as_ref() {
            Some(i) => i
                .interpolate(speed_lookup, table_acceleration)
                .map_err(LonCtrlError::CalibrationLookup)?,
            None => return Err(LonCtrlError::NoInterpolator),
        };

        let (throttle_cmd, brake_cmd) = if acceleration_lookup >= 0.0 {
            let throttle = if calibration_value >= 0.0 {
                calibration_value.max(throttle_lower_bound)
            } else {
                throttle_lower_bound
            };
            (throttle.min(MAX_ACTUATOR_CMD), 0.0)
        } else {
            let brake = if calibration_value >= 0.0 {
                brake_lower_bound
            } else {
                (-calibration_value).max(brake_lower_bound)
            };
            (0.0, brake.min(MAX_ACTUATOR_CMD))
        };

        dbg.station_error_limited = station_error_limited;
        dbg.speed_offset = speed_offset;
        dbg.speed_controller_input_limited = speed_controller_input_limited;
        dbg.acceleration_cmd_closeloop = acceleration_cmd_closeloop;
        dbg.acceleration_cmd = acceleration_cmd;
        dbg.acceleration_lookup = acceleration_lookup;
        dbg.acceleration_lookup_limit = acceleration_lookup_limit;
        dbg.speed_lookup = speed_lookup;
        dbg.calibration_value = calibration_value;
        dbg.throttle_cmd = throttle_cmd;
        dbg.brake_cmd = brake_cmd;

        trace!(
            "station err {:.3} (lim {:.3}), speed err {:.3} (lim {:.3}), acc cmd {:.3}, \
            throttle {:.2}, brake {:.2}",
            dbg.station_error,
            station_error_limited,
            dbg.speed_error,
            speed_controller_input_limited,
            acceleration_cmd,
            throttle_cmd,
            brake_cmd
        );

        if let Some(log) = self.speed_log.as_mut() {
            log.log(&SpeedLogRecord::from(&dbg));
        }

        // ---- OUTPUT ----

        cmd.throttle = throttle_cmd;
        cmd.brake = brake_cmd;
        cmd.acceleration = if p.use_acceleration_lookup_limit {
            acceleration_lookup_limit
        } else {
            acceleration_cmd
        };

        cmd.gear_location = if vs.linear_velocity.abs() <= p.vehicle.max_abs_speed_when_stopped
            || chassis.gear_location == traj.gear
            || chassis.gear_location == GearPosition::Neutral
        {
            traj.gear
        } else {
            chassis.gear_location
        };

        cmd.lon_debug = dbg;

        Ok(())
    }

    /// Compute the station, speed, acceleration and jerk errors relative to
    /// the reference and preview points.
    fn compute_longitudinal_errors(
        &mut self,
        input: &CtrlInput,
        preview_time: f64,
        dbg: &mut LonDebug,
    ) -> Result<(), LonCtrlError> {
        let ta = match self.traj_analyzer.as_ref() {
            Some(t) => t,
            None => return Err(LonCtrlError::TrajAnalyzer(TrajAnalyzerError::EmptyTrajectory)),
        };
        let vs = input.vehicle_state;
        let ts = self.params.ts;
        let forward_only = self.params.query_forward_time_point_only;

        let matched = ta.query_matched_path_point(vs.x, vs.y)?;
        let frenet = ta.to_trajectory_frame(vs.x, vs.y, vs.heading, vs.linear_velocity, &matched);

        let reference = ta.query_nearest_point_by_absolute_time(input.timestamp_s, forward_only)?;
        let preview = ta
            .query_nearest_point_by_absolute_time(input.timestamp_s + preview_time, forward_only)?;

        let heading_error = normalize_angle(vs.heading - matched.theta);
        let lon_speed = vs.linear_velocity * heading_error.cos();
        let lon_acceleration = vs.linear_acceleration * heading_error.cos();
        let one_minus_kappa_lat_error =
            1.0 - reference.path_point.kappa * vs.linear_velocity * heading_error.sin();

        dbg.current_matched_point = matched;
        dbg.current_reference_point = reference;
        dbg.preview_reference_point = preview;

        dbg.station_reference = reference.path_point.s;
        dbg.current_station = frenet.s;
        dbg.station_error = reference.path_point.s - frenet.s;

        dbg.speed_reference = reference.v;
        dbg.current_speed = lon_speed;
        dbg.speed_error = reference.v - frenet.s_dot;

        dbg.acceleration_reference = reference.a;
        dbg.current_acceleration = lon_acceleration;
        dbg.acceleration_error = reference.a - lon_acceleration / one_minus_kappa_lat_error;

        dbg.jerk_reference = (reference.a - self.state.prev_acceleration_reference) / ts;
        dbg.current_jerk = (lon_acceleration - self.state.prev_acceleration) / ts;
        dbg.jerk_error = dbg.jerk_reference - dbg.current_jerk / one_minus_kappa_lat_error;

        self.state.prev_acceleration_reference = reference.a;
        self.state.prev_acceleration = lon_acceleration;

        dbg.preview_station_error = preview.path_point.s - frenet.s;
        dbg.preview_speed_error = preview.v - frenet.s_dot;
        dbg.preview_speed_reference = preview.v;
        dbg.preview_acceleration_reference = preview.a;

        Ok(())
    }
}

impl ControlTask for LonCtrl {
    fn name(&self) -> &str {
        NAME
    }

    fn init(&mut self) -> Result<(), TaskError> {
        self.init_ctrl().map_err(TaskError::from)
    }

    fn compute_command(
        &mut self,
        input: &CtrlInput,
        cmd: &mut ControlCommand,
    ) -> Result<(), TaskError> {
        self.compute(input, cmd).map_err(TaskError::from)
    }

    fn reset(&mut self) -> Result<(), TaskError> {
        self.station_pid.reset();
        self.speed_pid.reset();
        self.station_leadlag.reset();
        self.speed_leadlag.reset();
        self.state = LonCtrlState::default();
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut log) = self.speed_log.take() {
            log.close();
        }
    }

    fn state_json(&self) -> Option<serde_json::Value> {
        match serde_json::to_value(self.snapshot()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Could not serialise the controller state: {}", e);
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
