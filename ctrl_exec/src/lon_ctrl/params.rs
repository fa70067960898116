//! Longitudinal control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::ctrl_common::{LeadLagParams, PidParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for longitudinal control
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Params {
    /// Control period.
    ///
    /// Units: seconds
    pub ts: f64,

    /// Number of control periods ahead of the current time at which the
    /// preview point is taken.
    pub preview_window: f64,

    /// If true the preview station and speed errors drive the controllers
    /// instead of the current ones.
    pub enable_speed_station_preview: bool,

    /// Magnitude of the limit on the station error fed to the station
    /// controller.
    ///
    /// Units: meters
    pub station_error_limit: f64,

    /// Magnitude of the limit on the speed controller input.
    ///
    /// Units: meters/second
    pub speed_controller_input_limit: f64,

    /// Speed at or below which the low speed gains are used.
    ///
    /// Units: meters/second
    pub switch_speed: f64,

    /// Station controller gains for forward gears
    pub station_pid: PidParams,

    /// Speed controller gains at low speed
    pub low_speed_pid: PidParams,

    /// Speed controller gains at high speed
    pub high_speed_pid: PidParams,

    /// Station controller gains in reverse
    pub reverse_station_pid: PidParams,

    /// Speed controller gains in reverse
    pub reverse_speed_pid: PidParams,

    /// If true the controller outputs are passed through lead-lag
    /// compensators.
    pub enable_leadlag_compensation: bool,

    pub station_leadlag: LeadLagParams,

    pub speed_leadlag: LeadLagParams,

    pub reverse_station_leadlag: LeadLagParams,

    pub reverse_speed_leadlag: LeadLagParams,

    /// Cutoff frequency of the pitch low-pass filter.
    ///
    /// Units: hertz
    pub pitch_filter_cutoff_freq: f64,

    /// Gain on the slope compensation, usually 0 (off) or 1 (on).
    pub enable_slope_offset: f64,

    /// If true the longitudinal command is zeroed while the steering is far
    /// from its target on trajectories of unknown type.
    pub use_steering_check: bool,

    /// Largest allowed difference between the steering target and the
    /// current steering before the steering check holds the vehicle.
    ///
    /// Units: percent
    pub steer_cmd_interval: f64,

    /// If true the preview reference is checked to determine whether the
    /// vehicle should be held stopped.
    pub use_preview_reference_check: bool,

    /// Largest preview reference acceleration considered to be stopped.
    ///
    /// Units: meters/second^2
    pub max_acceleration_when_stopped: f64,

    /// Distance to the stop point within which the vehicle is considered to
    /// be stopped.
    ///
    /// Units: meters
    pub max_path_remain_when_stopped: f64,

    /// Time a pedestrian or obstacle stop must last before it is treated as
    /// a long term stop.
    ///
    /// Units: seconds
    pub pedestrian_stop_time: f64,

    /// Magnitude of the acceleration held during a full stop.
    ///
    /// Units: meters/second^2
    pub standstill_acceleration: f64,

    /// Acceleration held during a soft stop.
    ///
    /// Units: meters/second^2
    pub standstill_normal_acceleration: f64,

    /// If true the acceleration used for the calibration lookup is capped
    /// at the vehicle's maximum acceleration.
    pub use_acceleration_lookup_limit: bool,

    /// If true the preview reference speed is used for the calibration
    /// lookup instead of the chassis speed.
    pub use_preview_speed_for_table: bool,

    /// If true reference points are only ever taken at or after the query
    /// time.
    pub query_forward_time_point_only: bool,

    /// Minimum throttle demand.
    ///
    /// Units: percent
    pub throttle_minimum_action: f64,

    /// Minimum brake demand.
    ///
    /// Units: percent
    pub brake_minimum_action: f64,

    /// If true a CSV record of each cycle is written to the session archive
    pub enable_csv_debug: bool,

    pub vehicle: VehicleParams,
}

/// Vehicle specific parameters used by the longitudinal controller
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct VehicleParams {
    /// Speed below which the vehicle is considered stopped.
    ///
    /// Units: meters/second
    pub max_abs_speed_when_stopped: f64,

    /// Throttle below which the vehicle does not respond.
    ///
    /// Units: percent
    pub throttle_deadzone: f64,

    /// Brake below which the vehicle does not respond.
    ///
    /// Units: percent
    pub brake_deadzone: f64,

    /// Units: meters/second^2
    pub max_acceleration: f64,
}

/// A single calibration sample
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRow {
    /// Units: meters/second
    pub speed: f64,

    /// Units: meters/second^2
    pub acceleration: f64,

    /// Throttle (positive) or brake (negative) command producing the
    /// acceleration at the speed.
    ///
    /// Units: percent
    pub command: f64,
}

/// Table mapping speed and acceleration to actuator command
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CalibrationTable {
    pub calibration: Vec<CalibrationRow>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Throttle below which no throttle is commanded.
    pub fn throttle_lower_bound(&self) -> f64 {
        self.vehicle.throttle_deadzone.max(self.throttle_minimum_action)
    }

    /// Brake below which no brake is commanded.
    pub fn brake_lower_bound(&self) -> f64 {
        self.vehicle.brake_deadzone.max(self.brake_minimum_action)
    }

    /// Time ahead of the current time at which the preview point is taken.
    ///
    /// Units: seconds
    pub fn preview_time(&self) -> f64 {
        self.preview_window * self.ts
    }
}

impl CalibrationTable {
    /// Iterate over the table's `(speed, acceleration, command)` samples.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.calibration
            .iter()
            .map(|r| (r.speed, r.acceleration, r.command))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
