//! # Control Interface
//!
//! Defines the command produced by the control pipeline each cycle, along with the telemetry
//! record describing how the longitudinal part of that command was computed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    eqpt::chassis::GearPosition,
    planning::{PathPoint, TrajectoryPoint},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The command sent to the vehicle's actuators.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ControlCommand {
    /// Throttle demand.
    ///
    /// Units: percent, [0, 100]
    pub throttle: f64,

    /// Brake demand. Never non-zero at the same time as `throttle`.
    ///
    /// Units: percent, [0, 100]
    pub brake: f64,

    /// Acceleration target, for vehicles driven directly by acceleration.
    ///
    /// Units: meters/second^2
    pub acceleration: f64,

    /// Steering target, written by the lateral controller.
    ///
    /// Units: percent, [-100, 100]
    pub steering_target: f64,

    /// Gear to engage
    pub gear_location: GearPosition,

    /// Longitudinal controller telemetry for this cycle
    pub lon_debug: LonDebug,
}

/// Telemetry of every intermediate value computed by the longitudinal controller in one cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LonDebug {
    // ---- STATION ----
    pub station_reference: f64,
    pub current_station: f64,
    pub station_error: f64,
    pub station_error_limited: f64,
    pub preview_station_error: f64,

    // ---- SPEED ----
    pub speed_reference: f64,
    pub current_speed: f64,
    pub speed_error: f64,
    pub preview_speed_reference: f64,
    pub preview_speed_error: f64,

    /// Output of the station controller
    pub speed_offset: f64,

    /// Input to the speed controller after limiting
    pub speed_controller_input_limited: f64,

    // ---- ACCELERATION ----
    pub acceleration_reference: f64,
    pub current_acceleration: f64,
    pub acceleration_error: f64,
    pub preview_acceleration_reference: f64,

    // ---- JERK ----
    pub jerk_reference: f64,
    pub current_jerk: f64,
    pub jerk_error: f64,

    // ---- REFERENCE POINTS ----
    pub current_matched_point: PathPoint,
    pub current_reference_point: TrajectoryPoint,
    pub preview_reference_point: TrajectoryPoint,

    // ---- COMMAND ----
    pub slope_offset_compensation: f64,
    pub vehicle_pitch: f64,
    pub acceleration_cmd_closeloop: f64,
    pub acceleration_cmd: f64,
    pub acceleration_lookup: f64,
    pub acceleration_lookup_limit: f64,
    pub speed_lookup: f64,
    pub calibration_value: f64,
    pub throttle_cmd: f64,
    pub brake_cmd: f64,
    pub pid_saturation_status: SaturationStatus,
    pub leadlag_saturation_status: SaturationStatus,

    // ---- STEERING GATE ----
    pub current_steer_interval: f64,
    pub is_wait_steer: bool,

    // ---- STOP STATE ----
    pub path_remain: f64,
    pub is_stop_reason_by_destination: bool,
    pub is_stop_reason_by_pedestrian: bool,
    pub is_full_stop: bool,
    pub is_full_stop_soft: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Saturation state of a controller's integrator, inner state, or output.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SaturationStatus {
    NotSaturated,
    PositiveSaturated,
    NegativeSaturated,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SaturationStatus {
    fn default() -> Self {
        SaturationStatus::NotSaturated
    }
}

impl SaturationStatus {
    /// Clamp `value` into `[low, high]`, returning the clamped value and the resulting status.
    pub fn clamp(value: f64, low: f64, high: f64) -> (f64, Self) {
        if value > high {
            (high, SaturationStatus::PositiveSaturated)
        } else if value < low {
            (low, SaturationStatus::NegativeSaturated)
        } else {
            (value, SaturationStatus::NotSaturated)
        }
    }
}
