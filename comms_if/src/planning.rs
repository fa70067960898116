//! # Planning Interface
//!
//! Defines the reference trajectory published by the planner. A trajectory is an ordered sequence
//! of points which is monotonic in both relative time and arc length.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::eqpt::chassis::GearPosition;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A point on the geometric path.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
pub struct PathPoint {
    /// Units: meters
    pub x: f64,

    /// Units: meters
    pub y: f64,

    /// Accumulated arc length from the start of the path.
    ///
    /// Units: meters
    pub s: f64,

    /// Tangent direction of the path, angle to the positive x axis.
    ///
    /// Units: radians
    pub theta: f64,

    /// Curvature of the path.
    ///
    /// Units: 1/meters
    pub kappa: f64,
}

/// A point on the reference trajectory, a path point with a speed profile attached.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
pub struct TrajectoryPoint {
    pub path_point: PathPoint,

    /// Reference speed.
    ///
    /// Units: meters/second
    pub v: f64,

    /// Reference acceleration.
    ///
    /// Units: meters/second^2
    pub a: f64,

    /// Time of this point relative to the trajectory header time.
    ///
    /// Units: seconds
    pub relative_time: f64,
}

/// Stop decision made by the planner.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct StopDecision {
    pub reason_code: StopReasonCode,
}

/// The planner's main decision attached to a trajectory.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
pub struct MainDecision {
    /// The stop decision, if the planner has decided to stop
    pub stop: Option<StopDecision>,

    /// True if the planner considers the current mission complete
    pub mission_complete: bool,
}

/// A reference trajectory snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    /// Absolute time corresponding to a relative time of zero.
    ///
    /// Units: seconds
    pub header_time_s: f64,

    /// Sequence number of the publication this trajectory was taken from
    pub sequence_num: u32,

    /// The gear the planner requests for this trajectory
    pub gear: GearPosition,

    pub trajectory_type: TrajectoryType,

    pub points: Vec<TrajectoryPoint>,

    pub decision: MainDecision,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The kind of trajectory produced by the planner.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrajectoryType {
    Unknown,
    Normal,
    PathFallback,
    SpeedFallback,
    OpenSpace,
}

/// Reasons the planner gives for a stop decision.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum StopReasonCode {
    Destination,
    Pedestrian,
    Obstacle,
    Signal,
    StopSign,
    YieldSign,
    ClearZone,
    Crosswalk,
    Creeper,
    ReferenceEnd,
    YellowSignal,
    PullOver,
    EmergencyStop,
    Other,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TrajectoryType {
    fn default() -> Self {
        TrajectoryType::Unknown
    }
}

impl MainDecision {
    /// Get the reason code of the stop decision, if there is one.
    pub fn stop_reason(&self) -> Option<StopReasonCode> {
        self.stop.map(|s| s.reason_code)
    }
}
