//! Stop state logic
//!
//! Decides whether the vehicle should be held at a standstill, and whether
//! that hold should be a full stop (destination or long pedestrian wait) or a
//! soft stop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};

// Internal
use comms_if::{
    eqpt::chassis::GearPosition,
    planning::{MainDecision, StopReasonCode, Trajectory, TrajectoryPoint},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Reference speeds below this are considered to be stopped.
///
/// Units: meters/second
const STOP_SPEED_THRESHOLD: f64 = 1e-3;

/// Lower bound on the deceleration of a forward stop point.
///
/// Units: meters/second^2
const FORWARD_ACC_THRESHOLD: f64 = -1e-2;

/// Upper bound on the acceleration of a backward stop point.
///
/// Units: meters/second^2
const BACKWARD_ACC_THRESHOLD: f64 = 1e-1;

/// Speed below which the last point of a trajectory is treated as a parking
/// point.
///
/// Units: meters/second
const PARKING_SPEED: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Timer tracking how long the planner has been stopping for a pedestrian or
/// obstacle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PedestrianStopTimer {
    /// Time at which the current pedestrian stop started.
    ///
    /// Units: seconds
    pub start_time_s: f64,

    /// Time elapsed since the start of the current pedestrian stop.
    ///
    /// Units: seconds
    pub wait_time_s: f64,

    /// True if the previous cycle was a pedestrian stop
    pub prev_is_pedestrian: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PedestrianStopTimer {
    /// Update the timer with this cycle's stop reason, returning true if the
    /// pedestrian stop has lasted longer than `stop_time_s`.
    pub fn update(&mut self, reason: Option<StopReasonCode>, now_s: f64, stop_time_s: f64) -> bool {
        let is_pedestrian = matches!(
            reason,
            Some(StopReasonCode::Pedestrian) | Some(StopReasonCode::Obstacle)
        );

        if is_pedestrian {
            if !self.prev_is_pedestrian {
                self.start_time_s = now_s;
                debug!("Pedestrian stop started at {:.3} s", now_s);
            }
            self.wait_time_s = now_s - self.start_time_s;
        } else {
            self.start_time_s = 0.0;
            self.wait_time_s = 0.0;
        }

        self.prev_is_pedestrian = is_pedestrian;

        let long_term = self.wait_time_s > stop_time_s;
        debug!(
            "Pedestrian stop wait time {:.3} s (threshold {:.3} s), long term: {}",
            self.wait_time_s, stop_time_s, long_term
        );

        long_term
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the point at which the trajectory comes to a stop.
///
/// For drive the stop point is the first point at rest which is still
/// decelerating slightly, in any other gear the first point at rest which is
/// accelerating slightly. If no such point exists the last point is used.
pub fn find_stop_point(traj: &Trajectory) -> Option<&TrajectoryPoint> {
    let is_stop = |p: &&TrajectoryPoint| {
        if traj.gear == GearPosition::Drive {
            p.v.abs() < STOP_SPEED_THRESHOLD && p.a > FORWARD_ACC_THRESHOLD && p.a < 0.0
        } else {
            p.v > -STOP_SPEED_THRESHOLD && p.a < BACKWARD_ACC_THRESHOLD && p.a > 0.0
        }
    };

    match traj.points.iter().find(is_stop) {
        Some(p) => Some(p),
        None => {
            let last = traj.points.last()?;
            if last.v.abs() < PARKING_SPEED {
                debug!("No stop point found, last point used as parking point");
            } else {
                debug!("No stop point found, last point used although it is still moving");
            }
            Some(last)
        }
    }
}

/// Distance along the path from the current station to the stop point.
///
/// Units: meters
pub fn path_remain(traj: &Trajectory, current_station: f64) -> f64 {
    match find_stop_point(traj) {
        Some(p) => p.path_point.s - current_station,
        None => 0.0,
    }
}

/// True if the planner is stopping at the end of the mission or route.
pub fn is_stop_by_destination(decision: &MainDecision) -> bool {
    let by_destination = decision.mission_complete
        || matches!(
            decision.stop_reason(),
            Some(StopReasonCode::Destination)
                | Some(StopReasonCode::Signal)
                | Some(StopReasonCode::ReferenceEnd)
        );

    debug!(
        "Stop reason {:?}, mission complete {}, by destination: {}",
        decision.stop_reason(),
        decision.mission_complete,
        by_destination
    );

    by_destination
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::planning::{PathPoint, StopDecision};

    fn point(s: f64, v: f64, a: f64) -> TrajectoryPoint {
        TrajectoryPoint {
            path_point: PathPoint {
                x: s,
                s,
                ..Default::default()
            },
            v,
            a,
            relative_time: s,
        }
    }

    fn decision(reason: Option<StopReasonCode>) -> MainDecision {
        MainDecision {
            stop: reason.map(|reason_code| StopDecision { reason_code }),
            mission_complete: false,
        }
    }

    #[test]
    fn test_path_remain_drive() {
        let traj = Trajectory {
            gear: GearPosition::Drive,
            points: vec![
                point(0.0, 2.0, -1.0),
                point(5.0, 0.0, 0.0),
                point(8.0, 0.0, -0.005),
                point(10.0, 0.0, -0.005),
            ],
            ..Default::default()
        };

        // Point at s = 5 has zero acceleration so is not a stop point
        assert_eq!(path_remain(&traj, 1.0), 7.0);
    }

    #[test]
    fn test_path_remain_reverse() {
        let traj = Trajectory {
            gear: GearPosition::Reverse,
            points: vec![point(0.0, -1.0, 0.5), point(3.0, 0.0, 0.05), point(4.0, 0.0, 0.0)],
            ..Default::default()
        };

        assert_eq!(path_remain(&traj, 0.0), 3.0);
    }

    #[test]
    fn test_path_remain_falls_back_to_last_point() {
        let traj = Trajectory {
            gear: GearPosition::Drive,
            points: vec![point(0.0, 3.0, 0.0), point(20.0, 3.0, 0.0)],
            ..Default::default()
        };

        assert_eq!(path_remain(&traj, 12.0), 8.0);
        assert_eq!(path_remain(&Trajectory::default(), 12.0), 0.0);
    }

    #[test]
    fn test_stop_by_destination() {
        assert!(is_stop_by_destination(&decision(Some(StopReasonCode::Destination))));
        assert!(is_stop_by_destination(&decision(Some(StopReasonCode::Signal))));
        assert!(is_stop_by_destination(&decision(Some(StopReasonCode::ReferenceEnd))));
        assert!(!is_stop_by_destination(&decision(Some(StopReasonCode::Pedestrian))));
        assert!(!is_stop_by_destination(&decision(None)));

        let mut complete = decision(None);
        complete.mission_complete = true;
        assert!(is_stop_by_destination(&complete));
    }

    #[test]
    fn test_pedestrian_timer_latches_after_threshold() {
        let mut timer = PedestrianStopTimer::default();
        let ped = Some(StopReasonCode::Pedestrian);

        assert!(!timer.update(ped, 10.0, 5.0));
        assert!(!timer.update(ped, 14.0, 5.0));
        assert!(!timer.update(Some(StopReasonCode::Obstacle), 15.0, 5.0));
        assert!(timer.update(ped, 15.5, 5.0));
        assert_eq!(timer.start_time_s, 10.0);
        assert_eq!(timer.wait_time_s, 5.5);
    }

    #[test]
    fn test_pedestrian_timer_resets_on_reason_change() {
        let mut timer = PedestrianStopTimer::default();
        let ped = Some(StopReasonCode::Pedestrian);

        assert!(!timer.update(ped, 10.0, 5.0));
        assert!(!timer.update(Some(StopReasonCode::Signal), 13.0, 5.0));
        assert_eq!(timer.wait_time_s, 0.0);
        assert_eq!(timer.start_time_s, 0.0);

        // Restarts from the new pedestrian stop
        assert!(!timer.update(ped, 16.0, 5.0));
        assert_eq!(timer.start_time_s, 16.0);
        assert!(!timer.update(ped, 20.0, 5.0));
        assert!(timer.update(ped, 21.5, 5.0));
    }
}
