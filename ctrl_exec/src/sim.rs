//! # Longitudinal simulation
//!
//! A point mass vehicle moving along the x axis, driven by the throttle and
//! brake of a [`ControlCommand`], along with a builder for straight reference
//! trajectories with a trapezoidal speed profile. Used to run the controllers
//! in closed loop without a vehicle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use comms_if::{
    ctrl::ControlCommand,
    eqpt::{chassis::Chassis, chassis::GearPosition, loc::VehicleState},
    planning::{
        MainDecision, PathPoint, StopDecision, StopReasonCode, Trajectory, TrajectoryPoint,
        TrajectoryType,
    },
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Units: meters/second^2
const GRA_ACC: f64 = 9.8;

/// Speeds below this are treated as stationary.
///
/// Units: meters/second
const STATIONARY_SPEED: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated vehicle
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct SimParams {
    /// Acceleration per percent of throttle above the deadzone.
    ///
    /// Units: meters/second^2/percent
    pub throttle_gain: f64,

    /// Units: percent
    pub throttle_deadzone: f64,

    /// Deceleration per percent of brake above the deadzone.
    ///
    /// Units: meters/second^2/percent
    pub brake_gain: f64,

    /// Units: percent
    pub brake_deadzone: f64,

    /// Deceleration due to rolling resistance while moving.
    ///
    /// Units: meters/second^2
    pub rolling_resistance: f64,

    /// Road grade, positive uphill along +x.
    ///
    /// Units: radians
    pub grade_rad: f64,
}

/// Point mass vehicle simulation.
#[derive(Debug, Clone)]
pub struct PointMassSim {
    params: SimParams,

    /// Units: meters
    position_m: f64,

    /// Signed speed along +x.
    ///
    /// Units: meters/second
    speed_ms: f64,

    /// Units: meters/second^2
    accel_ms2: f64,

    /// Actuator state left by the last applied command.
    gear: GearPosition,
    throttle: f64,
    brake: f64,
}

/// Parameters of a straight reference trajectory with a trapezoidal speed
/// profile.
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct TrapezoidSpec {
    /// Units: meters
    pub length_m: f64,

    /// Units: meters/second
    pub cruise_speed_ms: f64,

    /// Magnitude of the acceleration and deceleration.
    ///
    /// Units: meters/second^2
    pub accel_ms2: f64,

    /// Time between trajectory points.
    ///
    /// Units: seconds
    pub point_period_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PointMassSim {
    /// Create a new simulation with the vehicle at rest at the origin.
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            position_m: 0.0,
            speed_ms: 0.0,
            accel_ms2: 0.0,
            gear: GearPosition::Drive,
            throttle: 0.0,
            brake: 0.0,
        }
    }

    pub fn position_m(&self) -> f64 {
        self.position_m
    }

    pub fn speed_ms(&self) -> f64 {
        self.speed_ms
    }

    /// Current throttle and brake positions.
    ///
    /// Units: percent
    pub fn actuators(&self) -> (f64, f64) {
        (self.throttle, self.brake)
    }

    /// Apply the given command and advance the simulation by `dt` seconds.
    pub fn step(&mut self, cmd: &ControlCommand, dt: f64) {
        self.gear = cmd.gear_location;
        self.throttle = cmd.throttle;
        self.brake = cmd.brake;

        self.advance(dt);
    }

    /// Advance the simulation by `dt` seconds with no command applied.
    ///
    /// The pedals are released and the gearbox stays in its current gear.
    pub fn coast(&mut self, dt: f64) {
        self.throttle = 0.0;
        self.brake = 0.0;

        self.advance(dt);
    }

    /// Integrate the vehicle over `dt` seconds under the current actuator
    /// state.
    fn advance(&mut self, dt: f64) {
        let direction = match self.gear {
            GearPosition::Reverse => -1.0,
            GearPosition::Drive | GearPosition::Low => 1.0,
            _ => 0.0,
        };

        let throttle = (self.throttle - self.params.throttle_deadzone).max(0.0);
        let brake = (self.brake - self.params.brake_deadzone).max(0.0);

        // Forces which push the vehicle regardless of its motion
        let drive = direction * throttle * self.params.throttle_gain
            - GRA_ACC * self.params.grade_rad.sin();

        // Forces which only ever oppose motion
        let resistance = brake * self.params.brake_gain + self.params.rolling_resistance;

        if self.speed_ms.abs() < STATIONARY_SPEED {
            // Held in place unless the drive overcomes the resistance
            if drive.abs() <= resistance {
                self.accel_ms2 = 0.0;
                self.speed_ms = 0.0;
                return;
            }
            self.accel_ms2 = drive - drive.signum() * resistance;
        } else {
            self.accel_ms2 = drive - self.speed_ms.signum() * resistance;
        }

        let new_speed = self.speed_ms + self.accel_ms2 * dt;

        // Resistance brings the vehicle to rest, it can't push it backwards
        if new_speed * self.speed_ms < 0.0 && drive.abs() <= resistance {
            let t_stop = (self.speed_ms / self.accel_ms2).abs();
            self.position_m += 0.5 * self.speed_ms * t_stop;
            self.speed_ms = 0.0;
            return;
        }

        self.position_m += 0.5 * (self.speed_ms + new_speed) * dt;
        self.speed_ms = new_speed;
    }

    /// Current state of the vehicle as seen by localisation.
    pub fn vehicle_state(&self) -> VehicleState {
        VehicleState {
            x: self.position_m,
            y: 0.0,
            heading: 0.0,
            linear_velocity: self.speed_ms,
            linear_acceleration: self.accel_ms2,
            pitch: self.params.grade_rad,
        }
    }

    /// Current chassis feedback.
    pub fn chassis(&self) -> Chassis {
        Chassis {
            gear_location: self.gear,
            speed_mps: self.speed_ms.abs(),
            steering_percentage: 0.0,
        }
    }
}

impl TrapezoidSpec {
    /// Speed profile at time `t`, returning `(s, v, a)`.
    fn profile(&self, t: f64) -> (f64, f64, f64) {
        let accel = self.accel_ms2.abs();

        // Triangular profile if the cruise speed can't be reached
        let ramp_dist = 0.5 * self.cruise_speed_ms.powi(2) / accel;
        let (peak_speed, cruise_time) = if 2.0 * ramp_dist > self.length_m {
            ((self.length_m * accel).sqrt(), 0.0)
        } else {
            (
                self.cruise_speed_ms,
                (self.length_m - 2.0 * ramp_dist) / self.cruise_speed_ms,
            )
        };
        let ramp_time = peak_speed / accel;
        let ramp_dist = 0.5 * peak_speed * ramp_time;
        let total_time = 2.0 * ramp_time + cruise_time;

        if t <= 0.0 {
            (0.0, 0.0, accel)
        } else if t < ramp_time {
            (0.5 * accel * t * t, accel * t, accel)
        } else if t < ramp_time + cruise_time {
            (ramp_dist + peak_speed * (t - ramp_time), peak_speed, 0.0)
        } else if t < total_time {
            let td = total_time - t;
            (self.length_m - 0.5 * accel * td * td, accel * td, -accel)
        } else {
            (self.length_m, 0.0, 0.0)
        }
    }

    /// Total duration of the profile.
    ///
    /// Units: seconds
    pub fn duration_s(&self) -> f64 {
        let accel = self.accel_ms2.abs();
        let ramp_dist = 0.5 * self.cruise_speed_ms.powi(2) / accel;
        if 2.0 * ramp_dist > self.length_m {
            2.0 * (self.length_m / accel).sqrt()
        } else {
            2.0 * self.cruise_speed_ms / accel
                + (self.length_m - 2.0 * ramp_dist) / self.cruise_speed_ms
        }
    }

    /// Build the trajectory, which ends at rest with a destination stop.
    pub fn build(&self, header_time_s: f64, sequence_num: u32) -> Trajectory {
        let duration = self.duration_s();

        let mut points: Vec<TrajectoryPoint> = Vec::new();
        if self.point_period_s > 0.0 {
            points.extend(
                (0..)
                    .map(|i| i as f64 * self.point_period_s)
                    .take_while(|&t| t < duration - 1e-9)
                    .map(|t| self.point(t)),
            );
        }
        points.push(self.point(duration));

        Trajectory {
            header_time_s,
            sequence_num,
            gear: GearPosition::Drive,
            trajectory_type: TrajectoryType::Normal,
            points,
            decision: MainDecision {
                stop: Some(StopDecision {
                    reason_code: StopReasonCode::Destination,
                }),
                mission_complete: false,
            },
        }
    }

    fn point(&self, t: f64) -> TrajectoryPoint {
        let (s, v, a) = self.profile(t);
        TrajectoryPoint {
            path_point: PathPoint {
                x: s,
                y: 0.0,
                s,
                theta: 0.0,
                kappa: 0.0,
            },
            v,
            a,
            relative_time: t,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ctrl_common::{LeadLagParams, PidParams},
        lon_ctrl::{CalibrationRow, CalibrationTable, LonCtrl, Params, VehicleParams},
        task::{ControlPipeline, CtrlInput},
    };
    use approx::assert_relative_eq;

    fn sim_params() -> SimParams {
        SimParams {
            throttle_gain: 0.05,
            throttle_deadzone: 2.0,
            brake_gain: 0.05,
            brake_deadzone: 2.0,
            rolling_resistance: 0.05,
            grade_rad: 0.0,
        }
    }

    fn spec() -> TrapezoidSpec {
        TrapezoidSpec {
            length_m: 50.0,
            cruise_speed_ms: 5.0,
            accel_ms2: 1.0,
            point_period_s: 0.1,
        }
    }

    #[test]
    fn test_trapezoid_profile() {
        let traj = spec().build(0.0, 1);
        let last = traj.points.last().unwrap();

        assert_relative_eq!(spec().duration_s(), 15.0, epsilon = 1e-12);
        assert_relative_eq!(last.path_point.s, 50.0, epsilon = 1e-12);
        assert_eq!(last.v, 0.0);
        assert_eq!(traj.decision.stop_reason(), Some(StopReasonCode::Destination));

        for w in traj.points.windows(2) {
            assert!(w[1].path_point.s >= w[0].path_point.s);
            assert!(w[1].relative_time > w[0].relative_time);
            assert!(w[1].v <= 5.0 + 1e-12);
        }
    }

    #[test]
    fn test_triangular_profile() {
        let tri = TrapezoidSpec {
            length_m: 4.0,
            ..spec()
        };

        // Peak speed of 2 m/s is reached after 2 s
        assert_relative_eq!(tri.duration_s(), 4.0, epsilon = 1e-12);
        let (s, v, _) = tri.profile(2.0);
        assert_relative_eq!(s, 2.0, epsilon = 1e-12);
        assert_relative_eq!(v, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sim_throttle_and_brake() {
        let mut sim = PointMassSim::new(sim_params());
        let mut cmd = ControlCommand {
            throttle: 22.0,
            gear_location: GearPosition::Drive,
            ..Default::default()
        };

        // (22 - 2) * 0.05 - 0.05 = 0.95 m/s^2 once moving
        for _ in 0..100 {
            sim.step(&cmd, 0.01);
        }
        assert_relative_eq!(sim.speed_ms(), 0.95, epsilon = 1e-9);
        assert!(sim.position_m() > 0.0);

        // Braking brings the vehicle to rest without reversing
        cmd.throttle = 0.0;
        cmd.brake = 50.0;
        for _ in 0..200 {
            sim.step(&cmd, 0.01);
        }
        assert_eq!(sim.speed_ms(), 0.0);
        assert_eq!(sim.chassis().speed_mps, 0.0);
    }

    #[test]
    fn test_sim_held_by_resistance() {
        let mut sim = PointMassSim::new(sim_params());
        let cmd = ControlCommand {
            throttle: 2.5,
            gear_location: GearPosition::Drive,
            ..Default::default()
        };

        sim.step(&cmd, 0.01);
        assert_eq!(sim.speed_ms(), 0.0);
        assert_eq!(sim.vehicle_state().linear_acceleration, 0.0);
    }

    #[test]
    fn test_sim_coast_without_command() {
        let mut sim = PointMassSim::new(sim_params());
        let cmd = ControlCommand {
            throttle: 22.0,
            gear_location: GearPosition::Reverse,
            ..Default::default()
        };

        // (22 - 2) * 0.05 - 0.05 = 0.95 m/s^2 backwards
        for _ in 0..100 {
            sim.step(&cmd, 0.01);
        }
        assert_relative_eq!(sim.speed_ms(), -0.95, epsilon = 1e-9);
        assert_eq!(sim.actuators(), (22.0, 0.0));

        // Only rolling resistance acts, and the gear isn't shifted to neutral
        sim.coast(0.01);
        assert_eq!(sim.actuators(), (0.0, 0.0));
        assert_eq!(sim.chassis().gear_location, GearPosition::Reverse);
        assert_relative_eq!(sim.vehicle_state().linear_acceleration, 0.05, epsilon = 1e-12);
        assert_relative_eq!(sim.speed_ms(), -0.9495, epsilon = 1e-9);
    }

    #[test]
    fn test_closed_loop_stops_at_destination() {
        let pid = |kp, ki| PidParams {
            kp,
            ki,
            kd: 0.0,
            integrator_enable: true,
            integrator_saturation_level: 0.3,
            output_saturation_level: 3.0,
        };
        let ll = LeadLagParams {
            alpha: 1.0,
            beta: 1.0,
            tau: 0.0,
            innerstate_saturation_level: 3000.0,
        };
        let params = Params {
            ts: 0.01,
            preview_window: 20.0,
            enable_speed_station_preview: false,
            station_error_limit: 2.0,
            speed_controller_input_limit: 2.0,
            switch_speed: 3.0,
            station_pid: pid(0.2, 0.0),
            low_speed_pid: pid(2.0, 0.3),
            high_speed_pid: pid(1.0, 0.3),
            reverse_station_pid: pid(0.5, 0.0),
            reverse_speed_pid: pid(0.8, 0.3),
            enable_leadlag_compensation: false,
            station_leadlag: ll,
            speed_leadlag: ll,
            reverse_station_leadlag: ll,
            reverse_speed_leadlag: ll,
            pitch_filter_cutoff_freq: 5.0,
            enable_slope_offset: 0.0,
            use_steering_check: false,
            steer_cmd_interval: 5.0,
            use_preview_reference_check: false,
            max_acceleration_when_stopped: 0.01,
            max_path_remain_when_stopped: 0.3,
            pedestrian_stop_time: 5.0,
            standstill_acceleration: -0.3,
            standstill_normal_acceleration: -0.5,
            use_acceleration_lookup_limit: false,
            use_preview_speed_for_table: false,
            query_forward_time_point_only: false,
            throttle_minimum_action: 0.0,
            brake_minimum_action: 0.0,
            enable_csv_debug: false,
            vehicle: VehicleParams {
                max_abs_speed_when_stopped: 0.2,
                throttle_deadzone: 2.0,
                brake_deadzone: 2.0,
                max_acceleration: 2.0,
            },
        };

        // Inverse of the simulated vehicle, ignoring rolling resistance
        let mut calibration = Vec::new();
        for &speed in [0.0, 10.0].iter() {
            for i in -4..=4 {
                let acceleration = i as f64;
                let command = if i == 0 {
                    0.0
                } else {
                    acceleration.signum() * (acceleration.abs() / 0.05 + 2.0)
                };
                calibration.push(CalibrationRow {
                    speed,
                    acceleration,
                    command,
                });
            }
        }

        let mut pipeline = ControlPipeline::new();
        pipeline.push(Box::new(LonCtrl::new(params, CalibrationTable { calibration })));
        pipeline.init().unwrap();

        let traj = spec().build(0.0, 1);
        let mut sim = PointMassSim::new(sim_params());
        let dt = 0.01;

        for i in 0..2000 {
            let t = i as f64 * dt;
            let vs = sim.vehicle_state();
            let chassis = sim.chassis();
            let cmd = pipeline
                .compute(&CtrlInput {
                    vehicle_state: &vs,
                    chassis: &chassis,
                    trajectory: &traj,
                    timestamp_s: t,
                })
                .unwrap();

            assert!(!(cmd.throttle > 0.0 && cmd.brake > 0.0));
            sim.step(&cmd, dt);
        }
        pipeline.stop();

        assert!((sim.position_m() - 50.0).abs() < 3.0);
        assert!(sim.speed_ms().abs() < 0.5);
    }
}
