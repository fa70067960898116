//! # Trajectory analyzer
//!
//! Provides the queries the controllers need against a reference trajectory:
//! projecting the vehicle onto the path, converting the vehicle state into
//! the path's Frenet frame, and looking up reference points by time.
//!
//! The analyzer holds its own copy of the trajectory's points so that it can
//! outlive the snapshot it was built from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::error;
use nalgebra::Vector2;
use serde::Serialize;
use thiserror::Error;

// Internal
use comms_if::planning::{PathPoint, Trajectory, TrajectoryPoint};
use util::maths::{lerp, slerp};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Segments shorter than this in arc length are not projected onto.
///
/// Units: meters
const MIN_SEGMENT_LENGTH_M: f64 = 1e-3;

/// Smallest value of `1 - kappa * d` used when computing the along track
/// speed, limits the speed as the vehicle approaches the centre of curvature.
const MIN_ONE_MINUS_KAPPA_D: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Analyzer over a single trajectory snapshot.
#[derive(Debug, Clone, Default)]
pub struct TrajAnalyzer {
    /// Sequence number of the trajectory the analyzer was built from
    seq_num: u32,

    /// Absolute time of the trajectory's zero relative time.
    ///
    /// Units: seconds
    header_time_s: f64,

    points: Vec<TrajectoryPoint>,
}

/// The vehicle's state expressed in the Frenet frame of the path.
#[derive(Debug, Copy, Clone, Default, Serialize, PartialEq)]
pub struct FrenetState {
    /// Along track position.
    ///
    /// Units: meters
    pub s: f64,

    /// Along track speed.
    ///
    /// Units: meters/second
    pub s_dot: f64,

    /// Lateral offset from the path, positive to the left.
    ///
    /// Units: meters
    pub d: f64,

    /// Lateral speed.
    ///
    /// Units: meters/second
    pub d_dot: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TrajAnalyzerError {
    #[error("The trajectory has no points")]
    EmptyTrajectory,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajAnalyzer {
    /// Build a new analyzer from the given trajectory.
    pub fn new(traj: &Trajectory) -> Self {
        Self {
            seq_num: traj.sequence_num,
            header_time_s: traj.header_time_s,
            points: traj.points.clone(),
        }
    }

    /// Sequence number of the trajectory this analyzer was built from.
    pub fn seq_num(&self) -> u32 {
        self.seq_num
    }

    /// Find the point on the path closest to the given position.
    ///
    /// The nearest sample is found first, then the position is projected
    /// onto the segments either side of it. If neither segment is long
    /// enough to project onto the sample itself is returned.
    pub fn query_matched_path_point(&self, x: f64, y: f64) -> Result<PathPoint, TrajAnalyzerError> {
        let index_min = self.nearest_index(x, y)?;
        let pos = Vector2::new(x, y);

        let mut best: Option<(f64, PathPoint)> = None;

        let mut segments = Vec::with_capacity(2);
        if index_min > 0 {
            segments.push((index_min - 1, index_min));
        }
        if index_min + 1 < self.points.len() {
            segments.push((index_min, index_min + 1));
        }

        for (i0, i1) in segments {
            let p0 = &self.points[i0].path_point;
            let p1 = &self.points[i1].path_point;

            if (p1.s - p0.s).abs() <= MIN_SEGMENT_LENGTH_M {
                continue;
            }

            let (dist_sqr, point) = project_onto_segment(&pos, p0, p1);

            if best.map_or(true, |(d, _)| dist_sqr < d) {
                best = Some((dist_sqr, point));
            }
        }

        Ok(match best {
            Some((_, point)) => point,
            None => self.points[index_min].path_point,
        })
    }

    /// Convert the vehicle's state into the Frenet frame of the path, based
    /// on the given matched point.
    pub fn to_trajectory_frame(
        &self,
        x: f64,
        y: f64,
        theta: f64,
        v: f64,
        matched: &PathPoint,
    ) -> FrenetState {
        let tangent = Vector2::new(matched.theta.cos(), matched.theta.sin());
        let offset = Vector2::new(x - matched.x, y - matched.y);

        // 2D cross product of the tangent with the offset gives the lateral
        // offset, the dot product the along track distance from the match.
        let d = tangent.x * offset.y - tangent.y * offset.x;
        let s = matched.s + tangent.dot(&offset);

        let delta_theta = theta - matched.theta;
        let d_dot = v * delta_theta.sin();

        let mut one_minus_kappa_d = 1.0 - matched.kappa * d;
        if one_minus_kappa_d <= 0.0 {
            error!(
                "The vehicle is at or beyond the centre of curvature of the path (kappa = {}, \
                d = {}), limiting 1 - kappa * d to {}",
                matched.kappa, d, MIN_ONE_MINUS_KAPPA_D
            );
            one_minus_kappa_d = MIN_ONE_MINUS_KAPPA_D;
        }

        let s_dot = v * delta_theta.cos() / one_minus_kappa_d;

        FrenetState { s, s_dot, d, d_dot }
    }

    /// Find the trajectory point nearest in time to the given absolute time.
    pub fn query_nearest_point_by_absolute_time(
        &self,
        t: f64,
        forward_only: bool,
    ) -> Result<TrajectoryPoint, TrajAnalyzerError> {
        self.query_nearest_point_by_relative_time(t - self.header_time_s, forward_only)
    }

    /// Find the trajectory point nearest in time to the given time relative
    /// to the trajectory header.
    ///
    /// Times before the start or after the end of the trajectory return the
    /// first or last point. If `forward_only` is set the first point at or
    /// after the query time is returned, otherwise the closer of the two
    /// points bracketing the query, preferring the earlier one on a tie.
    pub fn query_nearest_point_by_relative_time(
        &self,
        t: f64,
        forward_only: bool,
    ) -> Result<TrajectoryPoint, TrajAnalyzerError> {
        let last = self
            .points
            .last()
            .copied()
            .ok_or(TrajAnalyzerError::EmptyTrajectory)?;

        // Index of the first point not earlier than t
        let lower = self.points.partition_point(|p| p.relative_time < t);

        if lower == 0 {
            return Ok(self.points[0]);
        }
        if lower == self.points.len() {
            return Ok(last);
        }

        let after = self.points[lower];
        if forward_only {
            return Ok(after);
        }

        let before = self.points[lower - 1];
        if t - before.relative_time <= after.relative_time - t {
            Ok(before)
        } else {
            Ok(after)
        }
    }

    /// Find the trajectory point nearest to the given position.
    pub fn query_nearest_point_by_position(
        &self,
        x: f64,
        y: f64,
    ) -> Result<TrajectoryPoint, TrajAnalyzerError> {
        let index = self.nearest_index(x, y)?;
        Ok(self.points[index])
    }

    /// Index of the sample nearest to the given position, the earliest one
    /// on a tie.
    fn nearest_index(&self, x: f64, y: f64) -> Result<usize, TrajAnalyzerError> {
        if self.points.is_empty() {
            return Err(TrajAnalyzerError::EmptyTrajectory);
        }

        let mut index_min = 0;
        let mut d_min = std::f64::INFINITY;

        for (i, p) in self.points.iter().enumerate() {
            let dx = p.path_point.x - x;
            let dy = p.path_point.y - y;
            let d = dx * dx + dy * dy;
            if d < d_min {
                d_min = d;
                index_min = i;
            }
        }

        Ok(index_min)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Orthogonally project a position onto the segment between two path points,
/// returning the squared distance to the projection and the interpolated
/// path point.
fn project_onto_segment(pos: &Vector2<f64>, p0: &PathPoint, p1: &PathPoint) -> (f64, PathPoint) {
    let a = Vector2::new(p0.x, p0.y);
    let b = Vector2::new(p1.x, p1.y);
    let ab = b - a;

    let len_sqr = ab.norm_squared();
    let r = if len_sqr > 0.0 {
        ((pos - a).dot(&ab) / len_sqr).max(0.0).min(1.0)
    } else {
        0.0
    };

    let s = p0.s + r * (p1.s - p0.s);
    let point = PathPoint {
        x: lerp(p0.x, p0.s, p1.x, p1.s, s),
        y: lerp(p0.y, p0.s, p1.y, p1.s, s),
        s,
        theta: slerp(p0.theta, p0.s, p1.theta, p1.s, s),
        kappa: lerp(p0.kappa, p0.s, p1.kappa, p1.s, s),
    };

    let dist_sqr = (pos - Vector2::new(point.x, point.y)).norm_squared();

    (dist_sqr, point)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    /// Straight trajectory along +x with points every meter and 1 s.
    fn straight(num_points: usize) -> Trajectory {
        let points = (0..num_points)
            .map(|i| TrajectoryPoint {
                path_point: PathPoint {
                    x: i as f64,
                    y: 0.0,
                    s: i as f64,
                    theta: 0.0,
                    kappa: 0.0,
                },
                v: 1.0,
                a: 0.0,
                relative_time: i as f64,
            })
            .collect();

        Trajectory {
            header_time_s: 100.0,
            sequence_num: 7,
            points,
            ..Default::default()
        }
    }

    #[test]
    fn test_matched_point_projection() {
        let ta = TrajAnalyzer::new(&straight(5));
        assert_eq!(ta.seq_num(), 7);

        let m = ta.query_matched_path_point(2.3, 0.5).unwrap();
        assert_relative_eq!(m.x, 2.3, epsilon = 1e-12);
        assert_relative_eq!(m.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(m.s, 2.3, epsilon = 1e-12);

        // Before the start the first point is matched
        let m = ta.query_matched_path_point(-3.0, 1.0).unwrap();
        assert_relative_eq!(m.s, 0.0, epsilon = 1e-12);

        // After the end the last point is matched
        let m = ta.query_matched_path_point(10.0, -1.0).unwrap();
        assert_relative_eq!(m.s, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matched_point_degenerate_segments() {
        let mut traj = straight(3);
        for p in traj.points.iter_mut() {
            p.path_point.x = 0.0;
            p.path_point.s = 0.0;
        }
        traj.points[1].path_point.kappa = 0.5;

        let ta = TrajAnalyzer::new(&traj);
        let m = ta.query_matched_path_point(0.1, 0.0).unwrap();

        // All samples coincide, so the first (nearest, earliest) is returned
        assert_eq!(m, traj.points[0].path_point);
    }

    #[test]
    fn test_empty_trajectory() {
        let ta = TrajAnalyzer::new(&Trajectory::default());

        assert!(matches!(
            ta.query_matched_path_point(0.0, 0.0),
            Err(TrajAnalyzerError::EmptyTrajectory)
        ));
        assert!(matches!(
            ta.query_nearest_point_by_relative_time(0.0, false),
            Err(TrajAnalyzerError::EmptyTrajectory)
        ));
        assert!(matches!(
            ta.query_nearest_point_by_position(0.0, 0.0),
            Err(TrajAnalyzerError::EmptyTrajectory)
        ));
    }

    #[test]
    fn test_frenet_frame() {
        let ta = TrajAnalyzer::new(&straight(5));
        let matched = ta.query_matched_path_point(2.0, 1.0).unwrap();

        let f = ta.to_trajectory_frame(2.0, 1.0, FRAC_PI_2 / 3.0, 2.0, &matched);

        assert_relative_eq!(f.s, 2.0, epsilon = 1e-12);
        assert_relative_eq!(f.d, 1.0, epsilon = 1e-12);
        assert_relative_eq!(f.d_dot, 1.0, epsilon = 1e-12);
        assert_relative_eq!(f.s_dot, 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_frenet_frame_curvature_floor() {
        let ta = TrajAnalyzer::new(&straight(5));
        let matched = PathPoint {
            x: 0.0,
            y: 0.0,
            s: 0.0,
            theta: 0.0,
            kappa: 1.0,
        };

        // d = 2, so 1 - kappa * d = -1 which is floored to 0.01
        let f = ta.to_trajectory_frame(0.0, 2.0, 0.0, 1.0, &matched);
        assert_relative_eq!(f.s_dot, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_query_by_time() {
        let ta = TrajAnalyzer::new(&straight(5));

        // Absolute time is offset by the header time
        let p = ta.query_nearest_point_by_absolute_time(102.2, false).unwrap();
        assert_eq!(p.relative_time, 2.0);

        let p = ta.query_nearest_point_by_relative_time(2.7, false).unwrap();
        assert_eq!(p.relative_time, 3.0);

        // Ties go to the earlier point
        let p = ta.query_nearest_point_by_relative_time(2.5, false).unwrap();
        assert_eq!(p.relative_time, 2.0);

        // Forward only always takes the later point
        let p = ta.query_nearest_point_by_relative_time(2.2, true).unwrap();
        assert_eq!(p.relative_time, 3.0);

        // Exact hit
        let p = ta.query_nearest_point_by_relative_time(1.0, true).unwrap();
        assert_eq!(p.relative_time, 1.0);

        // Outside the trajectory
        let p = ta.query_nearest_point_by_relative_time(-5.0, false).unwrap();
        assert_eq!(p.relative_time, 0.0);
        let p = ta.query_nearest_point_by_relative_time(50.0, true).unwrap();
        assert_eq!(p.relative_time, 4.0);
    }

    #[test]
    fn test_query_by_position() {
        let ta = TrajAnalyzer::new(&straight(5));

        let p = ta.query_nearest_point_by_position(3.4, 2.0).unwrap();
        assert_eq!(p.path_point.x, 3.0);

        // Equidistant, earliest wins
        let p = ta.query_nearest_point_by_position(1.5, 0.0).unwrap();
        assert_eq!(p.path_point.x, 1.0);
    }
}
