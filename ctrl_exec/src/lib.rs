//! # Control library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the control crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Building blocks shared between controllers - PID, lead-lag, filters, interpolation and
/// trajectory analysis
pub mod ctrl_common;

/// Longitudinal control module - tracks the speed profile of the trajectory with throttle and
/// brake
pub mod lon_ctrl;

/// Control executable parameters
pub mod params;

/// Simulation - point mass vehicle and reference trajectories for closed loop runs
pub mod sim;

/// Control tasks and the pipeline which runs them
pub mod task;
