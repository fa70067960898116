//! # Common control components
//!
//! Building blocks shared by the controllers: the control laws themselves
//! (PID and lead-lag), signal conditioning (digital filter), calibration
//! lookup (2D interpolation) and the trajectory queries which produce the
//! controllers' errors.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Generic IIR filter and low-pass coefficients
pub mod digital_filter;

/// Bilinear interpolation of calibration tables
pub mod interpolation_2d;

/// Lead-lag compensator
pub mod lead_lag;

/// PID controller with anti-windup
pub mod pid;

/// Projection of the vehicle onto the reference trajectory
pub mod traj_analyzer;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use digital_filter::{DigitalFilter, FilterError};
pub use interpolation_2d::{Interpolation2D, InterpolationError};
pub use lead_lag::{LeadLagController, LeadLagParams};
pub use pid::{PidController, PidParams};
pub use traj_analyzer::{FrenetState, TrajAnalyzer, TrajAnalyzerError};
