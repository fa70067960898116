//! # Longitudinal control module
//!
//! Longitudinal control keeps the vehicle on the speed profile of the
//! reference trajectory by commanding throttle and brake.
//!
//! Two PID controllers are cascaded. The station controller acts on the
//! error between the reference and current along track position and outputs
//! a speed offset, which is added to the speed error and fed to the speed
//! controller. The speed controller outputs a closed loop acceleration, to
//! which the reference acceleration and a slope compensation (derived from
//! the filtered vehicle pitch) are added. The resulting acceleration is
//! converted into a throttle or brake demand with a calibration table
//! mapping speed and acceleration to actuator command.
//!
//! Near the end of the trajectory, or while the planner is waiting behind a
//! pedestrian, the stop logic takes over and holds the vehicle at a
//! standstill acceleration.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod speed_log;
pub mod state;
pub mod stop;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// Internal
pub use params::{CalibrationRow, CalibrationTable, Params, VehicleParams};
pub use speed_log::{CsvSpeedLog, SpeedLogRecord, SpeedLogSink, ThreadedSpeedLog};
pub use state::{LonCtrl, LonCtrlSnapshot, LonCtrlState};
pub use stop::PedestrianStopTimer;

use crate::{
    ctrl_common::{FilterError, InterpolationError, TrajAnalyzerError},
    task::TaskError,
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur in longitudinal control.
#[derive(Debug, Error)]
pub enum LonCtrlError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Could not build the calibration table interpolator: {0}")]
    CalibrationError(InterpolationError),

    #[error("Could not build the pitch filter: {0}")]
    FilterError(FilterError),

    /// Attempted to compute a command before the controller was initialised.
    #[error("The calibration table interpolator has not been initialised")]
    NoInterpolator,

    #[error("Preview time set as {0} s, which is less than 0")]
    NegativePreviewTime(f64),

    #[error("Trajectory error: {0}")]
    TrajAnalyzer(TrajAnalyzerError),

    #[error("Calibration table lookup failed: {0}")]
    CalibrationLookup(InterpolationError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LonCtrlError {
    /// True if the error occured during initialisation rather than during a
    /// control cycle.
    pub fn is_init_error(&self) -> bool {
        matches!(
            self,
            LonCtrlError::InvalidParams(_)
                | LonCtrlError::CalibrationError(_)
                | LonCtrlError::FilterError(_)
        )
    }
}

impl From<InterpolationError> for LonCtrlError {
    fn from(e: InterpolationError) -> Self {
        LonCtrlError::CalibrationError(e)
    }
}

impl From<FilterError> for LonCtrlError {
    fn from(e: FilterError) -> Self {
        LonCtrlError::FilterError(e)
    }
}

impl From<TrajAnalyzerError> for LonCtrlError {
    fn from(e: TrajAnalyzerError) -> Self {
        LonCtrlError::TrajAnalyzer(e)
    }
}

impl From<LonCtrlError> for TaskError {
    fn from(e: LonCtrlError) -> Self {
        if e.is_init_error() {
            TaskError::Init(e.to_string())
        } else {
            TaskError::Compute(e.to_string())
        }
    }
}
