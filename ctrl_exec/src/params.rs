//! # Control Executable Parameters
//!
//! Parameters for the closed loop run of the control executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::sim::{SimParams, TrapezoidSpec};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CtrlExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Time the closed loop run lasts for.
    ///
    /// Units: seconds
    pub duration_s: f64,

    /// If true each cycle is padded out to the cycle period, otherwise the
    /// run goes as fast as possible.
    pub real_time: bool,

    /// Simulated vehicle
    pub sim: SimParams,

    /// Reference trajectory followed during the run
    pub trajectory: TrapezoidSpec,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_shipped_params() {
        let params: CtrlExecParams =
            util::params::from_str(include_str!("../../params/ctrl_exec.toml")).unwrap();

        assert_eq!(params.cycle_period_s, 0.01);
        assert!(params.duration_s > params.trajectory.duration_s());
    }
}
