//! # Lead-lag compensator
//!
//! First order compensator with the continuous transfer function
//!
//! ```text
//!          beta * (tau * s + 1)
//! C(s) = ------------------------
//!           alpha * tau * s + 1
//! ```
//!
//! discretised with the bilinear (Tustin) transform. The compensator is lead
//! for `alpha < 1` and lag for `alpha > 1`. It is run in Direct Form II, the
//! inner state of which is saturated to bound the compensator's memory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::{Deserialize, Serialize};

// Internal
use comms_if::ctrl::SaturationStatus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of a lead-lag compensator.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadLagParams {
    /// Ratio between the pole and zero time constants
    pub alpha: f64,

    /// DC gain
    pub beta: f64,

    /// Zero time constant.
    ///
    /// Units: seconds
    pub tau: f64,

    /// Magnitude of the limit on the inner state
    pub innerstate_saturation_level: f64,
}

/// Discretised lead-lag compensator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadLagController {
    params: LeadLagParams,

    /// Sample period used for the discretisation.
    ///
    /// Units: seconds
    ts: f64,

    /// Discrete numerator coefficients, `kn1 * z + kn0`
    kn1: f64,
    kn0: f64,

    /// Discrete denominator coefficients, `kd1 * z + kd0`
    kd1: f64,
    kd0: f64,

    /// False if the discretisation is invalid, in which case the compensator
    /// passes its input straight through.
    c2d_valid: bool,

    innerstate: f64,
    prev_innerstate: f64,

    innerstate_saturation_status: SaturationStatus,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LeadLagController {
    /// Create a new compensator discretised at the sample period `ts`.
    pub fn new(params: &LeadLagParams, ts: f64) -> Self {
        let mut ctrl = Self {
            params: *params,
            ts,
            kn1: 0.0,
            kn0: 0.0,
            kd1: 0.0,
            kd0: 0.0,
            c2d_valid: false,
            innerstate: 0.0,
            prev_innerstate: 0.0,
            innerstate_saturation_status: SaturationStatus::NotSaturated,
        };
        ctrl.transform_c2d();
        ctrl
    }

    /// Replace the compensator's parameters without resetting its state.
    ///
    /// The new parameters are discretised at the original sample period.
    pub fn set_lead_lag(&mut self, params: &LeadLagParams) {
        self.params = *params;
        self.transform_c2d();
    }

    /// Get the currently active parameters.
    pub fn params(&self) -> &LeadLagParams {
        &self.params
    }

    /// Compute the compensator output for the given input.
    ///
    /// # Panics
    /// - If `dt` is not strictly positive.
    pub fn control(&mut self, input: f64, dt: f64) -> f64 {
        assert!(dt > 0.0, "Lead-lag sample period must be positive, got {}", dt);

        if !self.c2d_valid {
            return input;
        }

        let level = self.params.innerstate_saturation_level.abs();
        let (innerstate, status) = SaturationStatus::clamp(
            (input - self.prev_innerstate * self.kd0) / self.kd1,
            -level,
            level,
        );
        self.innerstate = innerstate;
        self.innerstate_saturation_status = status;

        let output = self.innerstate * self.kn1 + self.prev_innerstate * self.kn0;

        self.prev_innerstate = self.innerstate;

        output
    }

    /// Reset the compensator's internal state.
    pub fn reset(&mut self) {
        self.innerstate = 0.0;
        self.prev_innerstate = 0.0;
        self.innerstate_saturation_status = SaturationStatus::NotSaturated;
    }

    /// Saturation status of the inner state after the last call to `control`.
    pub fn innerstate_saturation_status(&self) -> SaturationStatus {
        self.innerstate_saturation_status
    }

    /// True if the discretisation succeeded.
    pub fn is_valid(&self) -> bool {
        self.c2d_valid
    }

    /// Discretise the continuous compensator using the bilinear transform.
    fn transform_c2d(&mut self) {
        if self.ts <= 0.0 {
            warn!(
                "Lead-lag sample period {} is not positive, compensator will act as unity gain",
                self.ts
            );
            self.c2d_valid = false;
            return;
        }

        let a1 = self.params.alpha * self.params.tau;
        let a0 = 1.0;
        let b1 = self.params.beta * self.params.tau;
        let b0 = self.params.beta;

        self.kn1 = 2.0 * b1 + self.ts * b0;
        self.kn0 = self.ts * b0 - 2.0 * b1;
        self.kd1 = 2.0 * a1 + self.ts * a0;
        self.kd0 = self.ts * a0 - 2.0 * a1;

        if self.kd1 <= 0.0 {
            warn!(
                "Lead-lag discretisation gave a non-positive leading denominator ({}), \
                compensator will act as unity gain",
                self.kd1
            );
            self.c2d_valid = false;
        } else {
            self.c2d_valid = true;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn params(alpha: f64, beta: f64, tau: f64) -> LeadLagParams {
        LeadLagParams {
            alpha,
            beta,
            tau,
            innerstate_saturation_level: 1000.0,
        }
    }

    #[test]
    fn test_pure_gain() {
        // With tau = 0 the compensator reduces to the gain beta
        let mut ll = LeadLagController::new(&params(1.0, 2.0, 0.0), 0.01);

        for _ in 0..10 {
            assert_relative_eq!(ll.control(1.5, 0.01), 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_dc_gain() {
        // A step input settles to beta * input
        let mut ll = LeadLagController::new(&params(0.5, 1.5, 0.2), 0.01);

        let mut out = 0.0;
        for _ in 0..5000 {
            out = ll.control(1.0, 0.01);
        }

        assert_relative_eq!(out, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_lead_overshoots_step() {
        // A lead compensator's initial response to a step exceeds its DC gain
        let mut ll = LeadLagController::new(&params(0.1, 1.0, 0.5), 0.01);

        let first = ll.control(1.0, 0.01);
        assert!(first > 1.0);
    }

    #[test]
    fn test_innerstate_saturation() {
        let mut p = params(1.0, 1.0, 0.0);
        p.innerstate_saturation_level = 0.01;
        let mut ll = LeadLagController::new(&p, 0.01);

        // Inner state would be input / kd1 = 10 / 0.01 = 1000
        ll.control(10.0, 0.01);
        assert_eq!(
            ll.innerstate_saturation_status(),
            SaturationStatus::PositiveSaturated
        );
    }

    #[test]
    fn test_invalid_discretisation_is_unity() {
        // alpha * tau so negative that kd1 <= 0
        let ll_params = params(-10.0, 2.0, 1.0);
        let mut ll = LeadLagController::new(&ll_params, 0.01);

        assert!(!ll.is_valid());
        assert_eq!(ll.control(0.7, 0.01), 0.7);
    }

    #[test]
    fn test_set_lead_lag_keeps_state() {
        let mut ll = LeadLagController::new(&params(0.5, 1.0, 0.2), 0.01);

        ll.control(1.0, 0.01);
        let prev = ll.prev_innerstate;

        ll.set_lead_lag(&params(1.0, 2.0, 0.0));
        assert_eq!(ll.prev_innerstate, prev);

        ll.reset();
        assert_eq!(ll.prev_innerstate, 0.0);
        assert_eq!(ll.control(0.0, 0.01), 0.0);
    }
}
