//! # PID controller
//!
//! Discrete PID controller with integrator anti-windup and output
//! saturation.
//!
//! The integral gain is applied before accumulating, i.e. the integrator
//! holds `sum(k_i * error * dt)`. This means that swapping to a new set of
//! gains at steady state does not step the integral contribution, which
//! allows the gains to be changed every cycle without disturbing the output.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use comms_if::ctrl::SaturationStatus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of a PID controller.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct PidParams {
    /// Proportional gain
    pub kp: f64,

    /// Integral gain
    pub ki: f64,

    /// Derivative gain
    pub kd: f64,

    /// If false the integral term is held at zero
    pub integrator_enable: bool,

    /// Magnitude of the limit on the integral term
    pub integrator_saturation_level: f64,

    /// Magnitude of the limit on the controller output
    pub output_saturation_level: f64,
}

/// A PID controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidController {
    /// Currently active gains
    params: PidParams,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation, with the integral gain already applied
    integral: f64,

    /// True until the first call to `control` after construction or reset,
    /// used to suppress the derivative kick on the first sample.
    first_hit: bool,

    integrator_saturation_status: SaturationStatus,

    output_saturation_status: SaturationStatus,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(params: &PidParams) -> Self {
        Self {
            params: *params,
            prev_error: 0.0,
            integral: 0.0,
            first_hit: true,
            integrator_saturation_status: SaturationStatus::NotSaturated,
            output_saturation_status: SaturationStatus::NotSaturated,
        }
    }

    /// Replace the active gains without touching the controller's state.
    pub fn set_pid(&mut self, params: &PidParams) {
        self.params = *params;
    }

    /// Get the currently active gains.
    pub fn params(&self) -> &PidParams {
        &self.params
    }

    /// Get the value of the controller for the given error and sample period.
    ///
    /// # Panics
    /// - If `dt` is not strictly positive.
    pub fn control(&mut self, error: f64, dt: f64) -> f64 {
        assert!(dt > 0.0, "PID sample period must be positive, got {}", dt);

        // Derivative, skipped on the first sample as there's no valid
        // previous error to difference against.
        let diff = if self.first_hit {
            self.first_hit = false;
            0.0
        } else {
            (error - self.prev_error) / dt
        };

        // Integral with anti-windup. Clamping the accumulator stops it from
        // winding further in the saturated direction while still letting it
        // unwind as soon as the error changes sign.
        if !self.params.integrator_enable {
            self.integral = 0.0;
            self.integrator_saturation_status = SaturationStatus::NotSaturated;
        } else {
            let level = self.params.integrator_saturation_level.abs();
            let (integral, status) = SaturationStatus::clamp(
                self.integral + error * dt * self.params.ki,
                -level,
                level,
            );
            self.integral = integral;
            self.integrator_saturation_status = status;
        }

        let raw = error * self.params.kp + self.integral + diff * self.params.kd;

        let level = self.params.output_saturation_level.abs();
        let (output, status) = SaturationStatus::clamp(raw, -level, level);
        self.output_saturation_status = status;

        self.prev_error = error;

        output
    }

    /// Reset the controller to its initial state.
    pub fn reset(&mut self) {
        self.prev_error = 0.0;
        self.integral = 0.0;
        self.first_hit = true;
        self.integrator_saturation_status = SaturationStatus::NotSaturated;
        self.output_saturation_status = SaturationStatus::NotSaturated;
    }

    /// Reset only the integral term.
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
        self.integrator_saturation_status = SaturationStatus::NotSaturated;
    }

    /// Current value of the integral term.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Saturation status of the integrator after the last call to `control`.
    pub fn integrator_saturation_status(&self) -> SaturationStatus {
        self.integrator_saturation_status
    }

    /// Saturation status of the output after the last call to `control`.
    pub fn output_saturation_status(&self) -> SaturationStatus {
        self.output_saturation_status
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn params(kp: f64, ki: f64, kd: f64) -> PidParams {
        PidParams {
            kp,
            ki,
            kd,
            integrator_enable: true,
            integrator_saturation_level: 1.0,
            output_saturation_level: 100.0,
        }
    }

    #[test]
    fn test_proportional() {
        let mut pid = PidController::new(&params(2.0, 0.0, 0.0));

        assert_eq!(pid.control(1.5, 0.01), 3.0);
        assert_eq!(pid.control(-0.5, 0.01), -1.0);
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = PidController::new(&params(0.0, 2.0, 0.5));

        // First sample: no derivative, integral = 2 * 1 * 0.1
        assert_relative_eq!(pid.control(1.0, 0.1), 0.2, epsilon = 1e-12);

        // Second sample: integral = 0.2 + 2 * 3 * 0.1 = 0.8, deriv = (3 - 1) / 0.1 = 20
        assert_relative_eq!(pid.control(3.0, 0.1), 0.8 + 0.5 * 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_anti_windup() {
        let mut pid = PidController::new(&params(0.0, 1.0, 0.0));

        for _ in 0..100 {
            pid.control(10.0, 0.1);
        }

        assert_eq!(pid.integral(), 1.0);
        assert_eq!(
            pid.integrator_saturation_status(),
            SaturationStatus::PositiveSaturated
        );

        // Unwinds straight away once the error reverses
        pid.control(-1.0, 0.1);
        assert_relative_eq!(pid.integral(), 0.9, epsilon = 1e-12);
        assert_eq!(
            pid.integrator_saturation_status(),
            SaturationStatus::NotSaturated
        );

        for _ in 0..100 {
            pid.control(-10.0, 0.1);
        }
        assert_eq!(pid.integral(), -1.0);
        assert_eq!(
            pid.integrator_saturation_status(),
            SaturationStatus::NegativeSaturated
        );
    }

    #[test]
    fn test_integrator_disabled() {
        let mut p = params(1.0, 5.0, 0.0);
        p.integrator_enable = false;
        let mut pid = PidController::new(&p);

        pid.control(1.0, 0.1);
        pid.control(1.0, 0.1);

        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.control(1.0, 0.1), 1.0);
    }

    #[test]
    fn test_output_saturation() {
        let mut p = params(10.0, 0.0, 0.0);
        p.output_saturation_level = 2.0;
        let mut pid = PidController::new(&p);

        assert_eq!(pid.control(1.0, 0.1), 2.0);
        assert_eq!(
            pid.output_saturation_status(),
            SaturationStatus::PositiveSaturated
        );
        assert_eq!(pid.control(-1.0, 0.1), -2.0);
        assert_eq!(
            pid.output_saturation_status(),
            SaturationStatus::NegativeSaturated
        );
    }

    #[test]
    fn test_reset_then_zero_error_gives_zero() {
        let mut pid = PidController::new(&params(1.0, 1.0, 1.0));

        pid.control(0.7, 0.1);
        pid.control(0.9, 0.1);
        pid.reset();

        assert_eq!(pid.control(0.0, 0.1), 0.0);
    }

    #[test]
    fn test_reset_integral_keeps_derivative_history() {
        let mut pid = PidController::new(&params(0.0, 1.0, 1.0));

        pid.control(1.0, 0.1);
        pid.reset_integral();
        assert_eq!(pid.integral(), 0.0);

        // Derivative still uses the previous error of 1.0
        assert_relative_eq!(pid.control(1.0, 0.1), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_set_pid_keeps_integral() {
        let mut pid = PidController::new(&params(0.0, 1.0, 0.0));

        pid.control(2.0, 0.1);
        let integral = pid.integral();

        pid.set_pid(&params(3.0, 0.0, 0.0));
        assert_eq!(pid.integral(), integral);

        // New proportional gain takes effect, integral term carries over
        assert_relative_eq!(pid.control(1.0, 0.1), 3.0 + integral, epsilon = 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_non_positive_dt_panics() {
        let mut pid = PidController::new(&params(1.0, 0.0, 0.0));
        pid.control(1.0, 0.0);
    }
}
