//! # Digital filter
//!
//! Generic IIR filter in direct form, along with the coefficients of a second
//! order Butterworth low-pass filter.
//!
//! The filter implements
//!
//! ```text
//! den[0] * y[k] = sum(num[i] * x[k - i]) - sum(den[j] * y[k - j]), j >= 1
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::{PI, SQRT_2};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Leading denominators with a magnitude below this are treated as zero.
const DEN_EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A stateful IIR filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalFilter {
    /// Denominator coefficients, `den[0]` applies to the newest output
    den: Vec<f64>,

    /// Numerator coefficients, `num[0]` applies to the newest input
    num: Vec<f64>,

    /// Input history, newest first
    x_values: VecDeque<f64>,

    /// Output history, newest first
    y_values: VecDeque<f64>,

    /// Changes in output smaller than this are ignored
    dead_zone: f64,

    /// Last output passed through the dead zone
    last: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("The filter's numerator has no coefficients")]
    EmptyNumerator,

    #[error("The filter's denominator has no coefficients")]
    EmptyDenominator,

    #[error("The filter's leading denominator coefficient is zero")]
    ZeroLeadingDenominator,

    #[error("Cannot compute filter coefficients for a sample period of {0} s")]
    InvalidSamplePeriod(f64),

    #[error("Cannot compute filter coefficients for a cutoff frequency of {0} Hz")]
    InvalidCutoffFrequency(f64),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the `(den, num)` coefficients of a second order Butterworth
/// low-pass filter with the given sample period (s) and cutoff frequency (Hz).
pub fn lpf_coefficients(ts: f64, cutoff_freq: f64) -> Result<(Vec<f64>, Vec<f64>), FilterError> {
    if !(ts > 0.0) || !ts.is_finite() {
        return Err(FilterError::InvalidSamplePeriod(ts));
    }
    if !(cutoff_freq > 0.0) || !cutoff_freq.is_finite() {
        return Err(FilterError::InvalidCutoffFrequency(cutoff_freq));
    }

    // Pre-warped analog cutoff, bilinear transform
    let wa = 2.0 * PI * cutoff_freq;
    let alpha = wa * ts / 2.0;
    let alpha_sqr = alpha * alpha;
    let tmp_term = SQRT_2 * alpha + alpha_sqr;
    let gain = alpha_sqr / (1.0 + tmp_term);

    let den = vec![
        1.0,
        2.0 * (alpha_sqr - 1.0) / (1.0 + tmp_term),
        (1.0 - SQRT_2 * alpha + alpha_sqr) / (1.0 + tmp_term),
    ];
    let num = vec![gain, 2.0 * gain, gain];

    Ok((den, num))
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DigitalFilter {
    /// Create a new filter from its denominator and numerator coefficients.
    pub fn new(den: Vec<f64>, num: Vec<f64>) -> Result<Self, FilterError> {
        if den.is_empty() {
            return Err(FilterError::EmptyDenominator);
        }
        if num.is_empty() {
            return Err(FilterError::EmptyNumerator);
        }
        if !(den[0].abs() > DEN_EPSILON) {
            return Err(FilterError::ZeroLeadingDenominator);
        }

        let x_values = VecDeque::from(vec![0.0; num.len()]);
        let y_values = VecDeque::from(vec![0.0; den.len()]);

        Ok(Self {
            den,
            num,
            x_values,
            y_values,
            dead_zone: 0.0,
            last: 0.0,
        })
    }

    /// Create a second order Butterworth low-pass filter.
    pub fn low_pass(ts: f64, cutoff_freq: f64) -> Result<Self, FilterError> {
        let (den, num) = lpf_coefficients(ts, cutoff_freq)?;
        Self::new(den, num)
    }

    /// Set the dead zone of the filter's output.
    pub fn set_dead_zone(&mut self, dead_zone: f64) {
        self.dead_zone = dead_zone.abs();
    }

    /// Process a new input sample and return the filtered value.
    pub fn filter(&mut self, x: f64) -> f64 {
        self.x_values.pop_back();
        self.x_values.push_front(x);
        let x_side: f64 = self
            .x_values
            .iter()
            .zip(self.num.iter())
            .map(|(x, n)| x * n)
            .sum();

        self.y_values.pop_back();
        let y_side: f64 = self
            .y_values
            .iter()
            .zip(self.den.iter().skip(1))
            .map(|(y, d)| y * d)
            .sum();

        let y = (x_side - y_side) / self.den[0];
        self.y_values.push_front(y);

        self.apply_dead_zone(y)
    }

    /// Clear the input and output histories.
    pub fn reset_values(&mut self) {
        self.x_values.iter_mut().for_each(|x| *x = 0.0);
        self.y_values.iter_mut().for_each(|y| *y = 0.0);
        self.last = 0.0;
    }

    pub fn den(&self) -> &[f64] {
        &self.den
    }

    pub fn num(&self) -> &[f64] {
        &self.num
    }

    fn apply_dead_zone(&mut self, y: f64) -> f64 {
        if (y - self.last).abs() < self.dead_zone {
            self.last
        } else {
            self.last = y;
            y
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
