//! # 2D interpolation
//!
//! Bilinear interpolation over a scattered set of `(speed, acceleration) ->
//! command` samples, used to look up the actuator command for a desired
//! acceleration at the current speed.
//!
//! Samples are grouped by speed, and each speed row is interpolated along
//! acceleration before the rows are interpolated along speed. Queries outside
//! the sampled range are clamped to the boundary.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use ordered_float::NotNan;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Queries within this distance of a boundary key use the boundary value.
const BOUNDARY_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Map of acceleration to command for a single speed
type AccRow = BTreeMap<NotNan<f64>, f64>;

/// Interpolator over `(speed, acceleration) -> command` samples.
#[derive(Debug, Clone)]
pub struct Interpolation2D {
    table: BTreeMap<NotNan<f64>, AccRow>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("The interpolation table is empty")]
    EmptyTable,

    #[error("Sample {0} contains a non-finite value: ({1}, {2}, {3})")]
    NonFiniteSample(usize, f64, f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Interpolation2D {
    /// Build the interpolator from `(speed, acceleration, command)` samples.
    ///
    /// If two samples share the same speed and acceleration the later one is
    /// kept.
    pub fn new<I>(samples: I) -> Result<Self, InterpolationError>
    where
        I: IntoIterator<Item = (f64, f64, f64)>,
    {
        let mut table: BTreeMap<NotNan<f64>, AccRow> = BTreeMap::new();

        for (i, (speed, acc, cmd)) in samples.into_iter().enumerate() {
            if !(speed.is_finite() && acc.is_finite() && cmd.is_finite()) {
                return Err(InterpolationError::NonFiniteSample(i, speed, acc, cmd));
            }

            let speed_key = NotNan::new(speed)
                .map_err(|_| InterpolationError::NonFiniteSample(i, speed, acc, cmd))?;
            let acc_key = NotNan::new(acc)
                .map_err(|_| InterpolationError::NonFiniteSample(i, speed, acc, cmd))?;

            table.entry(speed_key).or_default().insert(acc_key, cmd);
        }

        if table.is_empty() {
            return Err(InterpolationError::EmptyTable);
        }

        Ok(Self { table })
    }

    /// Number of distinct speeds in the table.
    pub fn num_speeds(&self) -> usize {
        self.table.len()
    }

    /// Interpolate the command for the given speed and acceleration.
    ///
    /// Non-finite queries are treated as being below the lower boundary. An
    /// empty table or speed row is reported as `EmptyTable` rather than
    /// producing a command.
    pub fn interpolate(&self, speed: f64, acc: f64) -> Result<f64, InterpolationError> {
        match bracket(&self.table, speed).ok_or(InterpolationError::EmptyTable)? {
            Bracket::Exact(row) => interpolate_row(row, acc),
            Bracket::Between {
                before,
                dist_before,
                after,
                dist_after,
            } => {
                let cmd_before = interpolate_row(before, acc)?;
                let cmd_after = interpolate_row(after, acc)?;
                Ok(interpolate_value(
                    cmd_before,
                    dist_before,
                    cmd_after,
                    dist_after,
                ))
            }
        }
    }
}

/// Result of locating a query between the keys of an ordered map.
enum Bracket<'a, V> {
    Exact(&'a V),
    Between {
        before: &'a V,
        dist_before: f64,
        after: &'a V,
        dist_after: f64,
    },
}

/// Find the entries of `map` which bracket `query`, clamping to the
/// boundaries.
///
/// Returns `None` only if `map` is empty.
fn bracket<V>(map: &BTreeMap<NotNan<f64>, V>, query: f64) -> Option<Bracket<'_, V>> {
    let (first_key, first) = map.iter().next()?;
    let (last_key, last) = map.iter().next_back()?;

    let query = match NotNan::new(query) {
        Ok(q) => q,
        Err(_) => return Some(Bracket::Exact(first)),
    };

    if query.into_inner() <= first_key.into_inner() + BOUNDARY_EPSILON {
        return Some(Bracket::Exact(first));
    }
    if query.into_inner() >= last_key.into_inner() - BOUNDARY_EPSILON {
        return Some(Bracket::Exact(last));
    }

    // Strictly inside the range so both neighbours exist
    let after = map.range(query..).next();
    let before = map.range((Unbounded, Excluded(query))).next_back();

    Some(match (before, after) {
        (Some((kb, vb)), Some((ka, va))) => Bracket::Between {
            before: vb,
            dist_before: query.into_inner() - kb.into_inner(),
            after: va,
            dist_after: ka.into_inner() - query.into_inner(),
        },
        (_, Some((_, va))) => Bracket::Exact(va),
        (Some((_, vb)), None) => Bracket::Exact(vb),
        (None, None) => Bracket::Exact(first),
    })
}

/// Interpolate the command along acceleration for one speed row.
fn interpolate_row(row: &AccRow, acc: f64) -> Result<f64, InterpolationError> {
    match bracket(row, acc).ok_or(InterpolationError::EmptyTable)? {
        Bracket::Exact(cmd) => Ok(*cmd),
        Bracket::Between {
            before,
            dist_before,
            after,
            dist_after,
        } => Ok(interpolate_value(*before, dist_before, *after, dist_after)),
    }
}

/// Weight the two values by their distance from the query.
fn interpolate_value(before: f64, dist_before: f64, after: f64, dist_after: f64) -> f64 {
    if dist_before == 0.0 {
        return before;
    }
    if dist_after == 0.0 {
        return after;
    }

    let ratio = dist_before / (dist_before + dist_after);
    before + (after - before) * ratio
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
