//! # Localisation Equipment Data

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Estimated state of the vehicle at the start of a control cycle.
///
/// Positions are expressed in the same planar frame as the reference trajectory.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
pub struct VehicleState {
    /// Units: meters
    pub x: f64,

    /// Units: meters
    pub y: f64,

    /// Heading, angle to the positive x axis.
    ///
    /// Units: radians
    pub heading: f64,

    /// Units: meters/second
    pub linear_velocity: f64,

    /// Units: meters/second^2
    pub linear_acceleration: f64,

    /// Pitch of the vehicle body, positive nose up.
    ///
    /// Units: radians
    pub pitch: f64,
}
