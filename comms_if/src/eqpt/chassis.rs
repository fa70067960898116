//! # Chassis Equipment Data

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Decoded chassis feedback for a single cycle.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq)]
pub struct Chassis {
    /// The gear currently engaged by the transmission
    pub gear_location: GearPosition,

    /// Vehicle speed as reported by the chassis.
    ///
    /// Units: meters/second
    pub speed_mps: f64,

    /// Current steering position as a percentage of full lock.
    ///
    /// Units: percent, [-100, 100]
    pub steering_percentage: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Transmission gear positions.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GearPosition {
    Neutral,
    Drive,
    Reverse,
    Parking,
    Low,
    Invalid,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for GearPosition {
    fn default() -> Self {
        GearPosition::Neutral
    }
}
