//! # Communications interface crate.
//!
//! Provides the data structures exchanged between the control software and its
//! external collaborators: the localisation and chassis producers, the planner,
//! and whatever consumes the control command.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Snapshots produced by vehicle equipment (chassis, localisation)
pub mod eqpt;

/// Reference trajectory published by the planner
pub mod planning;

/// Control command and control debug telemetry
pub mod ctrl;
