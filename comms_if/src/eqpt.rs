//! # Equipment Interface
//!
//! This module defines the snapshots produced by the vehicle's equipment which are consumed by
//! the controllers. All snapshots are produced externally and handed to the controllers as
//! read-only data for the duration of a single cycle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod chassis;
pub mod loc;
