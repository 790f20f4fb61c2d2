//! # Communications interface crate.
//!
//! Provides the common interface structures passed between the navigation software and the
//! vehicle it drives.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and telemetry definitions for equipment (like the vehicle platform)
pub mod eqpt;
