//! Shared domain types for the faultline alert-management core.
//!
//! Everything that crosses a crate seam lives here: the alert event record
//! and its life-cycle status, silence rules, probing rules, notification
//! targets, duty rosters, snowflake ids, Go-style durations, and the signed
//! quick-action token codec.

pub mod duration;
pub mod id;
pub mod template;
pub mod token;
pub mod types;
