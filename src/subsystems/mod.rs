//! Subsystem modules.

pub mod comms;
pub mod extraction;
