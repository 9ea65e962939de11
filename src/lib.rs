//! Invoice Relay: upload invoices, have a model extract fields, get JSON back.
//!
//! The binary entry point is `src/main.rs`; the library exposes the pieces
//! for integration tests.

pub mod bootstrap;
pub mod core;
pub mod llm;
pub mod subsystems;

pub use crate::bootstrap::logger;
pub use crate::core::{config, error};
