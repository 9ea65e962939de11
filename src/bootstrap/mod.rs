//! Startup helpers run once before the server comes up.

pub mod logger;
