//! Comms subsystem: the HTTP ingress.

pub mod axum_channel;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::AppError;
use crate::subsystems::extraction::InvoiceProcessor;

pub use axum_channel::{AxumChannel, AxumState, build_router};

/// Serve the HTTP API for `config` until `shutdown` fires.
pub async fn run(config: &Config, processor: Arc<InvoiceProcessor>, shutdown: CancellationToken) -> Result<(), AppError> {
    AxumChannel::new(config.service_name.clone(), config.http.clone(), processor)
        .run(shutdown)
        .await
}
