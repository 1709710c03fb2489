// src/observability.rs
//! Tracing initialization
//!
//! Installs a fmt subscriber honoring `RUST_LOG`. Safe to call more than
//! once; only the first call installs the subscriber.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Initialize structured logging for the process
pub fn init_tracing() -> anyhow::Result<()> {
    INIT.get_or_try_init(|| -> anyhow::Result<()> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
        Ok(())
    })?;
    Ok(())
}
