//! Shared helpers for the integration suites.

#![allow(dead_code)]

pub mod recorder;
pub mod scripted;

use std::sync::Arc;

use sendlane::{Context, LaneConfig, Transport};

/// Property read by [`scripted::ScriptedTransport`] as a per-message delay.
pub const LATENCY_MS: &str = "latency_ms";
/// Property that makes [`scripted::ScriptedTransport`] reject a message.
pub const FAIL: &str = "fail";
/// Property that makes [`scripted::ScriptedTransport`] report the destination
/// as unknown during execution.
pub const VANISH: &str = "vanish";

pub fn context_with(transport: Arc<dyn Transport>, workers: usize) -> Context {
    let config = LaneConfig::new()
        .with_transport_workers(workers)
        .with_thread_name("test-lane");
    Context::with_config(transport, config).unwrap()
}
