//! Common test utilities for integration tests
//!
//! Shared probes with fixed, index-driven behavior so runs are reproducible
//! regardless of concurrency.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use probatio::{CategorizedFailure, FnProbe, Probe, ProbeOutput, SampleContext};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Succeeds on every invocation.
pub fn always_succeeds() -> Arc<dyn Probe> {
    Arc::new(FnProbe::new(|_ctx: SampleContext| async {
        Ok(ProbeOutput::new(true))
    }))
}

/// Errors on every `n`th invocation (indices n-1, 2n-1, ...).
pub fn fails_every(n: usize) -> Arc<dyn Probe> {
    Arc::new(FnProbe::new(move |ctx: SampleContext| async move {
        if (ctx.index + 1) % n == 0 {
            Err(anyhow!("invocation {} failed", ctx.index))
        } else {
            Ok(ProbeOutput::new(true))
        }
    }))
}

/// Deterministic mix of successes and categorized failures, with a latency
/// that varies by index so concurrent completions arrive out of order.
pub fn scrambled() -> Arc<dyn Probe> {
    Arc::new(FnProbe::new(|ctx: SampleContext| async move {
        let jitter = (ctx.index * 7919) % 13;
        tokio::time::sleep(Duration::from_millis(jitter as u64)).await;
        match ctx.index % 6 {
            1 => Err(CategorizedFailure::new("timeout", format!("sample {}", ctx.index)).into()),
            4 => Err(anyhow!("connection reset")),
            _ => Ok(ProbeOutput::new(ctx.index).with_cost(3)),
        }
    }))
}

/// Sleeps for `delay` on every invocation.
pub fn sleeping(delay: Duration) -> Arc<dyn Probe> {
    Arc::new(FnProbe::new(move |_ctx: SampleContext| async move {
        tokio::time::sleep(delay).await;
        Ok(ProbeOutput::new(true))
    }))
}

/// Records every invocation's (warmup, index) in call order.
pub fn recording() -> (Arc<dyn Probe>, Arc<Mutex<Vec<(bool, usize)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let probe = FnProbe::new(move |ctx: SampleContext| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push((ctx.warmup, ctx.index));
            Ok(ProbeOutput::new(true))
        }
    });
    (Arc::new(probe), calls)
}

/// Succeeds with probability given by the `rate` factor, deterministically:
/// the first `rate * 100` of every hundred indices succeed.
pub fn rate_factor() -> Arc<dyn Probe> {
    Arc::new(FnProbe::new(|ctx: SampleContext| async move {
        let rate = ctx.configuration.get_f64("rate").unwrap_or(0.0);
        let cutoff = (rate * 100.0).round() as usize;
        Ok(ProbeOutput::new(ctx.index % 100 < cutoff))
    }))
}
