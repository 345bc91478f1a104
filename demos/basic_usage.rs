//! Basic Loki logger usage example
//!
//! Pushes a handful of records to a Loki server and shuts down cleanly.
//! Point `LOKI_URL` at your server (defaults to `http://localhost:3100`).
//!
//! Run with: cargo run --example basic_usage

use loki_logger_system::prelude::*;
use loki_logger_system::{info, warn};
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Loki Logger System - Basic Usage Example ===\n");

    let endpoint =
        std::env::var("LOKI_URL").unwrap_or_else(|_| "http://localhost:3100".to_string());

    let mut builder = LokiLogger::builder("basic-usage")
        .endpoint(endpoint.as_str())
        .label("env", "demo")
        .min_level(LogLevel::Debug)
        .batch_size(5)
        .flush_interval(Duration::from_secs(1))
        .max_retries(2);

    if let (Ok(user), Ok(password)) = (std::env::var("LOKI_USER"), std::env::var("LOKI_PASSWORD")) {
        builder = builder.basic_auth(user, password);
    }

    let logger = builder.build()?;

    // Log messages at different levels
    println!("1. Logging at different levels:");
    logger.debug("This is a debug message")?;
    logger.info("This is an info message")?;
    logger.warn("This is a warning message")?;
    logger.error("This is an error message")?;
    logger.critical("This is a critical message")?;

    println!("\n2. Per-call labels and formatting macros:");
    logger.log_with_labels(LogLevel::Info, "user signed in", [("user_id", "42")])?;
    info!(logger, "listening on port {}", 8080)?;
    warn!(logger, "cache hit ratio {:.1}%", 61.5)?;

    println!("\n3. Flushing and shutting down:");
    let flushed = logger.flush(Duration::from_secs(5));
    println!("   flushed: {}", flushed);
    println!("   state before shutdown: {:?}", logger.dispatcher_state());
    let clean = logger.shutdown(Duration::from_secs(5));
    println!("   shutdown finished in time: {}", clean);

    let metrics = logger.metrics();
    println!(
        "   delivered {} records in {} attempts, lost {}",
        metrics.records_delivered(),
        metrics.send_attempts(),
        metrics.total_lost()
    );

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
