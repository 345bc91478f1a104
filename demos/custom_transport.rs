//! Custom transport example
//!
//! Replaces the HTTP transport with one that prints each push payload,
//! failing every third push to show retries and delivery-failure reporting.
//!
//! Run with: cargo run --example custom_transport

use loki_logger_system::prelude::*;
use loki_logger_system::transport::StatusCode;
use std::sync::Arc;
use std::time::Duration;

struct StdoutTransport {
    pushes: usize,
}

impl Transport for StdoutTransport {
    fn send(&mut self, payload: &[u8]) -> std::result::Result<StatusCode, TransportError> {
        self.pushes += 1;
        if self.pushes % 3 == 0 {
            println!("   push #{} -> 503", self.pushes);
            return Err(TransportError::Status {
                code: 503,
                body: "simulated outage".to_string(),
            });
        }
        println!("   push #{} -> {}", self.pushes, String::from_utf8_lossy(payload));
        Ok(204)
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

fn main() -> Result<()> {
    println!("=== Loki Logger System - Custom Transport Example ===\n");

    let logger = LokiLogger::builder("custom-transport")
        .transport(StdoutTransport { pushes: 0 })
        .console_echo(false)
        .label("region", "eu-west-1")
        .batch_size(3)
        .flush_interval(Duration::from_millis(200))
        .max_retries(1)
        .backoff(Duration::from_millis(50), Duration::from_millis(200))
        .on_delivery_failure(Arc::new(|failure: &DeliveryFailure| {
            println!(
                "   dropped {} records after {} attempts: {}",
                failure.batch_size, failure.attempts, failure.error
            );
        }))
        .build()?;

    for i in 0..9 {
        logger.info(format!("job {} finished", i))?;
    }
    logger.log_with_labels(LogLevel::Error, "job 9 failed", [("job_id", "9")])?;

    logger.shutdown(Duration::from_secs(2));
    println!("\n   loss rate: {:.2}%", logger.metrics().loss_rate());

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
