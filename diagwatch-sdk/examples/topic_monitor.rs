//! Example: Diagnosing a publisher
//!
//! This example publishes synthetic camera frames through a diagnosed
//! publisher and prints the report produced every second.
//!
//! The frame rate drops halfway through, and the later frames carry
//! stale stamps, so the report moves from OK to WARN/ERROR.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=diagwatch_sdk=debug cargo run --example topic_monitor
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use diagwatch_sdk::{
    ChannelPublisher, DiagnosedPublisher, FrequencyConfig, Output, Stamp, TimestampConfig,
    Updater,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (output, mut reports) = Output::channel(8);
    let updater = Updater::builder()
        .hardware_id("demo-host")
        .output(output)
        .period(Duration::from_secs(1))
        .build();

    let (channel, mut frames) = ChannelPublisher::create("/camera/image", 64);
    let publisher = DiagnosedPublisher::new(
        channel,
        FrequencyConfig::new(25.0, 35.0),
        TimestampConfig::new(0.0, 0.5),
    )?;
    publisher.attach(&updater)?;

    // Drain frames like a subscriber would
    tokio::spawn(async move { while frames.recv().await.is_some() {} });

    let emission = updater.start();

    // Print each report as it arrives
    let printer = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            for status in report.iter() {
                println!("[{}] {}: {}", status.level, status.name, status.message);
                for kv in &status.values {
                    println!("    {} = {}", kv.key, kv.value);
                }
            }
            println!();
        }
    });

    for frame in 0..300u32 {
        let (interval, lag) = if frame < 150 { (33, 0.05) } else { (80, 1.5) };

        let stamp = Stamp::from_secs_f64(now() - lag);
        publisher.publish(json!({
            "header": {
                "stamp": {"sec": stamp.sec, "nanosec": stamp.nanosec},
                "frame_id": "camera",
            },
            "frame": frame,
        }))?;

        tokio::time::sleep(Duration::from_millis(interval)).await;
    }

    emission.stop();
    drop(updater);
    printer.abort();
    Ok(())
}
