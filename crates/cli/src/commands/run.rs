//! `run` command - drive a live pipeline against a collector.

use std::time::Duration;

use anyhow::Result;
use beacon::Beacon;
use config_loader::ConfigLoader;
use serde_json::{json, Map};
use tokio::time::sleep;
use tracing::info;

use crate::cli::RunArgs;

pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let config = ConfigLoader::load_from_path(&args.config)?;

    if args.metrics_port > 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    info!(
        endpoint = %config.events_endpoint,
        count = args.count,
        "Starting smoke-test run"
    );

    let beacon = Beacon::builder(&args.token, config).build()?;

    for sequence in 0..args.count {
        let mut properties = Map::new();
        properties.insert("sequence".to_string(), json!(sequence));
        properties.insert("source".to_string(), json!("beacon-cli"));
        beacon.track(&args.event, Some(properties));
    }

    beacon.flush();
    sleep(Duration::from_millis(args.flush_wait_ms)).await;

    let metrics = beacon.metrics();
    info!(
        enqueued = metrics.enqueued_count,
        sent = metrics.sent_count,
        discarded = metrics.discarded_count,
        pending = metrics.queue_depth,
        "Run finished"
    );

    println!("Events enqueued:  {}", metrics.enqueued_count);
    println!("Records sent:     {}", metrics.sent_count);
    println!("Records discarded: {}", metrics.discarded_count);
    if metrics.sent_count < metrics.enqueued_count {
        println!("Some records are still pending; they stay buffered for the next run.");
    }

    Ok(())
}
