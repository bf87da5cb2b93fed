//! Collect readings for a minute, then print them in the upload wire shape.
//!
//! Run with: cargo run --example readings_export

use anthill_ble::{BleCentral, ControllerConfig, Result, SensorController, DEFAULT_SCAN_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let (central, events) = BleCentral::new().await?;

    let config = ControllerConfig {
        scan_timeout: DEFAULT_SCAN_TIMEOUT,
        install_id: Some("demo-install".to_string()),
    };
    let mut controller = SensorController::with_config(Arc::new(central), config);

    println!("Collecting readings for 60 seconds (Ctrl+C to stop early)...\n");

    tokio::select! {
        _ = controller.run(events) => {}
        _ = tokio::time::sleep(Duration::from_secs(60)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    let records = controller.upload_records();
    println!("\nCollected {} readings:", records.len());
    for record in &records {
        let line = serde_json::to_string(record).expect("record serializes");
        println!("{line}");
    }

    Ok(())
}
