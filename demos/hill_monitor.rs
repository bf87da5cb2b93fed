//! Live anthill monitoring example
//!
//! Run with: cargo run --example hill_monitor

use anthill_ble::{BleCentral, Notification, Result, SensorController};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (minimal)
    tracing_subscriber::fmt().with_env_filter("warn").init();

    println!("Anthill Monitor");
    println!("===============\n");
    println!("Scanning for anthills...\n");

    let (central, events) = BleCentral::new().await?;
    let mut controller = SensorController::new(Arc::new(central));

    let mut notifications = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            match notification {
                Notification::ActiveDeviceChanged(Some(name)) => {
                    println!("Connected to {name}");
                }
                Notification::ActiveDeviceChanged(None) => {
                    println!("Disconnected, scanning again...");
                }
                Notification::ReadingsChanged { readings, session } => {
                    if let (Some(reading), Some(session)) = (readings.last(), session) {
                        println!("[{session}] {reading} ({} total)", readings.len());
                    }
                }
            }
        }
    });

    println!("Press Ctrl+C to exit.\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\nExiting...");
        }
        _ = controller.run(events) => {
            println!("\nTransport closed");
        }
    }

    Ok(())
}
