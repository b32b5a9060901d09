//! Loading Service Example
//!
//! Runs the registry as a tokio task and talks to it through a handle.
//! Set `RUST_LOG=loadstate_runtime=trace` to watch the service loop.

use loadstate_core::{LoadingConfig, SetLoadingOptions};
use loadstate_runtime::{init_logging, LoadingService, ServiceConfig};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");

    let config = ServiceConfig::default().with_area(
        "profile",
        LoadingConfig::new()
            .with_min_loading_time(Duration::from_millis(500))
            .with_debounce_time(Duration::from_millis(100)),
    );
    let (handle, task) = LoadingService::spawn(&config)?;

    let started = Instant::now();
    handle
        .subscribe("profile", move |loading| {
            println!("[{:>5?}] profile loading = {}", started.elapsed(), loading);
        })
        .await?;

    handle
        .set_loading_state("profile", true, SetLoadingOptions::default())
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle
        .set_loading_state("profile", false, SetLoadingOptions::default())
        .await?;

    // The spinner stays up for the full half second
    tokio::time::sleep(Duration::from_millis(700)).await;
    println!("final: {}", handle.get_loading_state("profile").await?);

    drop(handle);
    task.await?;
    Ok(())
}
