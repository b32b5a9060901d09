//! Loading Timeline Example
//!
//! Drives a checkout page with two segments on an explicit timeline and
//! prints every change of the page's loading state.

use loadstate_core::{LoadingConfig, SetLoadingOptions};
use loadstate_runtime::LoadingManager;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Loading Timeline ===\n");

    let mut manager = LoadingManager::new();
    manager.create_area(
        "checkout",
        Some(
            LoadingConfig::new()
                .with_min_loading_time(Duration::from_millis(300))
                .with_debounce_time(Duration::from_millis(100)),
        ),
    )?;
    manager.add_segment("checkout", "cart", None)?;
    manager.add_segment("checkout", "payment", None)?;

    manager.subscribe("checkout", |loading| {
        println!("   -> checkout loading = {}", loading);
    })?;

    // 1. Both segments start loading
    println!("1. cart and payment start loading at {:?}", manager.now());
    manager.set_loading_state("checkout/cart", true, SetLoadingOptions::default())?;
    manager.set_loading_state("checkout/payment", true, SetLoadingOptions::default())?;

    // 2. A quick flicker on the cart is absorbed
    manager.advance(Duration::from_millis(20));
    println!("\n2. cart flickers at {:?}", manager.now());
    manager.set_loading_state("checkout/cart", false, SetLoadingOptions::default())?;
    manager.advance(Duration::from_millis(30));
    manager.set_loading_state("checkout/cart", true, SetLoadingOptions::default())?;

    // 3. Everything finishes early
    manager.advance(Duration::from_millis(50));
    println!("\n3. cart and payment finish at {:?}", manager.now());
    manager.set_loading_state("checkout/cart", false, SetLoadingOptions::default())?;
    manager.set_loading_state("checkout/payment", false, SetLoadingOptions::default())?;
    println!(
        "   still loading: {}",
        manager.get_loading_state("checkout")?
    );

    // 4. Let the minimum loading time run out
    while let Some(deadline) = manager.next_deadline() {
        manager.advance_to(deadline);
        println!("   timer at {:?}", manager.now());
    }

    println!(
        "\nSettled at {:?}: loading = {}",
        manager.now(),
        manager.get_loading_state("checkout")?
    );
    Ok(())
}
