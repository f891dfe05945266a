/*
[INPUT]:  Interactive user input via CLI
[OUTPUT]: Generated YAML configuration file
[POS]:    CLI initialization layer
[UPDATE]: When ScalpConfig schema changes
*/

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use rust_decimal::Decimal;

use bybit_scalp_adapter::Category;
use bybit_scalp_strategy::config::{CredentialsConfig, ScalpConfig};

pub fn run_init(output: PathBuf) -> Result<()> {
    println!("{}", style("Welcome to bybit-scalp init").bold().cyan());
    println!(
        "{}",
        style("This will guide you through creating a new session configuration.").dim()
    );

    let theme = ColorfulTheme::default();

    let symbol: String = Input::with_theme(&theme)
        .with_prompt("Trading symbol (e.g., BTCUSDT)")
        .default("BTCUSDT".to_string())
        .interact_text()?;

    let categories = vec!["linear", "inverse", "spot"];
    let category_selection = Select::with_theme(&theme)
        .with_prompt("Product category")
        .items(&categories)
        .default(0)
        .interact()?;
    let category = match categories[category_selection] {
        "inverse" => Category::Inverse,
        "spot" => Category::Spot,
        _ => Category::Linear,
    };

    println!("\n{}", style("--- Credentials ---").bold());
    let api_key: String = Input::with_theme(&theme)
        .with_prompt("API key")
        .interact_text()?;
    let api_secret: String = Input::with_theme(&theme)
        .with_prompt("API secret")
        .interact_text()?;

    println!("\n{}", style("--- Instrument ---").bold());
    let tick_size: String = Input::with_theme(&theme)
        .with_prompt("Tick size")
        .default("0.01".to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            match Decimal::from_str(input) {
                Ok(value) if value > Decimal::ZERO => Ok(()),
                _ => Err("tick size must be a positive decimal"),
            }
        })
        .interact_text()?;

    let order_qty: String = Input::with_theme(&theme)
        .with_prompt("Order quantity")
        .default("0.1".to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            match Decimal::from_str(input) {
                Ok(value) if value > Decimal::ZERO => Ok(()),
                _ => Err("order quantity must be a positive decimal"),
            }
        })
        .interact_text()?;

    println!("\n{}", style("--- Ladder ---").bold());
    let max_buy_orders: u32 = Input::with_theme(&theme)
        .with_prompt("Max simultaneous BUY orders")
        .default(3)
        .interact_text()?;
    let offset_ticks: u32 = Input::with_theme(&theme)
        .with_prompt("Offset below the best bid (ticks)")
        .default(2)
        .interact_text()?;
    let layer_step_ticks: u32 = Input::with_theme(&theme)
        .with_prompt("Step between layers (ticks)")
        .default(1)
        .interact_text()?;
    let buy_ttl_secs: u64 = Input::with_theme(&theme)
        .with_prompt("BUY order TTL (seconds)")
        .default(30)
        .interact_text()?;
    let reprice_ticks: u32 = Input::with_theme(&theme)
        .with_prompt("Reprice when drifted by (ticks)")
        .default(5)
        .interact_text()?;

    println!("\n{}", style("--- Take-profit ---").bold());
    let tp_ticks: u32 = Input::with_theme(&theme)
        .with_prompt("Profit target (ticks)")
        .default(5)
        .interact_text()?;
    let max_tp_orders: u32 = Input::with_theme(&theme)
        .with_prompt("Max open take-profit orders")
        .default(5)
        .interact_text()?;

    println!("\n{}", style("--- Engine ---").bold());
    let loop_interval_ms: u64 = Input::with_theme(&theme)
        .with_prompt("Tick loop interval (ms)")
        .default(1000)
        .interact_text()?;
    let wait_after_buy_fill_ms: u64 = Input::with_theme(&theme)
        .with_prompt("Cooldown after a buy fill (ms, 0 to disable)")
        .default(0)
        .interact_text()?;
    let sell_all_on_stop = Confirm::with_theme(&theme)
        .with_prompt("Flatten open positions with market sells on stop?")
        .default(false)
        .interact()?;

    let config = ScalpConfig {
        credentials: CredentialsConfig {
            api_key,
            api_secret,
        },
        symbol,
        category,
        tick_size: Decimal::from_str(&tick_size).expect("validated above"),
        order_qty: Decimal::from_str(&order_qty).expect("validated above"),
        max_buy_orders,
        offset_ticks,
        layer_step_ticks,
        buy_ttl_secs,
        reprice_ticks,
        tp_ticks,
        max_tp_orders,
        loop_interval_ms,
        wait_after_buy_fill_ms,
        sell_all_on_stop,
        base_url: None,
    };

    config.validate()?;

    let yaml = serde_yaml::to_string(&config).context("failed to serialize config to YAML")?;

    std::fs::write(&output, yaml)
        .context(format!("failed to write config to {}", output.display()))?;

    println!("\n{}", style("SUCCESS!").bold().green());
    println!(
        "Configuration written to: {}",
        style(output.display()).cyan()
    );

    Ok(())
}
