// crates/pollen-cli/src/commands/config.rs
//
// `pollen config`: print the effective protocol configuration.

use tabled::Tabled;

use crate::output::{format_json, format_table, format_units, OutputFormat};
use pollen_core::config::ProtocolConfig;

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Listed")]
    listed: bool,
}

/// Run the config command.
pub async fn run(
    config: &ProtocolConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Json {
        println!("{}", format_json(config));
        return Ok(());
    }

    println!("Protocol Configuration");
    println!("----------------------");
    println!("  Lock period:        {}s .. {}s", config.min_lock_period, config.max_lock_period);
    println!("  Staking emission:   {} / s", format_units(config.reward_rate_units()));
    println!("  Price max age:      {}s", config.price_max_age);
    println!(
        "  Portfolio deposit:  {} .. {}",
        format_units(config.min_portfolio_deposit_units()?),
        format_units(config.max_portfolio_balance_units()?)
    );
    println!("  Batch limit:        {}", config.max_delegation_operations);
    println!(
        "  Boost:              scale {} bps, cap {} bps",
        config.boost_scale_bps, config.boost_cap_bps
    );
    println!("  Owner fee:          {} bps", config.owner_fee_bps);
    println!();

    let rows: Vec<AssetRow> = config
        .assets
        .iter()
        .enumerate()
        .map(|(index, asset)| AssetRow {
            index,
            symbol: asset.symbol.clone(),
            listed: asset.listed,
        })
        .collect();
    println!("{}", format_table(&rows));
    println!();
    println!("As TOML:");
    println!("{}", toml::to_string_pretty(config)?);

    Ok(())
}
