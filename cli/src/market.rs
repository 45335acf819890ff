//! Market browsing: list and inspect market accounts

use anyhow::{Context, Result};
use chrono::{LocalResult, TimeZone, Utc};
use colored::Colorize;
use log::warn;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use market_model::{display_percentages, Market};

use crate::accounts::{self, MarketAccount, ACCOUNT_TAG_MARKET};
use crate::{client, config::NetworkConfig};

/// Categories the program accepts at market creation
pub const MARKET_TYPES: &[&str] = &[
    "sports",
    "crypto",
    "politics",
    "entertainment",
    "science",
    "economy",
    "other",
];

/// Fetch every market account of the program
pub fn fetch_all_markets(config: &NetworkConfig) -> Result<Vec<(Pubkey, MarketAccount)>> {
    let rpc_client = client::create_rpc_client(config);

    let filters = vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
        0,
        &[ACCOUNT_TAG_MARKET],
    ))];
    let accounts = rpc_client
        .get_program_accounts_with_config(
            &config.market_program_id,
            RpcProgramAccountsConfig {
                filters: Some(filters),
                account_config: RpcAccountInfoConfig {
                    encoding: Some(UiAccountEncoding::Base64),
                    ..RpcAccountInfoConfig::default()
                },
                ..RpcProgramAccountsConfig::default()
            },
        )
        .context("Failed to list market accounts")?;

    let mut markets = Vec::with_capacity(accounts.len());
    for (address, account) in accounts {
        match accounts::decode_market(&account.data) {
            Ok(market) => markets.push((address, market)),
            Err(err) => {
                // Tolerate unknown account versions instead of failing
                // the whole listing
                warn!("skipping undecodable market account {}: {}", address, err);
            }
        }
    }
    Ok(markets)
}

pub async fn list_markets(
    config: &NetworkConfig,
    category: Option<String>,
    open_only: bool,
) -> Result<()> {
    println!("{}", "=== Markets ===".bright_green().bold());
    println!("{} {}", "Program:".bright_cyan(), config.market_program_id);

    let mut markets = fetch_all_markets(config)?;
    let now_ms = Utc::now().timestamp_millis() as u64;

    if let Some(ref category) = category {
        markets.retain(|(_, m)| m.market_type.eq_ignore_ascii_case(category));
    }
    if open_only {
        markets.retain(|(_, m)| !m.resolved && m.deadline_ms > now_ms);
    }
    // Newest deadlines first
    markets.sort_by(|a, b| b.1.deadline_ms.cmp(&a.1.deadline_ms));

    if markets.is_empty() {
        println!("\n{}", "No markets found".dimmed());
        return Ok(());
    }

    for (address, account) in &markets {
        let model = account.to_model(address);
        let (yes_pct, no_pct) = display_percentages(&model);

        println!();
        println!("{}", account.description.bold());
        println!(
            "  {} {}  {} {}",
            "Market:".bright_cyan(),
            client::format_pubkey(address),
            "Category:".bright_cyan(),
            account.market_type,
        );
        println!(
            "  {} {}  {} {}",
            format!("YES {:>3}%", yes_pct).bright_green(),
            format!("NO {:>3}%", no_pct).bright_red(),
            "Pool:".bright_cyan(),
            client::format_amount(account.total_funds),
        );
        println!(
            "  {} {}  {}",
            "Deadline:".bright_cyan(),
            format_deadline(account.deadline_ms),
            market_status(account, now_ms),
        );
    }

    println!("\n{} {}", "Total:".bright_cyan(), markets.len());
    Ok(())
}

pub async fn show_market_info(config: &NetworkConfig, market_address: String) -> Result<()> {
    println!("{}", "=== Market Info ===".bright_green().bold());
    println!("{} {}", "Network:".bright_cyan(), config.network);

    let address = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let data = client::get_account_data(config, &address)?;
    let account = accounts::decode_market(&data)?;
    let model = account.to_model(&address);
    let now_ms = Utc::now().timestamp_millis() as u64;

    println!("{} {}", "Market:".bright_cyan(), address);
    println!("{} {}", "Description:".bright_cyan(), account.description);
    println!("{} {}", "Category:".bright_cyan(), account.market_type);
    println!("{} {}", "Deadline:".bright_cyan(), format_deadline(account.deadline_ms));
    println!("{} {}", "Status:".bright_cyan(), market_status(&account, now_ms));

    println!("\n{}", "=== Probabilities ===".bright_yellow());
    print_probability_bar(&model);
    println!(
        "{} {} shares   {} {} shares",
        "YES sold:".bright_cyan(),
        account.yes_shares_sold,
        "NO sold:".bright_cyan(),
        account.no_shares_sold,
    );

    println!("\n{}", "=== Pool ===".bright_yellow());
    println!(
        "{} {} ({} units)",
        "Total funds:".bright_cyan(),
        client::format_amount(account.total_funds),
        account.total_funds,
    );
    let (vault, _bump) = accounts::derive_vault(&config.market_program_id, &address);
    println!("{} {}", "Vault:".bright_cyan(), vault);

    if account.resolved {
        let outcome = match account.outcome {
            Some(true) => "YES".bright_green(),
            Some(false) => "NO".bright_red(),
            None => "unknown".yellow(),
        };
        println!("\n{} {}", "Resolved outcome:".bright_cyan(), outcome);
    }

    Ok(())
}

/// Render YES/NO percentages with a proportional bar
fn print_probability_bar(market: &Market) {
    let (yes_pct, no_pct) = display_percentages(market);
    let filled = (yes_pct as usize) / 2;
    let bar: String = "█".repeat(filled) + &"░".repeat(50 - filled);
    println!(
        "{} {} {}",
        format!("YES {:>3}%", yes_pct).bright_green().bold(),
        bar,
        format!("NO {:>3}%", no_pct).bright_red().bold(),
    );
}

pub fn format_deadline(deadline_ms: u64) -> String {
    match Utc.timestamp_millis_opt(deadline_ms as i64) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        _ => format!("{} ms", deadline_ms),
    }
}

pub fn market_status(account: &MarketAccount, now_ms: u64) -> String {
    if account.resolved {
        match account.outcome {
            Some(true) => "resolved: YES".bright_green().to_string(),
            Some(false) => "resolved: NO".bright_red().to_string(),
            None => "resolved".yellow().to_string(),
        }
    } else if account.deadline_ms <= now_ms {
        "awaiting resolution".yellow().to_string()
    } else {
        "open".bright_green().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(resolved: bool, outcome: Option<bool>, deadline_ms: u64) -> MarketAccount {
        MarketAccount {
            tag: ACCOUNT_TAG_MARKET,
            description: "d".to_string(),
            market_type: "crypto".to_string(),
            deadline_ms,
            yes_shares_sold: 0,
            no_shares_sold: 0,
            total_funds: 0,
            resolved,
            outcome,
        }
    }

    #[test]
    fn status_reflects_lifecycle() {
        let now = 1_000;
        assert!(market_status(&account(false, None, 2_000), now).contains("open"));
        assert!(market_status(&account(false, None, 500), now).contains("awaiting"));
        assert!(market_status(&account(true, Some(true), 500), now).contains("YES"));
        assert!(market_status(&account(true, Some(false), 500), now).contains("NO"));
    }

    #[test]
    fn deadlines_render_as_utc() {
        // 2023-11-14 22:13:20 UTC
        assert_eq!(format_deadline(1_700_000_000_000), "2023-11-14 22:13 UTC");
    }
}
