//! Portfolio roll-up and transaction history
//!
//! Portfolio view: available balance, value locked in open positions,
//! unrealized PnL, and a history of past buy/sell/claim events
//! recovered from transaction logs.

use anyhow::{Context, Result};
use chrono::{LocalResult, TimeZone, Utc};
use colored::Colorize;
use futures::future::try_join_all;
use indicatif::ProgressBar;
use log::{debug, warn};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    rpc_client::{GetConfirmedSignaturesForAddress2Config, RpcClient},
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
};
use solana_transaction_status::UiTransactionEncoding;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use market_model::{
    aggregate_portfolio, Market, MarketId, Position, Side,
};

use crate::accounts::{
    self, MarketEvent, ACCOUNT_TAG_POSITION, POSITION_OWNER_OFFSET,
};
use crate::{client, config::NetworkConfig};

/// Fetch all open positions owned by `owner`
pub fn fetch_positions(config: &NetworkConfig, owner: &Pubkey) -> Result<Vec<Position>> {
    let rpc_client = client::create_rpc_client(config);

    let filters = vec![
        RpcFilterType::Memcmp(Memcmp::new_base58_encoded(0, &[ACCOUNT_TAG_POSITION])),
        RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            POSITION_OWNER_OFFSET,
            owner.as_ref(),
        )),
    ];
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
        .context("Failed to list position accounts")?;

    let mut positions = Vec::with_capacity(accounts.len());
    for (address, account) in accounts {
        match accounts::decode_position(&account.data) {
            Ok(position) => positions.push(position.to_model(&address)),
            Err(err) => warn!("skipping undecodable position {}: {}", address, err),
        }
    }
    Ok(positions)
}

/// Fetch every position of one market, regardless of owner
pub fn fetch_market_positions(
    config: &NetworkConfig,
    market: &Pubkey,
) -> Result<Vec<Position>> {
    let rpc_client = client::create_rpc_client(config);

    let filters = vec![
        RpcFilterType::Memcmp(Memcmp::new_base58_encoded(0, &[ACCOUNT_TAG_POSITION])),
        RpcFilterType::Memcmp(Memcmp::new_base58_encoded(1, market.as_ref())),
    ];
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
        .context("Failed to list market positions")?;

    let mut positions = Vec::with_capacity(accounts.len());
    for (address, account) in accounts {
        match accounts::decode_position(&account.data) {
            Ok(position) => positions.push(position.to_model(&address)),
            Err(err) => warn!("skipping undecodable position {}: {}", address, err),
        }
    }
    Ok(positions)
}

/// Fetch the market snapshots behind a set of positions, fanning out
/// one blocking RPC call per market. Markets that fail to load are
/// reported and skipped; the roll-up treats their positions as gaps.
async fn fetch_markets_for(
    config: &NetworkConfig,
    market_ids: BTreeSet<MarketId>,
) -> Result<(BTreeMap<MarketId, Market>, BTreeMap<MarketId, String>)> {
    let progress = ProgressBar::new(market_ids.len() as u64);
    let program_id = config.market_program_id;

    let tasks: Vec<_> = market_ids
        .into_iter()
        .map(|market_id| {
            let rpc_url = config.rpc_url.clone();
            let progress = progress.clone();
            tokio::task::spawn_blocking(move || {
                let rpc_client = RpcClient::new_with_commitment(
                    rpc_url,
                    CommitmentConfig::confirmed(),
                );
                let address = Pubkey::new_from_array(market_id.0);
                let result = rpc_client
                    .get_account(&address)
                    .ok()
                    .filter(|account| account.owner == program_id)
                    .and_then(|account| accounts::decode_market(&account.data).ok())
                    .map(|decoded| (market_id, decoded));
                progress.inc(1);
                result
            })
        })
        .collect();

    let fetched = try_join_all(tasks)
        .await
        .context("Market fetch task failed")?;
    progress.finish_and_clear();

    let mut markets = BTreeMap::new();
    let mut descriptions = BTreeMap::new();
    for entry in fetched.into_iter().flatten() {
        let (market_id, decoded) = entry;
        let address = Pubkey::new_from_array(market_id.0);
        markets.insert(market_id, decoded.to_model(&address));
        descriptions.insert(market_id, decoded.description);
    }
    Ok((markets, descriptions))
}

pub async fn show_portfolio(config: &NetworkConfig, user: Option<String>) -> Result<()> {
    let owner = match user {
        Some(address) => Pubkey::from_str(&address).context("Invalid user address")?,
        None => config.pubkey(),
    };

    println!("{}", "=== Portfolio ===".bright_green().bold());
    println!("{} {}", "User:".bright_cyan(), owner);

    let positions = fetch_positions(config, &owner)?;
    debug!("fetched {} open positions", positions.len());

    let market_ids: BTreeSet<MarketId> =
        positions.iter().map(|p| p.market_id).collect();
    let (markets, descriptions) = fetch_markets_for(config, market_ids).await?;

    let available_balance = client::get_settlement_balance(config, &owner)?;
    let summary = aggregate_portfolio(&positions, &markets, available_balance)
        .map_err(|e| anyhow::anyhow!("Portfolio aggregation failed: {:?}", e))?;

    println!("\n{}", "=== Overview ===".bright_yellow());
    println!(
        "{} {}",
        "Total value:".bright_cyan(),
        client::format_amount(summary.total_value).bold(),
    );
    println!(
        "{} {}",
        "Available:".bright_cyan(),
        client::format_amount(summary.available_balance),
    );
    println!(
        "{} {}",
        "In positions:".bright_cyan(),
        client::format_amount(summary.in_positions_value),
    );
    let pnl = client::format_signed_amount(summary.total_pnl);
    let pnl = if summary.total_pnl >= 0 {
        pnl.bright_green()
    } else {
        pnl.bright_red()
    };
    match summary.total_pnl_percent {
        Some(percent) => {
            println!("{} {} ({:+.1}%)", "Unrealized PnL:".bright_cyan(), pnl, percent)
        }
        None => println!("{} {}", "Unrealized PnL:".bright_cyan(), pnl),
    }
    if summary.positions_without_cost_basis > 0 {
        println!(
            "{}",
            format!(
                "  ({} position(s) have no recorded cost basis and are excluded from PnL)",
                summary.positions_without_cost_basis
            )
            .dimmed()
        );
    }
    if summary.positions_skipped > 0 {
        println!(
            "{}",
            format!(
                "  ({} position(s) reference markets that could not be fetched)",
                summary.positions_skipped
            )
            .yellow()
        );
    }

    println!("\n{}", "=== Open Positions ===".bright_yellow());
    if summary.positions.is_empty() {
        println!("{}", "No open positions".dimmed());
        return Ok(());
    }

    for valuation in &summary.positions {
        let side = match valuation.side {
            Side::Yes => "YES".bright_green(),
            Side::No => "NO".bright_red(),
        };
        let title = descriptions
            .get(&valuation.market_id)
            .map(String::as_str)
            .unwrap_or("<unknown market>");

        println!();
        println!("{} {}", side.bold(), title.bold());
        println!(
            "  {} {}  {} ${:.2}  {} {}",
            "Shares:".bright_cyan(),
            client::format_amount(valuation.shares),
            "Price:".bright_cyan(),
            valuation.price,
            "Value:".bright_cyan(),
            client::format_amount(valuation.value),
        );
        match (valuation.pnl, valuation.pnl_percent) {
            (Some(pnl), Some(percent)) => {
                let rendered = client::format_signed_amount(pnl);
                let rendered = if pnl >= 0 {
                    rendered.bright_green()
                } else {
                    rendered.bright_red()
                };
                println!("  {} {} ({:+.1}%)", "PnL:".bright_cyan(), rendered, percent);
            }
            (Some(pnl), None) => {
                println!("  {} {}", "PnL:".bright_cyan(), client::format_signed_amount(pnl));
            }
            (None, _) => {
                println!("  {} {}", "PnL:".bright_cyan(), "n/a (no cost basis)".dimmed());
            }
        }
        if valuation.resolved {
            println!("  {}", "market resolved - check claimable winnings".yellow());
        }
    }

    Ok(())
}

/// Recent buy/sell/claim activity, recovered from the event payloads
/// the program writes to its transaction logs
pub async fn show_history(
    config: &NetworkConfig,
    user: Option<String>,
    limit: usize,
) -> Result<()> {
    let owner = match user {
        Some(address) => Pubkey::from_str(&address).context("Invalid user address")?,
        None => config.pubkey(),
    };

    println!("{}", "=== History ===".bright_green().bold());
    println!("{} {}", "User:".bright_cyan(), owner);

    let rpc_client = client::create_rpc_client(config);
    let signatures = rpc_client
        .get_signatures_for_address_with_config(
            &owner,
            GetConfirmedSignaturesForAddress2Config {
                limit: Some(limit),
                ..GetConfirmedSignaturesForAddress2Config::default()
            },
        )
        .context("Failed to list transactions")?;

    let owner_str = owner.to_string();
    let mut shown = 0usize;
    for entry in &signatures {
        if entry.err.is_some() {
            continue;
        }
        let signature: Signature = entry
            .signature
            .parse()
            .context("Invalid signature in RPC response")?;
        let tx = match rpc_client.get_transaction(&signature, UiTransactionEncoding::Json) {
            Ok(tx) => tx,
            Err(err) => {
                debug!("skipping transaction {}: {}", entry.signature, err);
                continue;
            }
        };

        let logs: Vec<String> = tx
            .transaction
            .meta
            .and_then(|meta| Option::<Vec<String>>::from(meta.log_messages))
            .unwrap_or_default();

        for event in logs.iter().filter_map(|line| accounts::parse_event_log(line)) {
            if event.user() != Some(owner_str.as_str()) {
                continue;
            }
            let when = entry
                .block_time
                .map(format_block_time)
                .unwrap_or_else(|| "-".to_string());
            print_event(&event, &when, &entry.signature);
            shown += 1;
        }
    }

    if shown == 0 {
        println!("\n{}", "No market activity found".dimmed());
    }
    Ok(())
}

fn print_event(event: &MarketEvent, when: &str, signature: &str) {
    let short_sig = &signature[..signature.len().min(8)];
    match event {
        MarketEvent::PositionBought { market_id, cost, .. } => {
            println!(
                "{} {}  {} {}  {} {}  {}",
                when.dimmed(),
                "BUY".bright_red(),
                "-".bright_red(),
                client::format_amount(*cost),
                "market".bright_cyan(),
                market_id,
                short_sig.dimmed(),
            );
        }
        MarketEvent::PositionSold { market_id, payout, .. } => {
            println!(
                "{} {}  {} {}  {} {}  {}",
                when.dimmed(),
                "SELL".bright_green(),
                "+".bright_green(),
                client::format_amount(*payout),
                "market".bright_cyan(),
                market_id,
                short_sig.dimmed(),
            );
        }
        MarketEvent::WinningsClaimed { market_id, amount, .. } => {
            println!(
                "{} {}  {} {}  {} {}  {}",
                when.dimmed(),
                "CLAIM".bright_green().bold(),
                "+".bright_green(),
                client::format_amount(*amount),
                "market".bright_cyan(),
                market_id,
                short_sig.dimmed(),
            );
        }
        MarketEvent::MarketCreated { .. } => {}
    }
}

fn format_block_time(unix_seconds: i64) -> String {
    match Utc.timestamp_opt(unix_seconds, 0) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_times_render_compactly() {
        assert_eq!(format_block_time(1_700_000_000), "2023-11-14 22:13");
    }
}
