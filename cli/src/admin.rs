//! Admin operations: market creation and resolution
//!
//! Resolution is guarded client-side: only after the trading
//! deadline, only once.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use colored::Colorize;
use log::warn;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::str::FromStr;

use market_model::{settle_all, Market, ModelError, Side};

use crate::accounts;
use crate::market::{format_deadline, MARKET_TYPES};
use crate::{client, config::NetworkConfig, portfolio, trading};

pub async fn create_market(
    config: &NetworkConfig,
    description: String,
    market_type: String,
    deadline: String,
) -> Result<()> {
    println!("{}", "=== Create Market ===".bright_green().bold());
    println!("{} {}", "Network:".bright_cyan(), config.network);

    if description.trim().is_empty() {
        anyhow::bail!("Description must not be empty");
    }
    let market_type = market_type.to_ascii_lowercase();
    if !MARKET_TYPES.contains(&market_type.as_str()) {
        anyhow::bail!(
            "Unknown market type: {} (expected one of: {})",
            market_type,
            MARKET_TYPES.join(", ")
        );
    }

    let deadline_ms = parse_deadline(&deadline)?;
    let now_ms = Utc::now().timestamp_millis() as u64;
    if deadline_ms <= now_ms {
        anyhow::bail!("Deadline must be in the future: {}", format_deadline(deadline_ms));
    }

    let market = Keypair::new();
    println!("{} {}", "Market:".bright_cyan(), market.pubkey());
    println!("{} {}", "Description:".bright_cyan(), description);
    println!("{} {}", "Category:".bright_cyan(), market_type);
    println!("{} {}", "Deadline:".bright_cyan(), format_deadline(deadline_ms));

    let ix = accounts::build_create_market_ix(
        &config.market_program_id,
        &config.pubkey(),
        &market.pubkey(),
        &description,
        &market_type,
        deadline_ms,
    );
    let signature = client::send_and_confirm_transaction(config, vec![ix], &[&market])?;

    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    println!("{} {}", "Market:".bright_cyan(), market.pubkey());
    println!("{} {}", "Signature:".bright_cyan(), client::format_signature(&signature, &config.network));

    Ok(())
}

pub async fn resolve_market(
    config: &NetworkConfig,
    market_address: String,
    outcome: String,
) -> Result<()> {
    println!("{}", "=== Resolve Market ===".bright_green().bold());
    println!("{} {}", "Network:".bright_cyan(), config.network);

    let address = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let outcome = trading::parse_side(&outcome)?;

    let data = client::get_account_data(config, &address)?;
    let account = accounts::decode_market(&data)?;

    if account.resolved {
        anyhow::bail!("Market is already resolved");
    }
    let now_ms = Utc::now().timestamp_millis() as u64;
    if now_ms < account.deadline_ms {
        anyhow::bail!(
            "Market deadline has not passed yet - wait until {}",
            format_deadline(account.deadline_ms)
        );
    }

    println!("{} {}", "Market:".bright_cyan(), address);
    println!("{} {}", "Description:".bright_cyan(), account.description);
    println!("{} {:?}", "Resolving as:".bright_cyan(), outcome);
    println!(
        "{} {} across {} winning shares",
        "Pool to distribute:".bright_cyan(),
        client::format_amount(account.total_funds),
        match outcome {
            Side::Yes => account.yes_shares_sold,
            Side::No => account.no_shares_sold,
        },
    );
    preview_payouts(config, &address, &account, outcome);

    let ix = accounts::build_resolve_ix(
        &config.market_program_id,
        &address,
        &config.pubkey(),
        outcome,
    );
    let signature = client::send_and_confirm_transaction(config, vec![ix], &[])?;

    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    println!("{} {}", "Signature:".bright_cyan(), client::format_signature(&signature, &config.network));
    println!("\n{}", "Winners can now claim their payouts".bright_green());

    Ok(())
}

/// Preview the proportional split winners will be able to claim.
/// Best-effort: a failed preview never blocks the resolution.
fn preview_payouts(
    config: &NetworkConfig,
    address: &Pubkey,
    account: &accounts::MarketAccount,
    outcome: Side,
) {
    let positions = match portfolio::fetch_market_positions(config, address) {
        Ok(positions) => positions,
        Err(err) => {
            warn!("payout preview unavailable: {}", err);
            return;
        }
    };

    let resolved_view = Market {
        resolved: true,
        outcome: Some(outcome),
        ..account.to_model(address)
    };
    match settle_all(&positions, &resolved_view) {
        Ok(payouts) => {
            let winners = payouts.iter().filter(|(_, p)| *p > 0).count();
            let total: u64 = payouts.iter().map(|(_, p)| p).sum();
            println!(
                "{} {} winning position(s) will share {}",
                "Payouts:".bright_cyan(),
                winners,
                client::format_amount(total),
            );
        }
        Err(ModelError::EmptyWinnerSide) => {
            println!(
                "{}",
                "No shares on the winning side - the pool has no claimants".yellow()
            );
        }
        Err(err) => warn!("payout preview skipped: {:?}", err),
    }
}

/// Parse a deadline: RFC 3339, "YYYY-MM-DD HH:MM" or bare "YYYY-MM-DD"
/// (midnight), all interpreted as UTC
pub fn parse_deadline(input: &str) -> Result<u64> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp_millis() as u64);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Ok(naive.and_utc().timestamp_millis() as u64);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .context("Invalid deadline date")?;
        return Ok(naive.and_utc().timestamp_millis() as u64);
    }

    anyhow::bail!(
        "Unparseable deadline: {:?} (use RFC 3339, \"YYYY-MM-DD HH:MM\" or \"YYYY-MM-DD\")",
        input
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deadline_formats() {
        assert_eq!(
            parse_deadline("2023-11-14 22:13").unwrap(),
            1_699_999_980_000
        );
        assert_eq!(parse_deadline("2023-11-14").unwrap(), 1_699_920_000_000);
        assert_eq!(
            parse_deadline("2023-11-14T22:13:20Z").unwrap(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_parse_deadline_rejects_garbage() {
        assert!(parse_deadline("tomorrow").is_err());
        assert!(parse_deadline("14/11/2023").is_err());
    }
}
