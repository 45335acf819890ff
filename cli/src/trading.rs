//! Trading operations: quote, buy, sell, claim
//!
//! Every operation validates through the pricing/settlement model
//! before any transaction is built, so invalid trades are rejected
//! client-side with a concrete reason instead of burning a fee on a
//! program error.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use colored::Colorize;
use log::debug;
use solana_sdk::{
    pubkey::Pubkey, signature::Keypair, signer::Signer, system_instruction,
};
use std::str::FromStr;

use market_model::{
    mark_to_market_value, project_trade, quote, sell_proceeds, settle,
    Market, ModelError, Position, Side,
};

use crate::accounts::{self, POSITION_ACCOUNT_LEN};
use crate::{client, config::NetworkConfig};

/// Parse a user-typed side ("yes"/"no")
pub fn parse_side(side: &str) -> Result<Side> {
    match side.to_ascii_lowercase().as_str() {
        "yes" | "y" => Ok(Side::Yes),
        "no" | "n" => Ok(Side::No),
        other => Err(anyhow!("Unknown side: {} (use yes or no)", other)),
    }
}

/// Human reason for a model rejection
pub fn rejection(err: ModelError) -> anyhow::Error {
    match err {
        ModelError::InvalidInput => anyhow!("Amount must be positive"),
        ModelError::MarketResolved => anyhow!("Market is already resolved - trading is closed"),
        ModelError::MarketNotResolved => anyhow!("Market is not resolved yet"),
        ModelError::PositionNotFound => anyhow!("Position not found"),
        ModelError::AlreadyClaimed => anyhow!("Position was already claimed"),
        ModelError::NothingToClaim => anyhow!("Position is on the losing side - nothing to claim"),
        ModelError::InsufficientShares => anyhow!("Selling more shares than the position holds"),
        ModelError::MarketMismatch => anyhow!("Position belongs to a different market"),
        other => anyhow!("Trade rejected: {:?}", other),
    }
}

fn fetch_market(config: &NetworkConfig, address: &Pubkey) -> Result<Market> {
    let data = client::get_account_data(config, address)?;
    let account = accounts::decode_market(&data)?;
    Ok(account.to_model(address))
}

fn fetch_position(config: &NetworkConfig, address: &Pubkey) -> Result<(Position, Pubkey)> {
    let data = client::get_account_data(config, address)?;
    let account = accounts::decode_position(&data)?;
    Ok((account.to_model(address), account.owner_pubkey()))
}

fn print_projection(market: &Market, side: Side, spend: u64) -> Result<()> {
    let projection = project_trade(market, side, spend).map_err(rejection)?;
    let price = quote(market, side);

    println!("{} ${:.2}", "Price per share:".bright_cyan(), price);
    println!(
        "{} {}",
        "Estimated shares:".bright_cyan(),
        client::format_amount(projection.estimated_shares),
    );
    println!(
        "{} {}",
        "Potential payout:".bright_cyan(),
        client::format_amount(projection.projected_payout),
    );
    let profit = client::format_signed_amount(projection.projected_profit);
    if projection.projected_profit >= 0 {
        println!("{} {}", "Potential profit:".bright_cyan(), profit.bright_green());
    } else {
        println!("{} {}", "Potential profit:".bright_cyan(), profit.bright_red());
    }
    Ok(())
}

/// Pure projection, no transaction
pub async fn quote_trade(
    config: &NetworkConfig,
    market_address: String,
    side: String,
    amount: String,
) -> Result<()> {
    println!("{}", "=== Trade Quote ===".bright_green().bold());

    let address = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let side = parse_side(&side)?;
    let spend = client::parse_amount(&amount)?;

    let market = fetch_market(config, &address)?;
    println!("{} {}", "Market:".bright_cyan(), address);
    println!("{} {:?}", "Side:".bright_cyan(), side);
    println!("{} {}", "Spend:".bright_cyan(), client::format_amount(spend));
    println!();
    print_projection(&market, side, spend)?;

    println!(
        "\n{}",
        "Projection only - prices shift as the pool trades".dimmed()
    );
    Ok(())
}

pub async fn buy(
    config: &NetworkConfig,
    market_address: String,
    side: String,
    amount: String,
) -> Result<()> {
    println!("{}", "=== Buy Shares ===".bright_green().bold());
    println!("{} {}", "Network:".bright_cyan(), config.network);

    let address = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let side = parse_side(&side)?;
    let spend = client::parse_amount(&amount)?;
    let user = config.pubkey();

    let market = fetch_market(config, &address)?;
    let now_ms = Utc::now().timestamp_millis() as u64;
    if market.deadline_ms <= now_ms {
        anyhow::bail!("Market deadline has passed - trading is closed");
    }

    println!("{} {}", "Market:".bright_cyan(), address);
    println!("{} {:?}", "Side:".bright_cyan(), side);
    println!("{} {}", "Spend:".bright_cyan(), client::format_amount(spend));
    println!();
    print_projection(&market, side, spend)?;

    let balance = client::get_settlement_balance(config, &user)?;
    if balance < spend {
        anyhow::bail!(
            "Insufficient balance: have {}, need {}",
            client::format_amount(balance),
            client::format_amount(spend)
        );
    }

    // The position lives in a fresh account created atomically with
    // the buy, in the same transaction (create + initialize pattern)
    let position = Keypair::new();
    let rpc_client = client::create_rpc_client(config);
    let rent = rpc_client
        .get_minimum_balance_for_rent_exemption(POSITION_ACCOUNT_LEN)
        .context("Failed to get rent exemption")?;
    debug!("position account rent: {} lamports", rent);

    let create_account_ix = system_instruction::create_account(
        &user,
        &position.pubkey(),
        rent,
        POSITION_ACCOUNT_LEN as u64,
        &config.market_program_id,
    );
    let user_token_account = accounts::derive_token_account(&user, &config.settlement_mint);
    let buy_ix = accounts::build_buy_ix(
        &config.market_program_id,
        &address,
        &position.pubkey(),
        &user,
        &user_token_account,
        side,
        spend,
    );

    let signature = client::send_and_confirm_transaction(
        config,
        vec![create_account_ix, buy_ix],
        &[&position],
    )?;

    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    println!("{} {}", "Position:".bright_cyan(), position.pubkey());
    println!("{} {}", "Signature:".bright_cyan(), client::format_signature(&signature, &config.network));

    Ok(())
}

pub async fn sell(
    config: &NetworkConfig,
    market_address: String,
    position_address: String,
    shares: String,
) -> Result<()> {
    println!("{}", "=== Sell Shares ===".bright_green().bold());

    let market_addr = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let position_addr = Pubkey::from_str(&position_address).context("Invalid position address")?;
    let shares_to_sell = client::parse_amount(&shares)?;
    let user = config.pubkey();

    let market = fetch_market(config, &market_addr)?;
    let (position, owner) = fetch_position(config, &position_addr)?;
    if owner != user {
        anyhow::bail!("Position {} is not owned by {}", position_addr, user);
    }

    let proceeds = sell_proceeds(&position, &market, shares_to_sell).map_err(rejection)?;
    println!("{} {}", "Position:".bright_cyan(), position_addr);
    println!(
        "{} {} of {}",
        "Selling:".bright_cyan(),
        client::format_amount(shares_to_sell),
        client::format_amount(position.shares),
    );
    println!(
        "{} {}",
        "Expected proceeds:".bright_cyan(),
        client::format_amount(proceeds),
    );

    let user_token_account = accounts::derive_token_account(&user, &config.settlement_mint);
    let ix = accounts::build_sell_partial_ix(
        &config.market_program_id,
        &market_addr,
        &position_addr,
        &user,
        &user_token_account,
        shares_to_sell,
    );
    let signature = client::send_and_confirm_transaction(config, vec![ix], &[])?;

    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    println!("{} {}", "Signature:".bright_cyan(), client::format_signature(&signature, &config.network));

    Ok(())
}

pub async fn sell_all(
    config: &NetworkConfig,
    market_address: String,
    position_address: String,
) -> Result<()> {
    println!("{}", "=== Sell Position ===".bright_green().bold());

    let market_addr = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let position_addr = Pubkey::from_str(&position_address).context("Invalid position address")?;
    let user = config.pubkey();

    let market = fetch_market(config, &market_addr)?;
    let (position, owner) = fetch_position(config, &position_addr)?;
    if owner != user {
        anyhow::bail!("Position {} is not owned by {}", position_addr, user);
    }

    let proceeds = sell_proceeds(&position, &market, position.shares).map_err(rejection)?;
    println!("{} {}", "Position:".bright_cyan(), position_addr);
    println!(
        "{} {} shares for {}",
        "Selling all:".bright_cyan(),
        client::format_amount(position.shares),
        client::format_amount(proceeds),
    );

    let user_token_account = accounts::derive_token_account(&user, &config.settlement_mint);
    let ix = accounts::build_sell_position_ix(
        &config.market_program_id,
        &market_addr,
        &position_addr,
        &user,
        &user_token_account,
    );
    let signature = client::send_and_confirm_transaction(config, vec![ix], &[])?;

    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    println!("{}", "Position consumed".dimmed());
    println!("{} {}", "Signature:".bright_cyan(), client::format_signature(&signature, &config.network));

    Ok(())
}

pub async fn claim(
    config: &NetworkConfig,
    market_address: String,
    position_address: String,
) -> Result<()> {
    println!("{}", "=== Claim Winnings ===".bright_green().bold());

    let market_addr = Pubkey::from_str(&market_address).context("Invalid market address")?;
    let position_addr = Pubkey::from_str(&position_address).context("Invalid position address")?;
    let user = config.pubkey();

    let market = fetch_market(config, &market_addr)?;
    let (position, owner) = fetch_position(config, &position_addr)?;
    if owner != user {
        anyhow::bail!("Position {} is not owned by {}", position_addr, user);
    }

    // Refuses pre-resolution snapshots outright; a losing position is
    // not claimable
    let payout = settle(&position, &market).map_err(rejection)?;
    if payout == 0 && market.outcome != Some(position.side) {
        return Err(rejection(ModelError::NothingToClaim));
    }

    println!("{} {}", "Position:".bright_cyan(), position_addr);
    println!(
        "{} {}",
        "Current value:".bright_cyan(),
        client::format_amount(mark_to_market_value(&position, &market).map_err(rejection)?),
    );
    println!(
        "{} {}",
        "Payout:".bright_cyan(),
        client::format_amount(payout).bright_green(),
    );

    let user_token_account = accounts::derive_token_account(&user, &config.settlement_mint);
    let ix = accounts::build_claim_ix(
        &config.market_program_id,
        &market_addr,
        &position_addr,
        &user,
        &user_token_account,
    );
    let signature = client::send_and_confirm_transaction(config, vec![ix], &[])?;

    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    println!("{} {}", "Signature:".bright_cyan(), client::format_signature(&signature, &config.network));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_side() {
        assert_eq!(parse_side("yes").unwrap(), Side::Yes);
        assert_eq!(parse_side("NO").unwrap(), Side::No);
        assert_eq!(parse_side("y").unwrap(), Side::Yes);
        assert!(parse_side("maybe").is_err());
    }

    #[test]
    fn test_rejection_messages_are_specific() {
        assert!(rejection(ModelError::InsufficientShares)
            .to_string()
            .contains("more shares"));
        assert!(rejection(ModelError::MarketResolved)
            .to_string()
            .contains("resolved"));
    }
}
