//! Solana RPC client utilities and helpers

use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};

use market_model::SCALE;

use crate::accounts;
use crate::config::NetworkConfig;

/// Create an RPC client from the network configuration
pub fn create_rpc_client(config: &NetworkConfig) -> RpcClient {
    RpcClient::new_with_commitment(
        config.rpc_url.clone(),
        CommitmentConfig::confirmed(),
    )
}

/// Send and confirm a transaction signed by the payer plus any
/// additional signers (e.g. a freshly created position account)
pub fn send_and_confirm_transaction(
    config: &NetworkConfig,
    instructions: Vec<Instruction>,
    extra_signers: &[&Keypair],
) -> Result<Signature> {
    let client = create_rpc_client(config);

    let recent_blockhash = client
        .get_latest_blockhash()
        .context("Failed to get recent blockhash")?;

    let mut transaction = Transaction::new_with_payer(
        &instructions,
        Some(&config.pubkey()),
    );

    let mut signers: Vec<&Keypair> = vec![&config.keypair];
    signers.extend_from_slice(extra_signers);
    transaction.sign(&signers, recent_blockhash);

    println!("{}", "Sending transaction...".dimmed());

    let signature = client
        .send_and_confirm_transaction(&transaction)
        .context("Failed to send and confirm transaction")?;

    println!("{} {}", "Transaction confirmed:".bright_green(), signature);

    Ok(signature)
}

/// Get account data
pub fn get_account_data(
    config: &NetworkConfig,
    address: &Pubkey,
) -> Result<Vec<u8>> {
    let client = create_rpc_client(config);

    let account = client
        .get_account(address)
        .with_context(|| format!("Failed to get account: {}", address))?;

    if account.owner != config.market_program_id {
        anyhow::bail!(
            "Account {} is not owned by the market program (owner: {})",
            address,
            account.owner
        );
    }

    Ok(account.data)
}

/// Settlement-currency balance of `owner`, in smallest units.
/// A missing token account reads as zero.
pub fn get_settlement_balance(config: &NetworkConfig, owner: &Pubkey) -> Result<u64> {
    let client = create_rpc_client(config);
    let token_account = accounts::derive_token_account(owner, &config.settlement_mint);

    debug!("fetching token balance for {}", token_account);
    match client.get_token_account_balance(&token_account) {
        Ok(balance) => parse_token_amount(&balance),
        Err(err) => {
            debug!("no token account found ({}), treating balance as 0", err);
            Ok(0)
        }
    }
}

fn parse_token_amount(amount: &UiTokenAmount) -> Result<u64> {
    amount
        .amount
        .parse::<u64>()
        .with_context(|| format!("Unparseable token amount: {}", amount.amount))
}

/// Parse a user-typed currency amount ("10", "10.25") into smallest
/// units, without going through floating point. Rejects empty input,
/// negative values and more than 6 fractional digits.
pub fn parse_amount(input: &str) -> Result<u64> {
    let input = input.trim();
    if input.is_empty() || input.starts_with('-') || input.starts_with('+') {
        anyhow::bail!("Invalid amount: {:?}", input);
    }

    let (whole_str, frac_str) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };
    if whole_str.is_empty() && frac_str.is_empty() {
        anyhow::bail!("Invalid amount: {:?}", input);
    }
    if frac_str.len() > 6 {
        anyhow::bail!("Amounts support at most 6 decimal places: {:?}", input);
    }

    let whole: u64 = if whole_str.is_empty() {
        0
    } else {
        whole_str
            .parse()
            .with_context(|| format!("Invalid amount: {:?}", input))?
    };

    let mut frac: u64 = 0;
    if !frac_str.is_empty() {
        frac = frac_str
            .parse()
            .with_context(|| format!("Invalid amount: {:?}", input))?;
        for _ in frac_str.len()..6 {
            frac *= 10;
        }
    }

    whole
        .checked_mul(SCALE)
        .and_then(|units| units.checked_add(frac))
        .with_context(|| format!("Amount out of range: {:?}", input))
}

/// Format smallest units as whole currency with two decimals
pub fn format_amount(units: u64) -> String {
    format!("{:.2}", units as f64 / SCALE as f64)
}

/// Format a signed PnL in smallest units, keeping the sign visible
pub fn format_signed_amount(units: i64) -> String {
    let formatted = format!("{:.2}", units.unsigned_abs() as f64 / SCALE as f64);
    if units < 0 {
        format!("-{}", formatted)
    } else {
        format!("+{}", formatted)
    }
}

/// Pretty print a signature as a shortened explorer link
pub fn format_signature(signature: &Signature, network: &str) -> String {
    let sig_str = signature.to_string();
    let short = format!("{}...{}", &sig_str[0..8], &sig_str[sig_str.len() - 8..]);

    let explorer_url = match network {
        "mainnet-beta" | "mainnet" => format!("https://explorer.solana.com/tx/{}", sig_str),
        "devnet" => format!("https://explorer.solana.com/tx/{}?cluster=devnet", sig_str),
        "localnet" | "local" => format!("http://localhost:3000/tx/{}", sig_str),
        _ => sig_str.clone(),
    };

    format!("{} ({})", short.bright_blue(), explorer_url.dimmed())
}

/// Pretty print a pubkey as shortened address
pub fn format_pubkey(pubkey: &Pubkey) -> String {
    let addr = pubkey.to_string();
    format!("{}...{}", &addr[0..8], &addr[addr.len() - 8..]).bright_yellow().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_amounts() {
        assert_eq!(parse_amount("10").unwrap(), 10_000_000);
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount(" 500 ").unwrap(), 500_000_000);
    }

    #[test]
    fn test_parse_fractional_amounts() {
        assert_eq!(parse_amount("10.25").unwrap(), 10_250_000);
        assert_eq!(parse_amount("0.000001").unwrap(), 1);
        assert_eq!(parse_amount(".5").unwrap(), 500_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1.2345678").is_err());
        assert!(parse_amount("ten").is_err());
        assert!(parse_amount(".").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_234_567), "1.23");
        assert_eq!(format_signed_amount(-500_000), "-0.50");
        assert_eq!(format_signed_amount(500_000), "+0.50");
    }
}
