//! Network configuration and keypair management

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default settlement currency: USDC (6 decimals, matching the
/// market's 1e6 smallest-unit scale)
const DEFAULT_SETTLEMENT_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Optional overrides read from `oraculo.toml`
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub keypair: Option<String>,
    pub program_id: Option<String>,
    pub settlement_mint: Option<String>,
}

pub struct NetworkConfig {
    pub network: String,
    pub rpc_url: String,
    pub ws_url: String,
    pub keypair: Keypair,
    pub keypair_path: PathBuf,
    /// The external prediction-market program this CLI talks to
    pub market_program_id: Pubkey,
    /// Mint of the currency markets are denominated in
    pub settlement_mint: Pubkey,
}

impl NetworkConfig {
    pub fn new(
        network: &str,
        rpc_url: Option<String>,
        keypair_path: Option<PathBuf>,
        program_id: Option<String>,
    ) -> Result<Self> {
        let (default_rpc, ws_url) = match network {
            "localnet" | "local" => (
                "http://127.0.0.1:8899".to_string(),
                "ws://127.0.0.1:8900".to_string(),
            ),
            "devnet" => (
                "https://api.devnet.solana.com".to_string(),
                "wss://api.devnet.solana.com".to_string(),
            ),
            "mainnet-beta" | "mainnet" => (
                "https://api.mainnet-beta.solana.com".to_string(),
                "wss://api.mainnet-beta.solana.com".to_string(),
            ),
            _ => anyhow::bail!("Unknown network: {}. Use localnet, devnet, or mainnet-beta", network),
        };

        let file_config = read_file_config(Path::new("oraculo.toml"))?.unwrap_or_default();

        let rpc_url = rpc_url
            .or(file_config.rpc_url)
            .unwrap_or(default_rpc);

        // Resolve keypair path: flag > config file > Solana CLI default
        let keypair_path = if let Some(path) = keypair_path {
            path
        } else if let Some(path) = file_config.keypair {
            PathBuf::from(shellexpand::tilde(&path).into_owned())
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config/solana/id.json")
        };

        let keypair = load_keypair(&keypair_path)?;

        let program_id_str = program_id
            .or(file_config.program_id)
            .context("Market program id not configured - pass --program or set program_id in oraculo.toml")?;
        let market_program_id = Pubkey::from_str(&program_id_str)
            .with_context(|| format!("Invalid market program id: {}", program_id_str))?;

        let mint_str = file_config
            .settlement_mint
            .unwrap_or_else(|| DEFAULT_SETTLEMENT_MINT.to_string());
        let settlement_mint = Pubkey::from_str(&mint_str)
            .with_context(|| format!("Invalid settlement mint: {}", mint_str))?;

        Ok(Self {
            network: network.to_string(),
            rpc_url,
            ws_url,
            keypair,
            keypair_path,
            market_program_id,
            settlement_mint,
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

/// Read `oraculo.toml` if present; a missing file is not an error
fn read_file_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(Some(config))
}

/// Load a keypair from a JSON file
fn load_keypair(path: &Path) -> Result<Keypair> {
    if !path.exists() {
        anyhow::bail!(
            "Keypair file not found: {}\n\
             Create one with: solana-keygen new --outfile {}",
            path.display(),
            path.display()
        );
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read keypair file: {}", path.display()))?;

    let bytes: Vec<u8> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse keypair JSON: {}", path.display()))?;

    Keypair::from_bytes(&bytes)
        .with_context(|| format!("Invalid keypair data in: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_network_rejected() {
        let config = NetworkConfig::new("testnet2", None, None, None);
        assert!(config.is_err());
        assert!(config.err().unwrap().to_string().contains("Unknown network"));
    }

    #[test]
    fn test_file_config_parse() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "rpc_url = \"http://localhost:8899\"\nprogram_id = \"11111111111111111111111111111111\""
        )
        .unwrap();

        let config = read_file_config(file.path()).unwrap().unwrap();
        assert_eq!(config.rpc_url.as_deref(), Some("http://localhost:8899"));
        assert_eq!(
            config.program_id.as_deref(),
            Some("11111111111111111111111111111111")
        );
        assert!(config.settlement_mint.is_none());
    }

    #[test]
    fn test_missing_config_file_is_not_an_error() {
        let config = read_file_config(Path::new("/nonexistent/oraculo.toml")).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_keypair_load_roundtrip() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()).unwrap();

        let loaded = load_keypair(file.path()).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }
}
