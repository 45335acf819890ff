//! Oraculo CLI - Binary outcome prediction markets
//!
//! Command-line front end for an on-chain prediction-market program:
//! browse markets, buy YES/NO shares, track a portfolio, and (for the
//! market admin) create and resolve markets. Pricing, trade
//! projections and payout math live in the `market_model` crate; the
//! program that holds the markets is an external collaborator.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod accounts;
mod admin;
mod client;
mod config;
mod market;
mod portfolio;
mod trading;

use config::NetworkConfig;

#[derive(Parser)]
#[command(name = "oraculo")]
#[command(about = "Oraculo CLI - Trade binary outcome prediction markets", long_about = None)]
#[command(version)]
struct Cli {
    /// Network to connect to (localnet, devnet, mainnet-beta)
    #[arg(short, long, default_value = "devnet")]
    network: String,

    /// RPC URL (overrides network default)
    #[arg(short, long)]
    url: Option<String>,

    /// Path to keypair file
    #[arg(short, long)]
    keypair: Option<PathBuf>,

    /// Market program address (overrides oraculo.toml)
    #[arg(short, long)]
    program: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse markets
    Market {
        #[command(subcommand)]
        command: MarketCommands,
    },

    /// Trading operations
    Trade {
        #[command(subcommand)]
        command: TradeCommands,
    },

    /// Portfolio and history
    Portfolio {
        #[command(subcommand)]
        command: PortfolioCommands,
    },

    /// Admin operations (market creation and resolution)
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum MarketCommands {
    /// List markets
    List {
        /// Only markets of this category
        #[arg(long)]
        category: Option<String>,

        /// Hide resolved and expired markets
        #[arg(long)]
        open_only: bool,
    },

    /// Show market details
    Info {
        /// Market address
        market: String,
    },
}

#[derive(Subcommand)]
enum TradeCommands {
    /// Project a trade without submitting it
    Quote {
        /// Market address
        market: String,

        /// Side to buy (yes or no)
        side: String,

        /// Amount to spend, in whole currency units (e.g. 10 or 10.25)
        amount: String,
    },

    /// Buy YES or NO shares
    Buy {
        /// Market address
        market: String,

        /// Side to buy (yes or no)
        side: String,

        /// Amount to spend, in whole currency units
        amount: String,
    },

    /// Sell part of a position
    Sell {
        /// Market address
        market: String,

        /// Position address
        position: String,

        /// Share quantity to sell, in whole units
        #[arg(long)]
        shares: String,
    },

    /// Sell an entire position (consumes it)
    SellAll {
        /// Market address
        market: String,

        /// Position address
        position: String,
    },

    /// Claim winnings from a resolved market
    Claim {
        /// Market address
        market: String,

        /// Position address
        position: String,
    },
}

#[derive(Subcommand)]
enum PortfolioCommands {
    /// Show balances, open positions and unrealized PnL
    Show {
        /// Optional user address (defaults to CLI keypair)
        user: Option<String>,
    },

    /// Show recent buy/sell/claim activity
    History {
        /// Optional user address (defaults to CLI keypair)
        user: Option<String>,

        /// Number of recent transactions to scan
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new market
    CreateMarket {
        /// Market question, e.g. "Will BTC close above 100k this year?"
        description: String,

        /// Category (sports, crypto, politics, entertainment, science, economy, other)
        #[arg(long)]
        market_type: String,

        /// Trading deadline (RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD", UTC)
        #[arg(long)]
        deadline: String,
    },

    /// Resolve a market after its deadline
    Resolve {
        /// Market address
        market: String,

        /// Winning side (yes or no)
        outcome: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let config = NetworkConfig::new(
        &cli.network,
        cli.url.clone(),
        cli.keypair.clone(),
        cli.program.clone(),
    )?;

    if cli.verbose {
        println!("{} {}", "Network:".bright_cyan(), config.network);
        println!("{} {}", "RPC URL:".bright_cyan(), config.rpc_url);
        println!("{} {}", "Keypair:".bright_cyan(), config.keypair_path.display());
        println!("{} {}", "Program:".bright_cyan(), config.market_program_id);
    }

    match cli.command {
        Commands::Market { command } => {
            match command {
                MarketCommands::List { category, open_only } => {
                    market::list_markets(&config, category, open_only).await?;
                }
                MarketCommands::Info { market } => {
                    market::show_market_info(&config, market).await?;
                }
            }
        }
        Commands::Trade { command } => {
            match command {
                TradeCommands::Quote { market, side, amount } => {
                    trading::quote_trade(&config, market, side, amount).await?;
                }
                TradeCommands::Buy { market, side, amount } => {
                    trading::buy(&config, market, side, amount).await?;
                }
                TradeCommands::Sell { market, position, shares } => {
                    trading::sell(&config, market, position, shares).await?;
                }
                TradeCommands::SellAll { market, position } => {
                    trading::sell_all(&config, market, position).await?;
                }
                TradeCommands::Claim { market, position } => {
                    trading::claim(&config, market, position).await?;
                }
            }
        }
        Commands::Portfolio { command } => {
            match command {
                PortfolioCommands::Show { user } => {
                    portfolio::show_portfolio(&config, user).await?;
                }
                PortfolioCommands::History { user, limit } => {
                    portfolio::show_history(&config, user, limit).await?;
                }
            }
        }
        Commands::Admin { command } => {
            match command {
                AdminCommands::CreateMarket { description, market_type, deadline } => {
                    admin::create_market(&config, description, market_type, deadline).await?;
                }
                AdminCommands::Resolve { market, outcome } => {
                    admin::resolve_market(&config, market, outcome).await?;
                }
            }
        }
    }

    Ok(())
}
