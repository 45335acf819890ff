//! Wire formats for the external market program
//!
//! Account layouts are bincode-encoded with a leading discriminator
//! byte; instruction data is a discriminator byte followed by
//! little-endian fields. The program itself is an external
//! collaborator; this module only mirrors its formats so the CLI can
//! decode query results and construct calls.

use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use std::str::FromStr;
use thiserror::Error;

use market_model::{Market, MarketId, Position, PositionId, Side};

/// Account discriminators
pub const ACCOUNT_TAG_MARKET: u8 = 1;
pub const ACCOUNT_TAG_POSITION: u8 = 2;

/// Byte offset of the owner field inside a position account
/// (tag + market pubkey), used for server-side memcmp filtering
pub const POSITION_OWNER_OFFSET: usize = 1 + 32;

/// Instruction discriminators
pub const IX_CREATE_MARKET: u8 = 0;
pub const IX_BUY_YES: u8 = 1;
pub const IX_BUY_NO: u8 = 2;
pub const IX_SELL_PARTIAL: u8 = 3;
pub const IX_SELL_POSITION: u8 = 4;
pub const IX_CLAIM_WINNINGS: u8 = 5;
pub const IX_RESOLVE_MARKET: u8 = 6;

/// Size the program allocates for a position account:
/// tag + market + owner + is_yes + shares + Option<cost_basis>
pub const POSITION_ACCOUNT_LEN: usize = 1 + 32 + 32 + 1 + 8 + 9;

pub fn token_program_id() -> Pubkey {
    Pubkey::from_str("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA")
        .expect("Invalid token program ID")
}

fn associated_token_program_id() -> Pubkey {
    Pubkey::from_str("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL")
        .expect("Invalid associated token program ID")
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("account data is empty")]
    Empty,
    #[error("wrong account tag: expected {expected}, found {found}")]
    WrongTag { expected: u8, found: u8 },
    #[error("malformed account data: {0}")]
    Bincode(#[from] bincode::Error),
}

/// On-chain market account state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAccount {
    pub tag: u8,
    pub description: String,
    pub market_type: String,
    pub deadline_ms: u64,
    pub yes_shares_sold: u64,
    pub no_shares_sold: u64,
    pub total_funds: u64,
    pub resolved: bool,
    pub outcome: Option<bool>,
}

impl MarketAccount {
    /// Numeric view of this account for the pricing/settlement model
    pub fn to_model(&self, address: &Pubkey) -> Market {
        Market {
            id: MarketId(address.to_bytes()),
            deadline_ms: self.deadline_ms,
            yes_shares_sold: self.yes_shares_sold,
            no_shares_sold: self.no_shares_sold,
            total_funds: self.total_funds,
            resolved: self.resolved,
            outcome: self.outcome.map(Side::from_is_yes),
        }
    }
}

/// On-chain position account state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAccount {
    pub tag: u8,
    pub market: [u8; 32],
    pub owner: [u8; 32],
    pub is_yes: bool,
    pub shares: u64,
    /// Currency paid at purchase; older program versions never wrote it
    pub cost_basis: Option<u64>,
}

impl PositionAccount {
    pub fn to_model(&self, address: &Pubkey) -> Position {
        Position {
            id: PositionId(address.to_bytes()),
            market_id: MarketId(self.market),
            side: Side::from_is_yes(self.is_yes),
            shares: self.shares,
            cost_basis: self.cost_basis,
        }
    }

    pub fn market_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.market)
    }

    pub fn owner_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }
}

fn check_tag(data: &[u8], expected: u8) -> Result<(), DecodeError> {
    match data.first() {
        None => Err(DecodeError::Empty),
        Some(&tag) if tag != expected => Err(DecodeError::WrongTag { expected, found: tag }),
        Some(_) => Ok(()),
    }
}

pub fn decode_market(data: &[u8]) -> Result<MarketAccount, DecodeError> {
    check_tag(data, ACCOUNT_TAG_MARKET)?;
    Ok(bincode::deserialize(data)?)
}

pub fn decode_position(data: &[u8]) -> Result<PositionAccount, DecodeError> {
    check_tag(data, ACCOUNT_TAG_POSITION)?;
    Ok(bincode::deserialize(data)?)
}

/// Derive the market's pool vault PDA
pub fn derive_vault(program_id: &Pubkey, market: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"vault", market.as_ref()], program_id)
}

/// Derive the associated token account holding `owner`'s settlement
/// currency
pub fn derive_token_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program_id().as_ref(), mint.as_ref()],
        &associated_token_program_id(),
    )
    .0
}

/// Build instruction data: discriminator + length-prefixed strings +
/// little-endian deadline
pub fn build_create_market_ix(
    program_id: &Pubkey,
    admin: &Pubkey,
    market: &Pubkey,
    description: &str,
    market_type: &str,
    deadline_ms: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(1 + 8 + description.len() + 8 + market_type.len() + 8);
    data.push(IX_CREATE_MARKET);
    data.extend_from_slice(&(description.len() as u64).to_le_bytes());
    data.extend_from_slice(description.as_bytes());
    data.extend_from_slice(&(market_type.len() as u64).to_le_bytes());
    data.extend_from_slice(market_type.as_bytes());
    data.extend_from_slice(&deadline_ms.to_le_bytes());

    let (vault, _bump) = derive_vault(program_id, market);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*market, true),
            AccountMeta::new(vault, false),
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(token_program_id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Build instruction data: [discriminator (1u8), amount (8 bytes)]
pub fn build_buy_ix(
    program_id: &Pubkey,
    market: &Pubkey,
    position: &Pubkey,
    user: &Pubkey,
    user_token_account: &Pubkey,
    side: Side,
    amount: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(match side {
        Side::Yes => IX_BUY_YES,
        Side::No => IX_BUY_NO,
    });
    data.extend_from_slice(&amount.to_le_bytes());

    let (vault, _bump) = derive_vault(program_id, market);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*market, false),
            AccountMeta::new(*position, true),
            AccountMeta::new(*user, true),
            AccountMeta::new(*user_token_account, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(token_program_id(), false),
        ],
        data,
    }
}

/// Build instruction data: [discriminator (1u8), shares (8 bytes)]
pub fn build_sell_partial_ix(
    program_id: &Pubkey,
    market: &Pubkey,
    position: &Pubkey,
    user: &Pubkey,
    user_token_account: &Pubkey,
    shares: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(IX_SELL_PARTIAL);
    data.extend_from_slice(&shares.to_le_bytes());

    Instruction {
        program_id: *program_id,
        accounts: sell_accounts(program_id, market, position, user, user_token_account),
        data,
    }
}

/// Full sell: consumes the position account
pub fn build_sell_position_ix(
    program_id: &Pubkey,
    market: &Pubkey,
    position: &Pubkey,
    user: &Pubkey,
    user_token_account: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: sell_accounts(program_id, market, position, user, user_token_account),
        data: vec![IX_SELL_POSITION],
    }
}

/// Claim winnings: consumes a winning position after resolution
pub fn build_claim_ix(
    program_id: &Pubkey,
    market: &Pubkey,
    position: &Pubkey,
    user: &Pubkey,
    user_token_account: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: sell_accounts(program_id, market, position, user, user_token_account),
        data: vec![IX_CLAIM_WINNINGS],
    }
}

/// Build instruction data: [discriminator (1u8), outcome (1u8)]
pub fn build_resolve_ix(
    program_id: &Pubkey,
    market: &Pubkey,
    admin: &Pubkey,
    outcome: Side,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*market, false),
            AccountMeta::new(*admin, true),
        ],
        data: vec![IX_RESOLVE_MARKET, matches!(outcome, Side::Yes) as u8],
    }
}

fn sell_accounts(
    program_id: &Pubkey,
    market: &Pubkey,
    position: &Pubkey,
    user: &Pubkey,
    user_token_account: &Pubkey,
) -> Vec<AccountMeta> {
    let (vault, _bump) = derive_vault(program_id, market);
    vec![
        AccountMeta::new(*market, false),
        AccountMeta::new(*position, false),
        AccountMeta::new(*user, true),
        AccountMeta::new(*user_token_account, false),
        AccountMeta::new(vault, false),
        AccountMeta::new_readonly(token_program_id(), false),
    ]
}

/// Prefix the program prepends to its JSON event payloads in the
/// transaction log
pub const EVENT_LOG_PREFIX: &str = "Program log: EVT ";

/// Events the program emits; field names match the on-chain payloads
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum MarketEvent {
    MarketCreated {
        market_id: String,
        description: String,
    },
    PositionBought {
        market_id: String,
        user: String,
        is_yes: bool,
        cost: u64,
    },
    PositionSold {
        market_id: String,
        user: String,
        payout: u64,
    },
    WinningsClaimed {
        market_id: String,
        user: String,
        amount: u64,
    },
}

impl MarketEvent {
    pub fn user(&self) -> Option<&str> {
        match self {
            MarketEvent::MarketCreated { .. } => None,
            MarketEvent::PositionBought { user, .. }
            | MarketEvent::PositionSold { user, .. }
            | MarketEvent::WinningsClaimed { user, .. } => Some(user),
        }
    }
}

/// Parse one transaction log line into an event, if it is one
pub fn parse_event_log(line: &str) -> Option<MarketEvent> {
    let payload = line.strip_prefix(EVENT_LOG_PREFIX)?;
    serde_json::from_str(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_market_checks_tag() {
        let account = MarketAccount {
            tag: ACCOUNT_TAG_MARKET,
            description: "Will it rain tomorrow?".to_string(),
            market_type: "science".to_string(),
            deadline_ms: 1_800_000_000_000,
            yes_shares_sold: 3_000_000,
            no_shares_sold: 1_000_000,
            total_funds: 5_000_000,
            resolved: false,
            outcome: None,
        };
        let bytes = bincode::serialize(&account).unwrap();

        let decoded = decode_market(&bytes).unwrap();
        assert_eq!(decoded.description, account.description);
        assert_eq!(decoded.yes_shares_sold, 3_000_000);

        // A position tag must not decode as a market
        let err = decode_position(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::WrongTag { expected: 2, found: 1 }));

        assert!(matches!(decode_market(&[]).unwrap_err(), DecodeError::Empty));
    }

    #[test]
    fn position_owner_sits_at_the_filter_offset() {
        let account = PositionAccount {
            tag: ACCOUNT_TAG_POSITION,
            market: [7; 32],
            owner: [9; 32],
            is_yes: true,
            shares: 42,
            cost_basis: Some(21),
        };
        let bytes = bincode::serialize(&account).unwrap();
        assert_eq!(
            &bytes[POSITION_OWNER_OFFSET..POSITION_OWNER_OFFSET + 32],
            &[9u8; 32]
        );
        assert_eq!(bytes.len(), POSITION_ACCOUNT_LEN);
    }

    #[test]
    fn buy_instruction_layout() {
        let program = Pubkey::new_unique();
        let market = Pubkey::new_unique();
        let position = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        let token_account = Pubkey::new_unique();

        let ix = build_buy_ix(
            &program, &market, &position, &user, &token_account,
            Side::No, 10_000_000,
        );
        assert_eq!(ix.data[0], IX_BUY_NO);
        assert_eq!(ix.data[1..9], 10_000_000u64.to_le_bytes());
        // The fresh position account must co-sign its creation
        assert!(ix.accounts[1].is_signer);
    }

    #[test]
    fn event_log_lines_parse() {
        let line = r#"Program log: EVT {"kind":"PositionBought","market_id":"abc","user":"u1","is_yes":true,"cost":5000000}"#;
        let event = parse_event_log(line).unwrap();
        assert_eq!(
            event,
            MarketEvent::PositionBought {
                market_id: "abc".to_string(),
                user: "u1".to_string(),
                is_yes: true,
                cost: 5_000_000,
            }
        );
        assert_eq!(event.user(), Some("u1"));

        assert!(parse_event_log("Program log: something else").is_none());
    }
}
