use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::ledger::{Block, Ledger};
use crate::wallet::mnemonic::Dictionary;

/// Shared application state: the in-memory ledger behind a mutex (the
/// engine itself is single-threaded by design) and the mnemonic word
/// list, loaded once at startup and read-only thereafter.
pub struct AppState {
    pub ledger: Mutex<Ledger>,
    pub dictionary: Dictionary,
}

impl AppState {
    pub fn new(dictionary: Dictionary) -> Self {
        Self {
            ledger: Mutex::new(Ledger::new()),
            dictionary,
        }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: u32,
    pub mining_reward: f64,
    pub remaining_supply: f64,
    pub next_halving_threshold: f64,
    pub target_block_time: f64,
    pub reward_adjust_interval: usize,
    pub pending_transactions: usize,
}

/* ---------- Balance API Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub identity: String,
    pub balance: f64,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct NewTxRequest {
    /// Hex private key of the sender (demo convenience: the driver
    /// signs server-side, as the original demo does).
    pub from_private_key: String,
    /// Raw public key or address of the recipient.
    pub to: String,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct NewTxResponse {
    pub hash: String,
    pub nonce: u64,
    pub pending: usize,
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize)]
pub struct MineRequest {
    /// Raw public key or address the coinbase reward is paid to.
    pub miner_address: String,
    /// Upper bound on Proof-of-Work attempts for this call.
    pub max_steps: Option<u64>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub sealed: bool,
    pub steps: u64,
    pub height: usize,
    pub difficulty: u32,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct NewWalletResponse {
    pub private_key: String,
    pub public_key: String,
    pub address: String,
    pub mnemonic: Vec<String>,
}

#[derive(Deserialize)]
pub struct RecoverRequest {
    pub mnemonic: Vec<String>,
}

#[derive(Serialize)]
pub struct RecoverResponse {
    pub private_key: String,
    pub public_key: String,
    pub address: String,
}
