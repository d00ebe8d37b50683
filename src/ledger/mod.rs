pub mod block;
pub mod model;

pub use block::Block;
pub use model::{BalanceIdentity, Ledger, LedgerError};

/// Starting Proof-of-Work difficulty (leading zero hex digits).
pub const DEFAULT_DIFFICULTY: u32 = 1;

/// Retargeting never lowers difficulty below this floor.
pub const MIN_DIFFICULTY: u32 = 1;

/// Blocks between difficulty retarget checks.
pub const REWARD_ADJUST_INTERVAL: usize = 5;

/// Target time per block, compared against the millisecond timestamp
/// difference divided by 1000.
pub const TARGET_BLOCK_TIME: f64 = 500.0;

/// Initial coinbase reward, halved as supply thresholds are crossed.
pub const INITIAL_MINING_REWARD: f64 = 10.0;

/// Total coin supply; rewards are debited from this until exhaustion.
pub const MAX_SUPPLY: f64 = 1_000_000.0;

pub const MAX_TXS_PER_BLOCK: usize = 5000;

/// Open-interval bounds on a single transfer amount.
pub const MIN_TX_AMOUNT: f64 = 0.00001;
pub const MAX_TX_AMOUNT: f64 = 100_000.0;

/// Maximum fractional digits carried by an amount.
pub const AMOUNT_PRECISION: usize = 10;

/// Largest exactly-representable integer magnitude (2^53 - 1).
pub const MAX_SAFE_AMOUNT: f64 = 9_007_199_254_740_991.0;

/// Round an amount to `precision` fractional digits via decimal
/// formatting, so the result is idempotent under re-rounding.
pub fn round_amount(amount: f64, precision: usize) -> f64 {
    format!("{amount:.precision$}")
        .parse()
        .expect("formatted float parses")
}
