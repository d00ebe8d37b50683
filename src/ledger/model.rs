use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;

use super::block::Block;
use super::{
    AMOUNT_PRECISION, DEFAULT_DIFFICULTY, INITIAL_MINING_REWARD, MAX_SAFE_AMOUNT, MAX_SUPPLY,
    MAX_TX_AMOUNT, MAX_TXS_PER_BLOCK, MIN_DIFFICULTY, MIN_TX_AMOUNT, REWARD_ADJUST_INTERVAL,
    TARGET_BLOCK_TIME, round_amount,
};
use crate::transaction::{Transaction, TransactionError};
use crate::wallet::{self, ADDRESS_LEN, Keypair, PUBLIC_KEY_HEX_LEN};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("a coinbase transaction is already pending")]
    CoinbasePending,
    #[error("invalid transaction")]
    InvalidTransaction,
    #[error("invalid address")]
    InvalidAddress,
    #[error("invalid transaction amount (overflow, NaN, or out of bounds)")]
    InvalidAmount,
    #[error("not enough funds")]
    InsufficientFunds,
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("transaction has no nonce")]
    MissingNonce,
    #[error("invalid transaction in pending pool")]
    InvalidPendingTransaction,
    #[error("block cannot contain more than one coinbase transaction")]
    MultipleCoinbase,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Who a balance query is about, resolved once at the call boundary
/// instead of re-inspecting strings inside the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceIdentity {
    RawPublicKey(String),
    Address(String),
    /// The mint itself; its balance is the remaining unissued supply.
    Mint,
    /// Unrecognizable identity; balance is zero by definition.
    Empty,
}

impl BalanceIdentity {
    /// Classify a free-form identity string by shape.
    pub fn classify(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Empty
        } else if raw == "mint" {
            Self::Mint
        } else if raw.len() == PUBLIC_KEY_HEX_LEN {
            Self::RawPublicKey(raw.to_string())
        } else if raw.len() == ADDRESS_LEN {
            Self::Address(raw.to_string())
        } else {
            Self::Empty
        }
    }
}

impl From<&Keypair> for BalanceIdentity {
    fn from(keypair: &Keypair) -> Self {
        Self::RawPublicKey(keypair.public_key_hex())
    }
}

/// The ledger state machine: the chain, the pending-transaction queue,
/// the per-sender nonce table and the consensus parameters. One owned
/// aggregate with no ambient state, so multiple independent ledgers can
/// coexist in a process and callers wanting concurrency wrap it in a
/// mutex themselves.
#[derive(Debug)]
pub struct Ledger {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    /// Next expected nonce per sender address.
    pub nonces: HashMap<String, u64>,
    pub difficulty: u32,
    pub reward_adjust_interval: usize,
    pub target_block_time: f64,
    pub mining_reward: f64,
    pub remaining_supply: f64,
    pub next_halving_threshold: f64,
    pub max_tx_per_block: usize,
    pub min_tx_amount: f64,
    pub max_tx_amount: f64,
    pub amount_precision: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending_transactions: Vec::new(),
            nonces: HashMap::new(),
            difficulty: DEFAULT_DIFFICULTY,
            reward_adjust_interval: REWARD_ADJUST_INTERVAL,
            target_block_time: TARGET_BLOCK_TIME,
            mining_reward: INITIAL_MINING_REWARD,
            remaining_supply: MAX_SUPPLY,
            next_halving_threshold: MAX_SUPPLY / 2.0,
            max_tx_per_block: MAX_TXS_PER_BLOCK,
            min_tx_amount: MIN_TX_AMOUNT,
            max_tx_amount: MAX_TX_AMOUNT,
            amount_precision: AMOUNT_PRECISION,
        }
    }

    pub fn latest_block(&self) -> &Block {
        self.chain.last().expect("chain always holds the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Next expected replay nonce for a sender address.
    pub fn next_nonce(&self, address: &str) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    /// Admit a transaction into the pending queue. Every check here is
    /// fatal: a rejected submission leaves the ledger untouched.
    pub fn add_transaction(&mut self, mut tx: Transaction) -> Result<(), LedgerError> {
        if tx.is_coinbase() && self.pending_transactions.iter().any(Transaction::is_coinbase) {
            return Err(LedgerError::CoinbasePending);
        }
        if !tx.validate() {
            return Err(LedgerError::InvalidTransaction);
        }
        if !tx.validate_address_shapes() {
            return Err(LedgerError::InvalidAddress);
        }
        if !tx.amount.is_finite()
            || tx.amount <= self.min_tx_amount
            || tx.amount >= self.max_tx_amount
            || tx.amount > MAX_SAFE_AMOUNT
        {
            return Err(LedgerError::InvalidAmount);
        }
        tx.amount = round_amount(tx.amount, self.amount_precision);

        // The spending account is the recorded signer; a coinbase has
        // none and spends from the mint.
        let spender = match &tx.signer_public_key {
            Some(pk) => BalanceIdentity::RawPublicKey(pk.clone()),
            None => BalanceIdentity::Mint,
        };
        if self.get_balance(&spender) < tx.amount {
            return Err(LedgerError::InsufficientFunds);
        }

        if !tx.is_coinbase() {
            let from = tx.from_address.as_deref().unwrap_or_default();
            let sender_address = if from.len() == PUBLIC_KEY_HEX_LEN {
                wallet::derive_address(from).map_err(|_| LedgerError::InvalidAddress)?
            } else {
                from.to_string()
            };
            let expected = self.next_nonce(&sender_address);
            match tx.nonce {
                Some(got) if got == expected => {}
                Some(got) => return Err(LedgerError::InvalidNonce { expected, got }),
                None => return Err(LedgerError::MissingNonce),
            }
            self.nonces.insert(sender_address, expected + 1);
        }

        debug!(
            "accepted tx {} ({:?}, amount {}) into pending queue",
            tx.hash, tx.pair, tx.amount
        );
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Batch up to `max_tx_per_block` pending transactions (FIFO) into
    /// a new unmined block linked to the chain tip. The batch is
    /// checked before the queue is touched, so a rejection changes
    /// nothing.
    pub fn commit_transactions(&mut self) -> Result<(), LedgerError> {
        let take = self.pending_transactions.len().min(self.max_tx_per_block);
        let mut coinbase_count = 0usize;
        for tx in &self.pending_transactions[..take] {
            if !tx.validate() {
                return Err(LedgerError::InvalidPendingTransaction);
            }
            if tx.is_coinbase() {
                coinbase_count += 1;
            }
        }
        if coinbase_count > 1 {
            return Err(LedgerError::MultipleCoinbase);
        }

        let transactions: Vec<Transaction> = self.pending_transactions.drain(..take).collect();
        let prev_hash = self.latest_block().hash.clone();
        let block = Block::new(transactions, prev_hash);
        info!(
            "assembled block #{} with {} transactions ({} still pending)",
            self.chain.len(),
            block.transactions.len(),
            self.pending_transactions.len()
        );
        self.chain.push(block);
        Ok(())
    }

    /// One turn of the mining protocol. If the tip is already mined (or
    /// is the genesis block) this assembles the next mineable block
    /// instead and reports no progress. Otherwise it runs exactly one
    /// PoW step; on success it applies the halving schedule, pays the
    /// coinbase reward (unless the supply is exhausted, which leaves
    /// the block mined but reward-less) and retargets difficulty.
    ///
    /// `Ok(false)` is a progress signal, not an error: call again.
    pub fn commit_mining(&mut self, miner_address: &str) -> Result<bool, LedgerError> {
        let tip = self.latest_block();
        if tip.mined || tip.prev_hash.is_empty() {
            self.commit_transactions()?;
            return Ok(false);
        }

        let difficulty = self.difficulty;
        let tip = self.chain.last_mut().expect("chain always holds the genesis block");
        if !tip.step(difficulty) {
            return Ok(false);
        }
        info!(
            "sealed block #{} (hash {}, nonce {}, difficulty {})",
            self.chain.len() - 1,
            self.latest_block().hash,
            self.latest_block().nonce,
            difficulty
        );

        if self.next_halving_threshold >= self.remaining_supply
            && self.mining_reward >= self.min_tx_amount
        {
            self.next_halving_threshold /= 2.0;
            self.mining_reward = round_amount(self.mining_reward / 2.0, self.amount_precision);
            info!(
                "halving: reward now {}, next threshold {}",
                self.mining_reward, self.next_halving_threshold
            );
        }

        if self.mining_reward > self.remaining_supply {
            warn!("supply exhausted; block stays mined without a reward");
            return Ok(false);
        }
        self.remaining_supply -= self.mining_reward;

        let reward = Transaction::new(None, miner_address.to_string(), self.mining_reward)?;
        self.add_transaction(reward)?;
        self.adjust_difficulty();
        Ok(true)
    }

    /// Every `reward_adjust_interval` blocks, compare the elapsed time
    /// across the window against the target and nudge difficulty by one
    /// in the offending direction (10% tolerance band, floor of 1).
    /// Timestamps are milliseconds and the difference is divided by
    /// 1000 before the comparison, exactly as the scheme defines it.
    pub fn adjust_difficulty(&mut self) {
        let interval = self.reward_adjust_interval;
        if self.chain.len() <= interval {
            return;
        }
        let newest = &self.chain[self.chain.len() - 1];
        let oldest = &self.chain[self.chain.len() - 1 - interval];
        let actual = (newest.timestamp - oldest.timestamp) as f64 / 1000.0;
        let target = interval as f64 * self.target_block_time;
        if actual < target * 0.9 {
            self.difficulty += 1;
            debug!("difficulty raised to {}", self.difficulty);
        } else if actual > target * 1.1 && self.difficulty > MIN_DIFFICULTY {
            self.difficulty -= 1;
            debug!("difficulty lowered to {}", self.difficulty);
        }
    }

    /// Net balance for an identity: a full scan of every transaction in
    /// every block, debiting matches on the sender side and crediting
    /// matches on the recipient side. No clamping; a negative result
    /// would mean an invariant was violated elsewhere.
    pub fn get_balance(&self, identity: &BalanceIdentity) -> f64 {
        let (public_key, address) = match identity {
            BalanceIdentity::Mint => return self.remaining_supply,
            BalanceIdentity::Empty => return 0.0,
            BalanceIdentity::RawPublicKey(pk) => {
                (Some(pk.as_str()), wallet::derive_address(pk).ok())
            }
            BalanceIdentity::Address(addr) => (None, Some(addr.clone())),
        };

        let matches =
            |endpoint: &str| public_key == Some(endpoint) || address.as_deref() == Some(endpoint);

        let mut balance = 0.0;
        for block in &self.chain {
            for tx in &block.transactions {
                if let Some(from) = &tx.from_address {
                    if matches(from) {
                        balance -= tx.amount;
                    }
                }
                if matches(&tx.to_address) {
                    balance += tx.amount;
                }
            }
        }
        balance
    }

    /// Structural integrity only: every post-genesis block's stored
    /// hash must match a recomputation and its prev link must match its
    /// predecessor. Transactions and reward policy are not re-checked.
    pub fn is_chain_valid(&self) -> bool {
        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let prev = &self.chain[i - 1];
            if current.hash != current.compute_hash() {
                return false;
            }
            if current.prev_hash != prev.hash {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::Block;

    /// Drive `commit_mining` until the miner's on-chain balance exceeds
    /// `min_balance`.
    fn mine_until(ledger: &mut Ledger, miner_public_key: &str, min_balance: f64) {
        let identity = BalanceIdentity::RawPublicKey(miner_public_key.to_string());
        for _ in 0..500_000 {
            if ledger.get_balance(&identity) > min_balance {
                return;
            }
            ledger.commit_mining(miner_public_key).expect("mining step");
        }
        panic!("mining did not reach a balance above {min_balance}");
    }

    #[test]
    fn starts_with_genesis_only() {
        let ledger = Ledger::new();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.latest_block().prev_hash.is_empty());
        assert!(ledger.is_chain_valid());
        assert_eq!(ledger.get_balance(&BalanceIdentity::Mint), MAX_SUPPLY);
    }

    #[test]
    fn end_to_end_transfer_with_nonces() {
        let mut ledger = Ledger::new();
        let a = Keypair::generate();
        let b = Keypair::generate();
        let a_pub = a.public_key_hex();

        mine_until(&mut ledger, &a_pub, 10.0);
        let a_id = BalanceIdentity::from(&a);
        let b_id = BalanceIdentity::from(&b);
        let mined = ledger.get_balance(&a_id);
        assert!(mined > 10.0);

        let mut tx = Transaction::new(Some(a_pub.clone()), b.public_key_hex(), 10.0).unwrap();
        tx.nonce = Some(ledger.next_nonce(&a.address()));
        tx.sign(&a).unwrap();
        ledger.add_transaction(tx).unwrap();
        ledger.commit_transactions().unwrap();

        assert_eq!(ledger.get_balance(&b_id), 10.0);
        assert_eq!(ledger.get_balance(&a_id), mined - 10.0);

        // Replaying the spent nonce is rejected.
        let mut replay = Transaction::new(Some(a_pub.clone()), b.public_key_hex(), 1.0).unwrap();
        replay.nonce = Some(0);
        replay.sign(&a).unwrap();
        assert!(matches!(
            ledger.add_transaction(replay),
            Err(LedgerError::InvalidNonce { expected: 1, got: 0 })
        ));

        // Skipping ahead is rejected too.
        let mut skipped = Transaction::new(Some(a_pub), b.public_key_hex(), 1.0).unwrap();
        skipped.nonce = Some(2);
        skipped.sign(&a).unwrap();
        assert!(matches!(
            ledger.add_transaction(skipped),
            Err(LedgerError::InvalidNonce { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn balances_conserve_total_issuance() {
        let mut ledger = Ledger::new();
        let a = Keypair::generate();
        let b = Keypair::generate();
        let a_pub = a.public_key_hex();

        mine_until(&mut ledger, &a_pub, 10.0);
        let mut tx = Transaction::new(Some(a_pub.clone()), b.public_key_hex(), 7.5).unwrap();
        tx.nonce = Some(0);
        tx.sign(&a).unwrap();
        ledger.add_transaction(tx).unwrap();
        ledger.commit_transactions().unwrap();

        let issued = MAX_SUPPLY - ledger.remaining_supply;
        // Rewards still sitting in the pending queue are not on-chain yet.
        let queued: f64 = ledger
            .pending_transactions
            .iter()
            .filter(|tx| tx.is_coinbase())
            .map(|tx| tx.amount)
            .sum();
        let held = ledger.get_balance(&BalanceIdentity::from(&a))
            + ledger.get_balance(&BalanceIdentity::from(&b));
        assert!((held + queued - issued).abs() < 1e-9);
    }

    #[test]
    fn duplicate_pending_coinbase_is_rejected() {
        let mut ledger = Ledger::new();
        let miner = Keypair::generate().public_key_hex();
        let first = Transaction::new(None, miner.clone(), 5.0).unwrap();
        ledger.add_transaction(first).unwrap();
        let second = Transaction::new(None, miner, 5.0).unwrap();
        assert!(matches!(
            ledger.add_transaction(second),
            Err(LedgerError::CoinbasePending)
        ));
    }

    #[test]
    fn amount_bounds_are_fatal() {
        let mut ledger = Ledger::new();
        let miner = Keypair::generate().public_key_hex();

        for bad in [0.00001, 0.000001, 100_000.0, 500_000.0, f64::NAN] {
            let tx = Transaction::new(None, miner.clone(), bad).unwrap();
            assert!(
                matches!(ledger.add_transaction(tx), Err(LedgerError::InvalidAmount)),
                "amount {bad} should be rejected"
            );
        }
        assert!(ledger.pending_transactions.is_empty());
    }

    #[test]
    fn amounts_are_rounded_on_admission() {
        let mut ledger = Ledger::new();
        let miner = Keypair::generate().public_key_hex();
        let tx = Transaction::new(None, miner, 5.12345678901234).unwrap();
        ledger.add_transaction(tx).unwrap();
        assert_eq!(ledger.pending_transactions[0].amount, 5.123456789);
    }

    #[test]
    fn more_than_one_coinbase_per_block_is_fatal() {
        let mut ledger = Ledger::new();
        let miner = Keypair::generate().public_key_hex();
        let tx = Transaction::new(None, miner.clone(), 5.0).unwrap();
        ledger.add_transaction(tx).unwrap();
        // Force a second coinbase past admission to exercise the batch check.
        let smuggled = Transaction::new(None, miner, 5.0).unwrap();
        ledger.pending_transactions.push(smuggled);
        assert!(matches!(
            ledger.commit_transactions(),
            Err(LedgerError::MultipleCoinbase)
        ));
        // The rejected batch left the queue untouched.
        assert_eq!(ledger.pending_transactions.len(), 2);
    }

    #[test]
    fn commit_respects_max_tx_per_block() {
        let mut ledger = Ledger::new();
        ledger.max_tx_per_block = 1;
        // Three mints placed directly in the queue; only the batch
        // window is committed, the remainder stays queued in order.
        for _ in 0..3 {
            let tx = Transaction::new(None, Keypair::generate().public_key_hex(), 1.0).unwrap();
            ledger.pending_transactions.push(tx);
        }
        ledger.commit_transactions().unwrap();
        assert_eq!(ledger.latest_block().transactions.len(), 1);
        assert_eq!(ledger.pending_transactions.len(), 2);
    }

    #[test]
    fn tampered_link_breaks_chain_validity() {
        let mut ledger = Ledger::new();
        let miner = Keypair::generate().public_key_hex();
        mine_until(&mut ledger, &miner, 10.0);
        assert!(ledger.is_chain_valid());

        let original = ledger.chain[1].prev_hash.clone();
        ledger.chain[1].prev_hash = "tampered".to_string();
        assert!(!ledger.is_chain_valid());
        ledger.chain[1].prev_hash = original;
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn transaction_tampering_is_invisible_to_chain_validity() {
        // Documents the header-only block hash: rewriting an embedded
        // amount does not trip the structural check.
        let mut ledger = Ledger::new();
        let miner = Keypair::generate().public_key_hex();
        mine_until(&mut ledger, &miner, 10.0);

        let block = ledger
            .chain
            .iter_mut()
            .find(|b| !b.transactions.is_empty())
            .expect("a block with a reward exists");
        block.transactions[0].amount = 1_000_000.0;
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn retarget_raises_on_fast_blocks_and_lowers_on_slow() {
        let mut ledger = Ledger::new();
        // Six fast blocks, 1ms apart: well under 90% of the target.
        for i in 0..6i64 {
            let prev = ledger.latest_block().hash.clone();
            ledger
                .chain
                .push(Block::new_with_timestamp(Vec::new(), prev, i));
        }
        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty, 2);

        // Slow window: spacing far beyond 110% of the target.
        let mut slow = Ledger::new();
        slow.difficulty = 3;
        for i in 0..6i64 {
            let prev = slow.latest_block().hash.clone();
            slow.chain
                .push(Block::new_with_timestamp(Vec::new(), prev, i * 600_000_000));
        }
        slow.adjust_difficulty();
        assert_eq!(slow.difficulty, 2);

        // The floor holds at 1.
        let mut floored = Ledger::new();
        for i in 0..6i64 {
            let prev = floored.latest_block().hash.clone();
            floored
                .chain
                .push(Block::new_with_timestamp(Vec::new(), prev, i * 600_000_000));
        }
        floored.adjust_difficulty();
        assert_eq!(floored.difficulty, 1);
    }

    #[test]
    fn retarget_skips_short_chains() {
        let mut ledger = Ledger::new();
        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty, DEFAULT_DIFFICULTY);
    }

    #[test]
    fn supply_exhaustion_leaves_block_mined_and_unrewarded() {
        let mut ledger = Ledger::new();
        ledger.remaining_supply = 5.0;
        ledger.next_halving_threshold = 1.0;
        let miner = Keypair::generate().public_key_hex();

        for _ in 0..200_000 {
            ledger.commit_mining(&miner).expect("mining step");
            if ledger.latest_block().mined {
                break;
            }
        }
        assert!(ledger.latest_block().mined);
        assert_eq!(ledger.remaining_supply, 5.0);
        assert!(ledger.pending_transactions.is_empty());
    }

    #[test]
    fn halving_crosses_the_threshold() {
        let mut ledger = Ledger::new();
        ledger.remaining_supply = 400.0;
        ledger.next_halving_threshold = 500.0;
        let miner = Keypair::generate().public_key_hex();

        for _ in 0..200_000 {
            ledger.commit_mining(&miner).expect("mining step");
            if ledger.latest_block().mined {
                break;
            }
        }
        assert_eq!(ledger.mining_reward, 5.0);
        assert_eq!(ledger.next_halving_threshold, 250.0);
        assert_eq!(ledger.remaining_supply, 395.0);
        assert_eq!(ledger.pending_transactions.len(), 1);
        assert_eq!(ledger.pending_transactions[0].amount, 5.0);
    }

    #[test]
    fn balance_identity_classification() {
        let kp = Keypair::generate();
        assert_eq!(
            BalanceIdentity::classify(&kp.public_key_hex()),
            BalanceIdentity::RawPublicKey(kp.public_key_hex())
        );
        assert_eq!(BalanceIdentity::classify("mint"), BalanceIdentity::Mint);
        assert_eq!(BalanceIdentity::classify(""), BalanceIdentity::Empty);
        assert_eq!(
            BalanceIdentity::classify("neither-a-key-nor-an-address"),
            BalanceIdentity::Empty
        );
        let addr = "a".repeat(ADDRESS_LEN);
        assert_eq!(
            BalanceIdentity::classify(&addr),
            BalanceIdentity::Address(addr)
        );
    }

    #[test]
    fn raw_key_identity_matches_address_endpoints() {
        // Funds sent to an address must be visible when the recipient
        // queries by raw public key: the identity resolves to both
        // forms and matches either endpoint encoding.
        let mut ledger = Ledger::new();
        let miner = Keypair::generate();
        let recipient = Keypair::generate();
        mine_until(&mut ledger, &miner.public_key_hex(), 5.0);

        let mut tx = Transaction::new(Some(miner.address()), recipient.address(), 5.0).unwrap();
        tx.nonce = Some(ledger.next_nonce(&miner.address()));
        tx.sign(&miner).unwrap();
        ledger.add_transaction(tx).unwrap();
        ledger.commit_transactions().unwrap();

        let by_addr = ledger.get_balance(&BalanceIdentity::Address(recipient.address()));
        let by_key = ledger.get_balance(&BalanceIdentity::from(&recipient));
        assert_eq!(by_addr, 5.0);
        assert_eq!(by_key, 5.0);
    }
}
