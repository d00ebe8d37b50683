use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::transaction::Transaction;

/// A single block: an ordered set of transactions plus a Proof-of-Work
/// header. The hash covers the header only (timestamp, prev link,
/// nonce); transaction contents and the `mined` flag are deliberately
/// excluded, which keeps PoW cheap but leaves embedded transactions
/// outside the tamper-evidence of the chain link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    /// Empty for the genesis block.
    pub prev_hash: String,
    /// Proof-of-Work counter, incremented once per failed step.
    pub nonce: u64,
    /// Recomputed whenever `nonce` changes.
    pub hash: String,
    /// Terminal once true; further steps are no-ops.
    pub mined: bool,
}

impl Block {
    /// The first block in the chain: empty, unlinked.
    pub fn genesis() -> Self {
        Self::new_with_timestamp(Vec::new(), String::new(), Utc::now().timestamp_millis())
    }

    /// Create a new unmined block. The supplied transactions are
    /// filtered down to those individually valid; invalid ones are
    /// silently dropped.
    pub fn new(transactions: Vec<Transaction>, prev_hash: String) -> Self {
        Self::new_with_timestamp(transactions, prev_hash, Utc::now().timestamp_millis())
    }

    pub fn new_with_timestamp(
        transactions: Vec<Transaction>,
        prev_hash: String,
        timestamp: i64,
    ) -> Self {
        let mut block = Self {
            timestamp,
            transactions: transactions.into_iter().filter(Transaction::validate).collect(),
            prev_hash,
            nonce: 0,
            hash: String::new(),
            mined: false,
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over timestamp, prev link and current nonce only.
    pub fn compute_hash(&self) -> String {
        let preimage = format!("{}{}{}", self.timestamp, self.prev_hash, self.nonce);
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }

    /// One discrete Proof-of-Work attempt. Returns true exactly once,
    /// when the current hash meets the difficulty target; otherwise
    /// advances the nonce and returns false. Never loops: pacing is the
    /// caller's job, which is what makes mining pausable between calls.
    pub fn step(&mut self, difficulty: u32) -> bool {
        if self.mined {
            return false;
        }
        let target = "0".repeat(difficulty as usize);
        if self.hash.starts_with(&target) {
            self.mined = true;
            true
        } else {
            self.nonce += 1;
            self.hash = self.compute_hash();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Block;
    use crate::transaction::Transaction;
    use crate::wallet::Keypair;

    #[test]
    fn genesis_hash_matches_content() {
        let b = Block::genesis();
        assert_eq!(b.hash, b.compute_hash());
        assert!(b.prev_hash.is_empty());
        assert!(!b.mined);
    }

    #[test]
    fn step_converges_and_is_terminal() {
        let mut b = Block::new(Vec::new(), "prev".into());
        let mut steps = 0u64;
        while !b.step(1) {
            steps += 1;
            assert!(steps < 100_000, "difficulty-1 mining did not converge");
        }
        assert!(b.mined);
        assert!(b.hash.starts_with('0'));

        // Once mined, further steps are no-ops.
        let hash = b.hash.clone();
        let nonce = b.nonce;
        assert!(!b.step(1));
        assert_eq!(b.hash, hash);
        assert_eq!(b.nonce, nonce);
    }

    #[test]
    fn construction_drops_invalid_transactions() {
        let (a, b) = (Keypair::generate(), Keypair::generate());
        let coinbase = Transaction::new(None, a.public_key_hex(), 10.0).unwrap();
        // Unsigned transfer: individually invalid, silently filtered.
        let unsigned =
            Transaction::new(Some(a.public_key_hex()), b.public_key_hex(), 1.0).unwrap();

        let block = Block::new(vec![coinbase, unsigned], "prev".into());
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
    }

    #[test]
    fn hash_ignores_transaction_contents() {
        let a = Keypair::generate();
        let coinbase = Transaction::new(None, a.public_key_hex(), 10.0).unwrap();
        let mut block = Block::new(vec![coinbase], "prev".into());
        let before = block.compute_hash();
        block.transactions[0].amount = 1_000.0;
        assert_eq!(block.compute_hash(), before);
    }
}
