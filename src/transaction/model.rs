use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::wallet::{self, ADDRESS_LEN, Keypair, PUBLIC_KEY_HEX_LEN};

/// Sentinel used for the sender of a coinbase mint in digest preimages
/// and for an unset replay nonce.
const NONE_SENTINEL: &str = "none";

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid address pair")]
    InvalidAddressPair,
    #[error("cannot sign transactions for other wallets")]
    SignerMismatch,
}

/// Classification of a transaction's endpoint encodings, computed once
/// at construction and invariant thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairKind {
    /// Both endpoints are raw uncompressed public keys.
    KeyToKey,
    /// Both endpoints are derived base-62 addresses.
    AddressToAddress,
    /// Coinbase mint paying out to a raw public key.
    MintToKey,
    /// Coinbase mint paying out to an address.
    MintToAddress,
}

impl PairKind {
    /// Classify an endpoint pair by shape, by length alone; anything
    /// matching none of the four shapes is a construction error.
    pub fn classify(from: Option<&str>, to: &str) -> Result<Self, TransactionError> {
        match from {
            None if to.len() == PUBLIC_KEY_HEX_LEN => Ok(Self::MintToKey),
            None if to.len() == ADDRESS_LEN => Ok(Self::MintToAddress),
            Some(f) if f.len() == PUBLIC_KEY_HEX_LEN && to.len() == PUBLIC_KEY_HEX_LEN => {
                Ok(Self::KeyToKey)
            }
            Some(f) if f.len() == ADDRESS_LEN && to.len() == ADDRESS_LEN => {
                Ok(Self::AddressToAddress)
            }
            _ => Err(TransactionError::InvalidAddressPair),
        }
    }

    /// Stable numeric code used in digest preimages.
    pub fn code(self) -> u8 {
        match self {
            Self::KeyToKey => 0,
            Self::AddressToAddress => 1,
            Self::MintToKey => 2,
            Self::MintToAddress => 3,
        }
    }

    pub fn is_mint(self) -> bool {
        matches!(self, Self::MintToKey | Self::MintToAddress)
    }
}

/// A signed (or coinbase) value transfer between two wallet identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Raw public key, address, or `None` for a coinbase mint.
    pub from_address: Option<String>,
    pub to_address: String,
    pub pair: PairKind,
    pub amount: f64,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    /// Identity hash, computed once at construction.
    pub hash: String,
    /// Per-sender replay nonce; never set for coinbase mints.
    pub nonce: Option<u64>,
    /// Hex DER signature; present only once signed.
    pub signature: Option<String>,
    /// Signer's raw public key, recorded at signing time.
    pub signer_public_key: Option<String>,
}

impl Transaction {
    pub fn new(
        from_address: Option<String>,
        to_address: String,
        amount: f64,
    ) -> Result<Self, TransactionError> {
        let pair = PairKind::classify(from_address.as_deref(), &to_address)?;
        let mut tx = Self {
            from_address,
            to_address,
            pair,
            amount,
            timestamp: Utc::now().timestamp_millis(),
            hash: String::new(),
            nonce: None,
            signature: None,
            signer_public_key: None,
        };
        tx.hash = tx.identity_hash();
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.pair.is_mint()
    }

    fn digest_from(&self) -> &str {
        self.from_address.as_deref().unwrap_or(NONE_SENTINEL)
    }

    fn digest_nonce(&self) -> String {
        match self.nonce {
            Some(n) => n.to_string(),
            None => NONE_SENTINEL.to_string(),
        }
    }

    /// Identity hash over from/to/amount/timestamp/pair/nonce. A
    /// presence marker computed once at construction; not the digest
    /// that gets signed.
    pub fn identity_hash(&self) -> String {
        let preimage = format!(
            "{}{}{}{}{}{}",
            self.digest_from(),
            self.to_address,
            self.amount,
            self.timestamp,
            self.pair.code(),
            self.digest_nonce()
        );
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }

    /// Signing digest over from/to/amount/timestamp/nonce/pair. Same
    /// logical fields as the identity hash in a different order; both
    /// are kept as-is because verification must reproduce this exact
    /// preimage.
    pub fn signing_digest(&self) -> [u8; 32] {
        let preimage = format!(
            "{}{}{}{}{}{}",
            self.digest_from(),
            self.to_address,
            self.amount,
            self.timestamp,
            self.digest_nonce(),
            self.pair.code()
        );
        let digest = Sha256::digest(preimage.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    /// Sign with the sender's keypair, recording the signer's public
    /// key. A no-op for coinbase mints. Signing for a wallet other than
    /// `from_address` is a fatal error.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), TransactionError> {
        if self.is_coinbase() {
            return Ok(());
        }
        let public_key_hex = keypair.public_key_hex();
        match self.pair {
            PairKind::KeyToKey => {
                if self.from_address.as_deref() != Some(public_key_hex.as_str()) {
                    return Err(TransactionError::SignerMismatch);
                }
            }
            PairKind::AddressToAddress => {
                if self.from_address.as_deref() != Some(keypair.address().as_str()) {
                    return Err(TransactionError::SignerMismatch);
                }
            }
            PairKind::MintToKey | PairKind::MintToAddress => unreachable!("handled above"),
        }
        self.signer_public_key = Some(public_key_hex);
        self.signature = Some(keypair.sign_digest(self.signing_digest()));
        Ok(())
    }

    /// Full validity check. Mints need a positive amount and a present
    /// identity hash (an unset nonce counts as zero against the
    /// non-negative bound, which the unsigned type guarantees). Signed
    /// transactions additionally need a verifying signature from the
    /// resolved sender key.
    pub fn validate(&self) -> bool {
        if self.amount <= 0.0 {
            return false;
        }
        if self.hash.is_empty() {
            return false;
        }
        if self.is_coinbase() {
            return true;
        }

        let signature = match &self.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return false,
        };

        let public_key = match self.pair {
            PairKind::KeyToKey => match self.from_address.as_deref() {
                Some(pk) => pk,
                None => return false,
            },
            PairKind::AddressToAddress => match self.signer_public_key.as_deref() {
                Some(pk) => match wallet::derive_address(pk) {
                    Ok(addr) if Some(addr.as_str()) == self.from_address.as_deref() => pk,
                    _ => return false,
                },
                None => return false,
            },
            PairKind::MintToKey | PairKind::MintToAddress => return false,
        };

        wallet::verify_signature_hex(public_key, signature, self.signing_digest())
    }

    /// Structural endpoint check, independent of signatures: raw keys
    /// must decode as curve points, addresses must match the base-62
    /// alphabet at fixed length.
    pub fn validate_address_shapes(&self) -> bool {
        match self.pair {
            PairKind::KeyToKey => {
                self.from_address
                    .as_deref()
                    .is_some_and(wallet::is_valid_public_key)
                    && wallet::is_valid_public_key(&self.to_address)
            }
            PairKind::AddressToAddress => {
                self.from_address
                    .as_deref()
                    .is_some_and(wallet::is_well_formed_address)
                    && wallet::is_well_formed_address(&self.to_address)
            }
            PairKind::MintToKey => {
                self.from_address.is_none() && wallet::is_valid_public_key(&self.to_address)
            }
            PairKind::MintToAddress => {
                self.from_address.is_none() && wallet::is_well_formed_address(&self.to_address)
            }
        }
    }
}
