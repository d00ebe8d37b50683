pub mod mnemonic;

use num_bigint::BigUint;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hex length of an uncompressed secp256k1 point (65 bytes, `04` prefix).
pub const PUBLIC_KEY_HEX_LEN: usize = 130;

/// Length of a derived base-62 address.
pub const ADDRESS_LEN: usize = 34;

/// One-byte version prefix prepended to the hash160 before encoding.
const ADDRESS_VERSION_PREFIX: &str = "38";

const BASE62_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid private key")]
    InvalidSecretKey,
    #[error("word \"{0}\" not found in dictionary")]
    WordNotFound(String),
    #[error("dictionary has no word at index {0}")]
    WordIndexOutOfRange(usize),
    #[error("mnemonic must contain {expected} words, got {got}")]
    BadMnemonicLength { expected: usize, got: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A secp256k1 keypair identifying one wallet.
#[derive(Debug, Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self { secret, public }
    }

    /// Rebuild a keypair from a 64-char hex private key.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(secret_hex)?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| CodecError::InvalidSecretKey)?;
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        Ok(Self { secret, public })
    }

    /// Uncompressed point encoding, 130 hex chars with `04` prefix.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize_uncompressed())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    /// Base-62 address derived from this keypair's public key.
    pub fn address(&self) -> String {
        derive_address_bytes(&self.public.serialize_uncompressed())
    }

    /// Sign a 32-byte digest, returning the DER signature as hex.
    pub fn sign_digest(&self, msg32: [u8; 32]) -> String {
        let secp = Secp256k1::new();
        let msg = Message::from_digest_slice(&msg32).expect("32-byte digest");
        let sig = secp.sign_ecdsa(&msg, &self.secret);
        hex::encode(sig.serialize_der())
    }
}

/// Derive the short address for a hex-encoded uncompressed public key:
/// hash160 of the key bytes, a 4-byte double-sha checksum and a version
/// prefix, base-62 encoded as one big-endian integer.
pub fn derive_address(public_key_hex: &str) -> Result<String, CodecError> {
    let bytes = hex::decode(public_key_hex)?;
    Ok(derive_address_bytes(&bytes))
}

fn derive_address_bytes(public_key: &[u8]) -> String {
    let sha = Sha256::digest(public_key);
    let hash160 = Ripemd160::digest(sha);
    let checksum = Sha256::digest(sha);
    let raw = format!(
        "{}{}{}",
        ADDRESS_VERSION_PREFIX,
        hex::encode(hash160),
        &hex::encode(checksum)[..8]
    );
    let value = BigUint::parse_bytes(raw.as_bytes(), 16).expect("raw address is valid hex");
    base62_encode(value)
}

/// No padding: leading zero bytes of the integer value collapse, so
/// addresses are not strictly fixed-width.
fn base62_encode(mut value: BigUint) -> String {
    let alphabet = BASE62_ALPHABET.as_bytes();
    let base = BigUint::from(62u32);
    let zero = BigUint::from(0u32);
    let mut out = Vec::new();
    while value > zero {
        let rem = &value % &base;
        let digit = rem.to_u32_digits().first().copied().unwrap_or(0) as usize;
        out.push(alphabet[digit]);
        value /= &base;
    }
    out.reverse();
    String::from_utf8(out).expect("alphabet is ascii")
}

/// Check that a string is a decodable uncompressed curve point.
pub fn is_valid_public_key(public_key_hex: &str) -> bool {
    if public_key_hex.len() != PUBLIC_KEY_HEX_LEN || !public_key_hex.starts_with("04") {
        return false;
    }
    match hex::decode(public_key_hex) {
        Ok(bytes) => PublicKey::from_slice(&bytes).is_ok(),
        Err(_) => false,
    }
}

/// Structural address check: fixed length over the base-62 alphabet.
pub fn is_well_formed_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN && address.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Verify a hex DER signature over a 32-byte digest against an
/// uncompressed hex public key. Any malformed input verifies as false.
pub fn verify_signature_hex(public_key_hex: &str, sig_hex: &str, msg32: [u8; 32]) -> bool {
    let secp = Secp256k1::verification_only();
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let Ok(pk_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };
    let Ok(msg) = Message::from_digest_slice(&msg32) else {
        return false;
    };
    secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
}
