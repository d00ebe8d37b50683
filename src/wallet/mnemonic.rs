//! BIP39-style word encoding of a private key: 256 key bits plus an
//! 8-bit checksum, split into 24 groups of 11 bits, each indexing into
//! an externally supplied word list. The checksum is embedded on encode
//! but discarded on decode, so recovery does not detect corruption.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::CodecError;

/// Words per mnemonic (24 * 11 = 264 bits = 256 key bits + 8 checksum).
pub const MNEMONIC_WORDS: usize = 24;

const INDEX_BITS: usize = 11;
const KEY_BYTES: usize = 32;

/// Ordered word list, loaded once and queried by index and by reverse
/// lookup. At least 2048 entries are needed to cover every 11-bit index.
#[derive(Debug, Clone)]
pub struct Dictionary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl Dictionary {
    pub fn from_words<I>(words: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let words: Vec<String> = words.into_iter().collect();
        let mut index = HashMap::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            // First occurrence wins for duplicate words.
            index.entry(word.clone()).or_insert(i);
        }
        Self { words, index }
    }

    /// Load a word list from disk, one word per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let data = fs::read_to_string(path)?;
        Ok(Self::from_words(
            data.lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty()),
        ))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    pub fn position(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }
}

/// Encode a 32-byte hex private key as a 24-word mnemonic.
pub fn encode_mnemonic(secret_hex: &str, dictionary: &Dictionary) -> Result<Vec<String>, CodecError> {
    let key = hex::decode(secret_hex)?;
    if key.len() != KEY_BYTES {
        return Err(CodecError::InvalidSecretKey);
    }

    let checksum = Sha256::digest(&key)[0];
    let mut bits = key;
    bits.push(checksum);

    let mut words = Vec::with_capacity(MNEMONIC_WORDS);
    for group in 0..MNEMONIC_WORDS {
        let mut idx = 0usize;
        for bit in 0..INDEX_BITS {
            let pos = group * INDEX_BITS + bit;
            let set = (bits[pos / 8] >> (7 - pos % 8)) & 1;
            idx = (idx << 1) | set as usize;
        }
        let word = dictionary
            .word(idx)
            .ok_or(CodecError::WordIndexOutOfRange(idx))?;
        words.push(word.to_string());
    }
    Ok(words)
}

/// Recover the hex private key from a 24-word mnemonic. The trailing
/// checksum bits are dropped without verification.
pub fn decode_mnemonic(words: &[String], dictionary: &Dictionary) -> Result<String, CodecError> {
    if words.len() != MNEMONIC_WORDS {
        return Err(CodecError::BadMnemonicLength {
            expected: MNEMONIC_WORDS,
            got: words.len(),
        });
    }

    let mut bits = [0u8; KEY_BYTES + 1];
    for (group, word) in words.iter().enumerate() {
        let idx = dictionary
            .position(word)
            .ok_or_else(|| CodecError::WordNotFound(word.clone()))?;
        for bit in 0..INDEX_BITS {
            if (idx >> (INDEX_BITS - 1 - bit)) & 1 == 1 {
                let pos = group * INDEX_BITS + bit;
                bits[pos / 8] |= 1 << (7 - pos % 8);
            }
        }
    }

    Ok(hex::encode(&bits[..KEY_BYTES]))
}
