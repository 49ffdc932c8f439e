//! The BSDi extended DES hashing scheme.
//!
//! Hashes look like `_6C/.yaiu.qYIjNR7X.s`: an underscore prefix, a
//! 4-character little-endian rounds count, a 4-character salt and an
//! 11-character sum. Unlike traditional DES the password may be longer
//! than 8 bytes; it is folded into the key 8 bytes at a time.

use subtle::ConstantTimeEq;

use crate::descrypt;
use crate::encoding::HASH64;
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

pub const PREFIX: &str = "_";

pub const SALT_LENGTH: usize = 4;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = (1 << 24) - 1;
pub const DEFAULT_ROUNDS: u32 = 5001;

const SUM_LENGTH: usize = 11;

/// Derives an extended DES key from the password, salt and rounds count.
pub fn key(password: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; 8]> {
    if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
        return Err(Error::Rounds(rounds));
    }
    if salt.len() != SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    let mut chunks = password.chunks(8);
    let mut k = descrypt::key(chunks.next().unwrap_or(b""));
    for chunk in chunks {
        k = descrypt::encrypt(k, k, 0, 1) ^ descrypt::key(chunk);
    }
    let block = descrypt::encrypt(k, 0, descrypt::decode_int(salt), rounds);
    Ok(block.to_be_bytes())
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    rounds: u32,
    salt: Vec<u8>,
    sum: [u8; SUM_LENGTH],
}

impl Record for Scheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.text(
            "prefix",
            "",
            |s| Ok(s.prefix.clone()),
            |s, text| {
                if text != PREFIX {
                    return Err(format!("unsupported prefix {:?}", text));
                }
                s.prefix = PREFIX.to_string();
                Ok(())
            },
            |s| s.prefix.is_empty(),
        );
        b.text(
            "rounds",
            "length:4,inline",
            |s| {
                let enc = descrypt::encode_int(s.rounds);
                Ok(String::from_utf8_lossy(&enc).into_owned())
            },
            |s, text| {
                if let Some(i) = HASH64.index_any_invalid(text.as_bytes()) {
                    return Err(format!(
                        "invalid character {:?}",
                        text.as_bytes()[i] as char
                    ));
                }
                s.rounds = descrypt::decode_int(text.as_bytes());
                Ok(())
            },
            |s| s.rounds == 0,
        );
        b.bytes("salt", "length:4,inline", |s| &s.salt, |s| &mut s.salt);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(password, salt, rounds)?;
    let mut sum = [0u8; SUM_LENGTH];
    HASH64.encode_be(&derived, &mut sum);
    Ok(sum)
}

/// Returns the extended DES hash of the password with a random salt.
pub fn new_hash(password: &str, rounds: u32) -> Result<String> {
    let salt = HASH64.rand(SALT_LENGTH);
    let sum = sum_of(password.as_bytes(), &salt, rounds)?;
    marshal(&Scheme {
        prefix: PREFIX.to_string(),
        rounds,
        salt,
        sum,
    })
}

/// Returns the salt and rounds count of an extended DES hash.
pub fn params(hash: &str) -> Result<(Vec<u8>, u32)> {
    let scheme: Scheme = unmarshal(hash)?;
    Ok((scheme.salt, scheme.rounds))
}

/// Compares the extended DES hash with a new hash derived from the
/// password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password.as_bytes(), &scheme.salt, scheme.rounds)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}
