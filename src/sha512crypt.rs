//! The SHA-512 hashing scheme.
//!
//! Hashes carry the `$6$` prefix, an optional rounds parameter, a salt
//! of up to 16 characters and an 86-character sum.

use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::encoding::HASH64;
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::sha2crypt;
use crate::unmarshal::unmarshal;

pub const PREFIX: &str = "$6$";

pub const MAX_SALT_LENGTH: usize = 16;
pub const DEFAULT_SALT_LENGTH: usize = MAX_SALT_LENGTH;

pub const MIN_ROUNDS: u32 = 1000;
pub const MAX_ROUNDS: u32 = 999999999;
pub const DEFAULT_ROUNDS: u32 = 535000;
/// The rounds value when the rounds parameter is omitted from the hash
/// string.
pub const IMPLICIT_ROUNDS: u32 = 5000;

const SUM_LENGTH: usize = 86;

const PERM_FINAL: [u8; 64] = [
    42, 21, 0, 1, 43, 22, 23, 2, 44, 45, 24, 3, 4, 46, 25, 26, 5, 47, 48, 27, 6, 7, 49, 28, 29, 8,
    50, 51, 30, 9, 10, 52, 31, 32, 11, 53, 54, 33, 12, 13, 55, 34, 35, 14, 56, 57, 36, 15, 16, 58,
    37, 38, 17, 59, 60, 39, 18, 19, 61, 40, 41, 20, 62, 63,
];

/// Derives a SHA-512 key from the password, salt and rounds count.
pub fn key(password: &[u8], salt: &[u8], rounds: u32) -> Result<Vec<u8>> {
    if salt.len() > MAX_SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
        return Err(Error::Rounds(rounds));
    }
    Ok(sha2crypt::encrypt::<Sha512>(
        password,
        salt,
        rounds,
        &PERM_FINAL,
    ))
}

struct Scheme {
    prefix: String,
    rounds: u32,
    salt: Vec<u8>,
    sum: [u8; SUM_LENGTH],
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme {
            prefix: String::new(),
            rounds: 0,
            salt: Vec::new(),
            sum: [0; SUM_LENGTH],
        }
    }
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
        b.uint32(
            "rounds",
            "param:rounds,omitempty",
            |s| s.rounds,
            |s, v| s.rounds = v,
        );
        b.bytes("salt", "", |s| &s.salt, |s| &mut s.salt);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(password, salt, rounds)?;
    let mut sum = [0u8; SUM_LENGTH];
    HASH64.encode_le(&derived, &mut sum);
    Ok(sum)
}

/// Returns the SHA-512 hash of the password with a random salt and the
/// given rounds count.
pub fn new_hash(password: &str, rounds: u32) -> Result<String> {
    let salt = HASH64.rand(DEFAULT_SALT_LENGTH);
    let sum = sum_of(password.as_bytes(), &salt, rounds)?;
    marshal(&Scheme {
        prefix: PREFIX.to_string(),
        rounds,
        salt,
        sum,
    })
}

/// Returns the salt and rounds count of a SHA-512 hash.
pub fn params(hash: &str) -> Result<(Vec<u8>, u32)> {
    let mut scheme: Scheme = unmarshal(hash)?;
    if scheme.rounds == 0 {
        scheme.rounds = IMPLICIT_ROUNDS;
    }
    Ok((scheme.salt, scheme.rounds))
}

/// Compares the SHA-512 hash with a new hash derived from the password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let mut scheme: Scheme = unmarshal(hash)?;
    if scheme.rounds == 0 {
        scheme.rounds = IMPLICIT_ROUNDS;
    }
    let sum = sum_of(password.as_bytes(), &scheme.salt, scheme.rounds)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}
