//! The traditional DES hashing scheme.
//!
//! Hashes are bare 13-character strings: a 2-character salt followed by
//! an 11-character big-endian radix-64 sum, with no prefix.

use subtle::ConstantTimeEq;

use crate::descrypt;
use crate::encoding::HASH64;
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

pub const MAX_PASSWORD_LENGTH: usize = 8;
pub const SALT_LENGTH: usize = 2;

/// The empty prefix of a bare DES hash.
pub const PREFIX: &str = "";

const SUM_LENGTH: usize = 11;
const ROUNDS: u32 = 25;

/// Derives a DES key from the password and salt.
pub fn key(password: &[u8], salt: &[u8]) -> Result<[u8; 8]> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(Error::PasswordLength(password.len()));
    }
    if salt.len() != SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    let block = descrypt::encrypt(
        descrypt::key(password),
        0,
        descrypt::decode_int(salt),
        ROUNDS,
    );
    Ok(block.to_be_bytes())
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    salt: Vec<u8>,
    sum: [u8; SUM_LENGTH],
}

impl Record for Scheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.text(
            "prefix",
            "omitempty",
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
        b.bytes("salt", "length:2,inline", |s| &s.salt, |s| &mut s.salt);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], salt: &[u8]) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(password, salt)?;
    let mut sum = [0u8; SUM_LENGTH];
    HASH64.encode_be(&derived, &mut sum);
    Ok(sum)
}

/// Returns the DES hash of the password with a random salt.
pub fn new_hash(password: &str) -> Result<String> {
    let salt = HASH64.rand(SALT_LENGTH);
    let sum = sum_of(password.as_bytes(), &salt)?;
    marshal(&Scheme {
        prefix: PREFIX.to_string(),
        salt,
        sum,
    })
}

/// Returns the salt of a DES hash.
pub fn salt(hash: &str) -> Result<Vec<u8>> {
    let scheme: Scheme = unmarshal(hash)?;
    Ok(scheme.salt)
}

/// Compares the DES hash with a new hash derived from the password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password.as_bytes(), &scheme.salt)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}
